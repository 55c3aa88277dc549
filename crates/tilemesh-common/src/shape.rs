use core::fmt::Display;
use serde::{Deserialize, Serialize};

/// Logical dimensions of `(M, K) @ (K, N) -> (M, N)`.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixShape {
    /// Rows of the first operand and of the output.
    pub m: u32,
    /// Reduction dimension.
    pub k: u32,
    /// Columns of the second operand and of the output.
    pub n: u32,
}

impl MatrixShape {
    /// Shape of the first operand.
    pub fn lhs(&self) -> [usize; 2] {
        [self.m as usize, self.k as usize]
    }

    /// Shape of the second operand.
    pub fn rhs(&self) -> [usize; 2] {
        [self.k as usize, self.n as usize]
    }

    /// Shape of the output.
    pub fn out(&self) -> [usize; 2] {
        [self.m as usize, self.n as usize]
    }

    /// `M * K * N` as a float, which does not overflow for the largest benchmarked problems.
    pub fn volume(&self) -> f64 {
        self.m as f64 * self.k as f64 * self.n as f64
    }

    /// Floating point operations of one multiply, counting a multiply-add as two.
    pub fn flops(&self) -> f64 {
        2.0 * self.volume()
    }

    /// The shape implied by two operand shapes, if their inner dimensions agree.
    pub fn from_operands(lhs: [usize; 2], rhs: [usize; 2]) -> Option<Self> {
        if lhs[1] != rhs[0] {
            return None;
        }

        Some(Self::new(
            u32::try_from(lhs[0]).ok()?,
            u32::try_from(lhs[1]).ok()?,
            u32::try_from(rhs[1]).ok()?,
        ))
    }
}

impl Display for MatrixShape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}*{}*{}", self.m, self.k, self.n)
    }
}
