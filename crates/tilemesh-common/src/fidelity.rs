use core::{fmt::Display, str::FromStr};
use serde::{Deserialize, Serialize};

use crate::ParseVariantError;

/// Cycles spent by one core on one tile multiply at the lowest fidelity.
pub const LOFI_CYCLES_PER_TILE: u32 = 16;

/// Precision of the matrix engine. Higher fidelity spends proportionally more cycles per tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MathFidelity {
    /// Single pass.
    LoFi,
    /// Two passes.
    HiFi2,
    /// Three passes.
    HiFi3,
    /// Four passes, full precision.
    HiFi4,
}

impl MathFidelity {
    /// Cost of this fidelity as a multiple of [LoFi](MathFidelity::LoFi).
    pub fn cost_multiple(&self) -> u32 {
        match self {
            MathFidelity::LoFi => 1,
            MathFidelity::HiFi2 => 2,
            MathFidelity::HiFi3 => 3,
            MathFidelity::HiFi4 => 4,
        }
    }

    /// Cycles needed by one core to multiply one pair of tiles.
    pub fn cycles_per_tile(&self) -> u32 {
        LOFI_CYCLES_PER_TILE * self.cost_multiple()
    }
}

impl Display for MathFidelity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            MathFidelity::LoFi => "LoFi",
            MathFidelity::HiFi2 => "HiFi2",
            MathFidelity::HiFi3 => "HiFi3",
            MathFidelity::HiFi4 => "HiFi4",
        };
        f.write_str(name)
    }
}

impl FromStr for MathFidelity {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LoFi" => Ok(MathFidelity::LoFi),
            "HiFi2" => Ok(MathFidelity::HiFi2),
            "HiFi3" => Ok(MathFidelity::HiFi3),
            "HiFi4" => Ok(MathFidelity::HiFi4),
            _ => Err(ParseVariantError::new("math fidelity", s)),
        }
    }
}

/// Compute engine settings passed along with every matmul.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputeKernelConfig {
    /// Precision of the matrix engine.
    pub math_fidelity: MathFidelity,
    /// Allow approximate transcendental functions in fused activations.
    pub math_approx_mode: bool,
    /// Accumulate in 32-bit registers, which halves the number of destination tiles.
    pub fp32_dest_acc_en: bool,
    /// Accumulate partial results directly in on-chip memory.
    pub packer_l1_acc: bool,
}

impl ComputeKernelConfig {
    /// Default settings for the given fidelity.
    pub fn with_fidelity(math_fidelity: MathFidelity) -> Self {
        Self {
            math_fidelity,
            math_approx_mode: true,
            fp32_dest_acc_en: false,
            packer_l1_acc: true,
        }
    }

    /// Maximum number of output tiles a subblock may hold in the destination registers.
    pub fn max_subblock_tiles(&self) -> u32 {
        match self.fp32_dest_acc_en {
            true => 4,
            false => 8,
        }
    }
}
