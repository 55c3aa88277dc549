use core::{fmt::Display, str::FromStr};
use half::bf16;
use serde::{Deserialize, Serialize};

use crate::ParseVariantError;

/// Number of values sharing one exponent in the block floating point formats.
pub const BLOCK_FLOAT_SIZE: usize = 16;

/// Element format of a tensor on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Brain float, 8 exponent bits and 7 mantissa bits.
    #[serde(rename = "bfloat16")]
    Bfloat16,
    /// Block float with a shared exponent and 7 mantissa bits per value.
    #[serde(rename = "bfloat8_b")]
    Bfloat8B,
    /// Block float with a shared exponent and 3 mantissa bits per value.
    #[serde(rename = "bfloat4_b")]
    Bfloat4B,
}

impl DataType {
    /// All supported formats.
    pub const ALL: [DataType; 3] = [DataType::Bfloat16, DataType::Bfloat8B, DataType::Bfloat4B];

    /// Explicit mantissa bits of one value.
    pub fn mantissa_bits(&self) -> u32 {
        match self {
            DataType::Bfloat16 | DataType::Bfloat8B => 7,
            DataType::Bfloat4B => 3,
        }
    }

    /// Relative tolerance, against the largest magnitude, when comparing two results computed in
    /// this format.
    pub fn tolerance(&self) -> f32 {
        match self {
            DataType::Bfloat16 => 1e-2,
            DataType::Bfloat8B => 3e-2,
            DataType::Bfloat4B => 0.25,
        }
    }

    /// Round every value to the nearest value representable in this format.
    pub fn quantize(&self, values: &mut [f32]) {
        match self {
            DataType::Bfloat16 => values
                .iter_mut()
                .for_each(|value| *value = bf16::from_f32(*value).to_f32()),
            DataType::Bfloat8B | DataType::Bfloat4B => {
                quantize_block_float(values, self.mantissa_bits() as i32)
            }
        }
    }

    /// Whether two buffers agree within the tolerance of this format.
    pub fn all_close(&self, lhs: &[f32], rhs: &[f32]) -> bool {
        if lhs.len() != rhs.len() {
            return false;
        }

        let scale = lhs
            .iter()
            .chain(rhs.iter())
            .fold(1.0f32, |acc, value| acc.max(value.abs()));
        let tolerance = self.tolerance() * scale;

        lhs.iter()
            .zip(rhs.iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

fn quantize_block_float(values: &mut [f32], mantissa_bits: i32) {
    for block in values.chunks_mut(BLOCK_FLOAT_SIZE) {
        let max = block.iter().fold(0.0f32, |acc, value| acc.max(value.abs()));
        if max == 0.0 || !max.is_finite() {
            continue;
        }

        let exponent = max.log2().floor() as i32;
        let quantum = 2.0f32.powi(exponent - mantissa_bits);

        for value in block.iter_mut() {
            *value = (*value / quantum).round() * quantum;
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            DataType::Bfloat16 => "BFLOAT16",
            DataType::Bfloat8B => "BFLOAT8_B",
            DataType::Bfloat4B => "BFLOAT4_B",
        };
        f.write_str(name)
    }
}

impl FromStr for DataType {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bfloat16" | "bf16" => Ok(DataType::Bfloat16),
            "bfloat8_b" | "bf8_b" => Ok(DataType::Bfloat8B),
            "bfloat4_b" | "bf4_b" => Ok(DataType::Bfloat4B),
            _ => Err(ParseVariantError::new("data type", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bfloat16_drops_low_mantissa_bits() {
        let mut values = [1.0, 1.0 + 1.0 / 512.0, 3.140625];
        DataType::Bfloat16.quantize(&mut values);

        assert_eq!(values, [1.0, 1.0, 3.140625]);
    }

    #[test]
    fn block_float_shares_the_largest_exponent() {
        let mut values = [8.0, 0.01, -5.3, 0.0];
        DataType::Bfloat4B.quantize(&mut values);

        // Exponent 3 with 3 mantissa bits leaves a quantum of 1.
        assert_eq!(values, [8.0, 0.0, -5.0, 0.0]);
    }

    #[test]
    fn block_float_blocks_are_independent() {
        let mut values = vec![1024.0; BLOCK_FLOAT_SIZE];
        values.push(0.3);
        DataType::Bfloat8B.quantize(&mut values);

        assert_eq!(values[BLOCK_FLOAT_SIZE], 0.30078125);
    }

    #[test]
    fn parse_accepts_report_names() {
        for dtype in DataType::ALL {
            assert_eq!(dtype.to_string().parse::<DataType>(), Ok(dtype));
        }
        assert!("float32".parse::<DataType>().is_err());
    }

    #[test]
    fn all_close_scales_with_magnitude() {
        assert!(DataType::Bfloat16.all_close(&[100.0, 1.0], &[100.5, 1.0]));
        assert!(!DataType::Bfloat16.all_close(&[100.0, 1.0], &[102.0, 1.0]));
        assert!(!DataType::Bfloat16.all_close(&[1.0], &[1.0, 2.0]));
    }
}
