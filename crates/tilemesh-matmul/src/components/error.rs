use thiserror::Error;
use tilemesh_common::{DataType, ProgramError};

use super::Strategy;

/// Errors that can occur while planning a matmul, before anything runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatmulSetupError {
    /// The problem can't be split as requested.
    #[error("Unable to plan the matmul because the config is invalid: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The requested strategy isn't available.
    #[error("Unable to plan the matmul because the strategy is unsupported: {0}")]
    UnsupportedStrategy(#[from] UnsupportedStrategyError),
}

/// A shape, grid or divisor that doesn't produce a legal decomposition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A dimension doesn't split evenly.
    #[error("{dim} = {value} is not divisible by {divisor}")]
    NotDivisible {
        /// Name of the split dimension.
        dim: &'static str,
        /// Value being split.
        value: u32,
        /// Requested split.
        divisor: u32,
    },

    /// A size or divisor is zero.
    #[error("{0} must be positive")]
    Zero(&'static str),

    /// The split of a dimension over the grid doesn't fit in 32 bits.
    #[error("{dim} can't be split over {cores} cores of {tile} elements")]
    Overflow {
        /// Name of the split dimension.
        dim: &'static str,
        /// Cores along the dimension.
        cores: u32,
        /// Tile extent along the dimension.
        tile: u32,
    },

    /// The resolved program doesn't fit the problem.
    #[error("{0}")]
    Program(#[from] ProgramError),
}

/// A strategy tag that can't be resolved to a program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedStrategyError {
    /// The tag doesn't name any strategy.
    #[error("unknown strategy `{0}`")]
    Unknown(String),

    /// The strategy has no kernels for the data type.
    #[error("{strategy} doesn't support {dtype}")]
    DataType {
        /// Requested strategy.
        strategy: Strategy,
        /// Requested data type.
        dtype: DataType,
    },
}

/// Elements covered by `cores` tiles of `tile` elements along `dim`.
pub(crate) fn grid_extent(
    dim: &'static str,
    cores: u32,
    tile: u32,
) -> Result<u32, ConfigurationError> {
    cores
        .checked_mul(tile)
        .ok_or(ConfigurationError::Overflow { dim, cores, tile })
}

/// Check that `value` splits evenly into `divisor` parts.
pub(crate) fn check_divisible(
    dim: &'static str,
    value: u32,
    divisor: u32,
) -> Result<(), ConfigurationError> {
    if divisor == 0 {
        return Err(ConfigurationError::Zero(dim));
    }
    if value % divisor != 0 {
        return Err(ConfigurationError::NotDivisible {
            dim,
            value,
            divisor,
        });
    }
    Ok(())
}
