use core::fmt::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ComputeGrid, K_TILE, MatrixShape, TileShape};

/// Number of output tiles computed as one burst of the matrix engine.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubblockShape {
    /// Tiles along `M`.
    pub h: u32,
    /// Tiles along `N`.
    pub w: u32,
}

impl SubblockShape {
    /// Number of tiles held in the destination registers.
    pub fn tiles(&self) -> u32 {
        self.h * self.w
    }
}

impl Display for SubblockShape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}", self.h, self.w)
    }
}

/// Elementwise activation fused into the output writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryActivation {
    /// `max(x, 0)`
    Relu,
}

impl UnaryActivation {
    /// Apply the activation to one value.
    pub fn apply(&self, value: f32) -> f32 {
        match self {
            UnaryActivation::Relu => value.max(0.0),
        }
    }
}

/// Each core computes a `per_core_m x per_core_n` block, re-reading its operand rows and columns
/// from memory.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReuseConfig {
    /// Cores used by the program.
    pub grid: ComputeGrid,
    /// Tiles along `K` consumed per step.
    pub in0_block_w: u32,
    /// Output subblock.
    pub subblock: SubblockShape,
    /// Output tiles per core along `M`.
    pub per_core_m: u32,
    /// Output tiles per core along `N`.
    pub per_core_n: u32,
}

/// Like [ReuseConfig], but operand rows and columns shared by a row or column of cores are read
/// once and multicast.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReuseMultiCastConfig {
    /// Cores used by the program.
    pub grid: ComputeGrid,
    /// Tiles along `K` consumed per step.
    pub in0_block_w: u32,
    /// Output subblock.
    pub subblock: SubblockShape,
    /// Output tiles per block along `M`.
    pub out_block_h: u32,
    /// Output tiles per block along `N`.
    pub out_block_w: u32,
    /// Output tiles per core along `M`.
    pub per_core_m: u32,
    /// Output tiles per core along `N`.
    pub per_core_n: u32,
    /// Multicast the first operand along columns instead of rows.
    pub transpose_mcast: bool,
    /// Activation applied while writing the output.
    pub fused_activation: Option<UnaryActivation>,
}

/// Operand blocks rotate between neighbouring cores of a square grid at every step.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CannonConfig {
    /// Cores used by the program. Only the largest square sub-grid participates.
    pub grid: ComputeGrid,
    /// Output subblock.
    pub subblock: SubblockShape,
    /// Output tiles per core along `M`.
    pub per_core_m: u32,
    /// Output tiles per core along `N`.
    pub per_core_n: u32,
    /// Tiles along `K` exchanged per step.
    pub per_core_k: u32,
}

/// How a matmul program is laid out on the cores.
///
/// Each variant carries exactly the fields its kernels consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramConfig {
    /// Let the runtime pick its own decomposition.
    NonOptimized,
    /// See [ReuseConfig].
    Reuse(ReuseConfig),
    /// See [ReuseMultiCastConfig].
    ReuseMultiCast(ReuseMultiCastConfig),
    /// See [CannonConfig].
    Cannon(CannonConfig),
}

/// Matmul dimensions counted in tiles.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCounts {
    /// Tiles along `M`.
    pub mt: u32,
    /// Tiles along `K`.
    pub kt: u32,
    /// Tiles along `N`.
    pub nt: u32,
}

impl TileCounts {
    /// Tile counts of `shape`, rounding partial tiles down.
    pub fn of(shape: &MatrixShape, tile: &TileShape) -> Self {
        Self::new(shape.m / tile.h, shape.k / K_TILE, shape.n / tile.w)
    }
}

/// A program configuration that can't run on the given problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// A count doesn't split evenly.
    #[error("{dim} of {value} tiles is not divisible by {divisor}")]
    NotDivisible {
        /// Name of the split quantity.
        dim: &'static str,
        /// Quantity being split.
        value: u32,
        /// Requested split.
        divisor: u32,
    },
    /// A size that must be positive is zero.
    #[error("{0} must be positive")]
    Zero(&'static str),
    /// The subblock overflows the destination registers.
    #[error("Subblock {subblock} holds {} tiles, at most {max} fit", subblock.tiles())]
    SubblockTooLarge {
        /// Offending subblock.
        subblock: SubblockShape,
        /// Register capacity in tiles.
        max: u32,
    },
    /// The program requests more cores than the device has.
    #[error("Program grid {program} doesn't fit in the device grid {device}")]
    GridTooLarge {
        /// Grid requested by the program.
        program: ComputeGrid,
        /// Grid of the device.
        device: ComputeGrid,
    },
    /// There are more output blocks than cores to compute them.
    #[error("{blocks} output blocks don't fit on {cores} cores")]
    TooManyBlocks {
        /// Number of output blocks.
        blocks: u64,
        /// Number of participating cores.
        cores: u64,
    },
    /// Cannon requires as many tile rows as tile columns.
    #[error("Cannon needs a square output, got {mt}x{nt} tiles")]
    NotSquare {
        /// Tiles along `M`.
        mt: u32,
        /// Tiles along `N`.
        nt: u32,
    },
}

fn check_divisible(dim: &'static str, value: u32, divisor: u32) -> Result<(), ProgramError> {
    if divisor == 0 {
        return Err(ProgramError::Zero(dim));
    }
    if value % divisor != 0 {
        return Err(ProgramError::NotDivisible {
            dim,
            value,
            divisor,
        });
    }
    Ok(())
}

fn check_subblock(subblock: &SubblockShape, max: u32) -> Result<(), ProgramError> {
    if subblock.h == 0 || subblock.w == 0 {
        return Err(ProgramError::Zero("subblock"));
    }
    if subblock.tiles() > max {
        return Err(ProgramError::SubblockTooLarge {
            subblock: *subblock,
            max,
        });
    }
    Ok(())
}

fn check_grid(program: ComputeGrid, device: ComputeGrid) -> Result<(), ProgramError> {
    if program.num_cores() == 0 {
        return Err(ProgramError::Zero("grid"));
    }
    if !program.fits_in(&device) {
        return Err(ProgramError::GridTooLarge { program, device });
    }
    Ok(())
}

fn check_blocks(
    counts: &TileCounts,
    per_core_m: u32,
    per_core_n: u32,
    cores: u64,
) -> Result<(), ProgramError> {
    let blocks = (counts.mt / per_core_m) as u64 * (counts.nt / per_core_n) as u64;
    if blocks > cores {
        return Err(ProgramError::TooManyBlocks { blocks, cores });
    }
    Ok(())
}

impl ProgramConfig {
    /// Name of the strategy this configuration belongs to.
    pub fn name(&self) -> &'static str {
        match self {
            ProgramConfig::NonOptimized => "NonOptimized",
            ProgramConfig::Reuse(_) => "Reuse",
            ProgramConfig::ReuseMultiCast(_) => "ReuseMultiCast",
            ProgramConfig::Cannon(_) => "Cannon",
        }
    }

    /// Cores requested by the program, if it requests any.
    pub fn grid(&self) -> Option<ComputeGrid> {
        match self {
            ProgramConfig::NonOptimized => None,
            ProgramConfig::Reuse(config) => Some(config.grid),
            ProgramConfig::ReuseMultiCast(config) => Some(config.grid),
            ProgramConfig::Cannon(config) => Some(config.grid),
        }
    }

    /// Output subblock, if the program fixes one.
    pub fn subblock(&self) -> Option<SubblockShape> {
        match self {
            ProgramConfig::NonOptimized => None,
            ProgramConfig::Reuse(config) => Some(config.subblock),
            ProgramConfig::ReuseMultiCast(config) => Some(config.subblock),
            ProgramConfig::Cannon(config) => Some(config.subblock),
        }
    }

    /// Check that the program can compute a problem of `counts` tiles on a device of `device`
    /// cores, with `max_subblock_tiles` destination registers.
    pub fn validate(
        &self,
        counts: &TileCounts,
        device: ComputeGrid,
        max_subblock_tiles: u32,
    ) -> Result<(), ProgramError> {
        match self {
            ProgramConfig::NonOptimized => Ok(()),
            ProgramConfig::Reuse(config) => {
                check_grid(config.grid, device)?;
                check_subblock(&config.subblock, max_subblock_tiles)?;
                check_divisible("M", counts.mt, config.per_core_m)?;
                check_divisible("N", counts.nt, config.per_core_n)?;
                check_divisible("K", counts.kt, config.in0_block_w)?;
                check_divisible("per_core_M", config.per_core_m, config.subblock.h)?;
                check_divisible("per_core_N", config.per_core_n, config.subblock.w)?;
                check_blocks(
                    counts,
                    config.per_core_m,
                    config.per_core_n,
                    config.grid.num_cores(),
                )
            }
            ProgramConfig::ReuseMultiCast(config) => {
                check_grid(config.grid, device)?;
                check_subblock(&config.subblock, max_subblock_tiles)?;
                check_divisible("M", counts.mt, config.per_core_m)?;
                check_divisible("N", counts.nt, config.per_core_n)?;
                check_divisible("K", counts.kt, config.in0_block_w)?;
                check_divisible("per_core_M", config.per_core_m, config.out_block_h)?;
                check_divisible("per_core_N", config.per_core_n, config.out_block_w)?;
                check_divisible("out_block_h", config.out_block_h, config.subblock.h)?;
                check_divisible("out_block_w", config.out_block_w, config.subblock.w)?;
                check_blocks(
                    counts,
                    config.per_core_m,
                    config.per_core_n,
                    config.grid.num_cores(),
                )
            }
            ProgramConfig::Cannon(config) => {
                check_grid(config.grid, device)?;
                check_subblock(&config.subblock, max_subblock_tiles)?;
                if counts.mt != counts.nt {
                    return Err(ProgramError::NotSquare {
                        mt: counts.mt,
                        nt: counts.nt,
                    });
                }
                check_divisible("M", counts.mt, config.per_core_m)?;
                check_divisible("N", counts.nt, config.per_core_n)?;
                check_divisible("K", counts.kt, config.per_core_k)?;
                check_divisible("per_core_M", config.per_core_m, config.subblock.h)?;
                check_divisible("per_core_N", config.per_core_n, config.subblock.w)?;
                let side = config.grid.square_side() as u64;
                check_blocks(counts, config.per_core_m, config.per_core_n, side * side)
            }
        }
    }
}
