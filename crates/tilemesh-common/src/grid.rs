use core::fmt::Display;
use serde::{Deserialize, Serialize};

/// Width of a tile along the reduction dimension.
///
/// The first operand is always tiled with 32-wide tiles, so every count along `K` is expressed
/// in these units regardless of the configured [tile shape](TileShape).
pub const K_TILE: u32 = 32;

/// Extent of a rectangular mesh of compute cores.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputeGrid {
    /// Number of cores along the `N` direction.
    pub x: u32,
    /// Number of cores along the `M` direction.
    pub y: u32,
}

impl ComputeGrid {
    /// Total number of cores in the grid.
    pub fn num_cores(&self) -> u64 {
        self.x as u64 * self.y as u64
    }

    /// Side of the largest square sub-grid.
    pub fn square_side(&self) -> u32 {
        self.x.min(self.y)
    }

    /// Whether this grid fits inside `other`.
    pub fn fits_in(&self, other: &ComputeGrid) -> bool {
        self.x <= other.x && self.y <= other.y
    }
}

impl Default for ComputeGrid {
    fn default() -> Self {
        Self::new(8, 8)
    }
}

impl Display for ComputeGrid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Shape of one tile, in elements.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileShape {
    /// Rows per tile.
    pub h: u32,
    /// Columns per tile.
    pub w: u32,
}

impl TileShape {
    /// Tile used for the output of a matmul.
    ///
    /// Sharded outputs with short tiles keep a full 32-wide tile so the writer can emit whole
    /// rows.
    pub fn output_tile(&self, out_sharded: bool) -> TileShape {
        if out_sharded && self.h <= 16 {
            TileShape::new(self.h, K_TILE)
        } else {
            *self
        }
    }
}

impl Default for TileShape {
    fn default() -> Self {
        Self::new(32, 32)
    }
}

impl Display for TileShape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}", self.h, self.w)
    }
}
