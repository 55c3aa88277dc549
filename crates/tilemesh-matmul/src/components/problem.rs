use tilemesh_common::{ComputeGrid, MatrixShape, OperandPlacements, TileShape};

/// Extra splits of the per-core blocks, used to fit large problems in on-chip memory.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockSplit {
    /// Number of steps the first operand block is consumed in along `K`.
    pub in0_block_w_div: u32,
    /// Number of output blocks per core along `M`.
    pub num_out_blocks_h: u32,
    /// Number of output blocks per core along `N`.
    pub num_out_blocks_w: u32,
}

impl Default for BlockSplit {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

/// Which tensors are block sharded over the compute grid.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sharding {
    /// The first operand is sharded.
    pub in0_sharded: bool,
    /// The output is sharded.
    pub out_sharded: bool,
}

impl Sharding {
    /// Placements of both operands and the output on `grid`.
    pub fn placements(&self, grid: ComputeGrid) -> OperandPlacements {
        OperandPlacements::from_flags(grid, self.in0_sharded, self.out_sharded)
    }
}

/// Description of a matmul problem to plan, regardless of actual data.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatmulProblem {
    /// Logical dimensions.
    pub shape: MatrixShape,
    /// Cores the problem is split over.
    pub grid: ComputeGrid,
    /// Operand tile.
    pub tile: TileShape,
    /// Extra block splits.
    pub split: BlockSplit,
    /// Sharded tensors.
    pub sharding: Sharding,
    /// Accumulate in 32-bit destination registers.
    pub fp32_dest_acc_en: bool,
}
