use core::fmt::Display;
use serde::{Deserialize, Serialize};

use crate::ComputeGrid;

/// Memory a buffer is allocated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferType {
    /// Off-chip memory.
    Dram,
    /// On-chip memory local to each core.
    L1,
}

impl Display for BufferType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BufferType::Dram => f.write_str("DRAM"),
            BufferType::L1 => f.write_str("L1"),
        }
    }
}

/// How a tensor is split across the cores of a shard grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardStrategy {
    /// Each core owns a band of rows.
    Height,
    /// Each core owns a band of columns.
    Width,
    /// Each core owns a rectangular block.
    Block,
}

/// Order in which shards are assigned to cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardOrientation {
    /// Shards are assigned along rows of the core grid first.
    RowMajor,
    /// Shards are assigned along columns of the core grid first.
    ColMajor,
}

/// Where the pages of a tensor live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryPlacement {
    /// Split across the on-chip memory of a grid of cores.
    Sharded {
        /// Cores holding a shard.
        grid: ComputeGrid,
        /// Shape of each shard.
        strategy: ShardStrategy,
        /// Shard to core assignment order.
        orientation: ShardOrientation,
    },
    /// Pages spread round-robin over the banks of one buffer type.
    Interleaved(BufferType),
}

impl MemoryPlacement {
    /// Interleaved in off-chip memory.
    pub const DRAM: MemoryPlacement = MemoryPlacement::Interleaved(BufferType::Dram);

    /// Block sharded over `grid`, assigning shards in row-major order.
    pub fn block_sharded(grid: ComputeGrid) -> Self {
        MemoryPlacement::Sharded {
            grid,
            strategy: ShardStrategy::Block,
            orientation: ShardOrientation::RowMajor,
        }
    }

    /// Buffer type backing this placement.
    pub fn storage_type(&self) -> BufferType {
        match self {
            MemoryPlacement::Sharded { .. } => BufferType::L1,
            MemoryPlacement::Interleaved(buffer) => *buffer,
        }
    }

    /// Whether this placement splits the tensor over cores.
    pub fn is_sharded(&self) -> bool {
        matches!(self, MemoryPlacement::Sharded { .. })
    }
}

/// Placement of both operands and the output of one matmul.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperandPlacements {
    /// First operand.
    pub in0: MemoryPlacement,
    /// Second operand.
    pub in1: MemoryPlacement,
    /// Output.
    pub out: MemoryPlacement,
}

impl OperandPlacements {
    /// Placements used by the benchmark: the first operand and the output may be block sharded
    /// over the compute grid, the second operand always streams from DRAM.
    pub fn from_flags(grid: ComputeGrid, in0_sharded: bool, out_sharded: bool) -> Self {
        let sharded_or_dram = |sharded: bool| match sharded {
            true => MemoryPlacement::block_sharded(grid),
            false => MemoryPlacement::DRAM,
        };

        Self {
            in0: sharded_or_dram(in0_sharded),
            in1: MemoryPlacement::DRAM,
            out: sharded_or_dram(out_sharded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharded_flags_map_to_l1() {
        let placements = OperandPlacements::from_flags(ComputeGrid::default(), true, false);

        assert_eq!(placements.in0.storage_type(), BufferType::L1);
        assert_eq!(placements.in1.storage_type(), BufferType::Dram);
        assert_eq!(placements.out.storage_type(), BufferType::Dram);
        assert!(placements.in0.is_sharded());
        assert_eq!(placements.in0.storage_type().to_string(), "L1");
        assert_eq!(placements.out.storage_type().to_string(), "DRAM");
    }
}
