use core::fmt::Display;
use tilemesh_common::{K_TILE, MathFidelity, MatrixShape, SubblockShape, TileCounts, TileShape};

use super::{
    ConfigurationError, MatmulProblem, MatmulSetupError, check_divisible, grid_extent,
    select_subblock,
};

/// Split of a matmul over a grid of cores, all sizes in tiles.
///
/// Each core computes a `per_core_m x per_core_n` block of the output, itself split into output
/// blocks of `out_block_h x out_block_w` computed one subblock at a time. The first operand is
/// consumed `in0_block_w` tiles at a time along `K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TilingPlan {
    /// Logical dimensions of the planned problem.
    pub shape: MatrixShape,
    /// Operand tile.
    pub tile: TileShape,
    /// Tiles along `K` per step.
    pub in0_block_w: u32,
    /// Output tiles per core along `M`.
    pub per_core_m: u32,
    /// Output tiles per core along `N`.
    pub per_core_n: u32,
    /// Output tiles per output block along `M`.
    pub out_block_h: u32,
    /// Output tiles per output block along `N`.
    pub out_block_w: u32,
    /// Output subblock.
    pub subblock: SubblockShape,
}

impl TilingPlan {
    /// Derive the plan of a problem.
    ///
    /// Every split must be exact: `M` over `grid.y` rows of tiles, `N` over `grid.x` columns of
    /// tiles, `K` over `grid.x` times the first operand block divisor, and the per-core blocks
    /// over the output block counts.
    pub fn build(problem: &MatmulProblem) -> Result<Self, MatmulSetupError> {
        let MatmulProblem {
            shape,
            grid,
            tile,
            split,
            sharding,
            fp32_dest_acc_en,
        } = *problem;

        for (name, value) in [("M", shape.m), ("K", shape.k), ("N", shape.n)] {
            if value == 0 {
                return Err(ConfigurationError::Zero(name).into());
            }
        }
        if grid.num_cores() == 0 {
            return Err(ConfigurationError::Zero("grid").into());
        }
        if tile.h == 0 || tile.w == 0 {
            return Err(ConfigurationError::Zero("tile").into());
        }

        check_divisible("M", shape.m, grid_extent("M", grid.y, tile.h)?)?;
        check_divisible("N", shape.n, grid_extent("N", grid.x, tile.w)?)?;
        check_divisible("K", shape.k, grid_extent("K", grid.x, K_TILE)?)?;
        check_divisible(
            "K tiles per core",
            shape.k / grid.x / K_TILE,
            split.in0_block_w_div,
        )?;

        let in0_block_w = shape.k / grid.x / K_TILE / split.in0_block_w_div;
        let per_core_m = shape.m / grid.y / tile.h;
        let per_core_n = shape.n / grid.x / tile.w;

        check_divisible("per_core_M", per_core_m, split.num_out_blocks_h)?;
        check_divisible("per_core_N", per_core_n, split.num_out_blocks_w)?;

        let out_block_h = per_core_m / split.num_out_blocks_h;
        let out_block_w = per_core_n / split.num_out_blocks_w;
        let subblock = select_subblock(
            out_block_h,
            out_block_w,
            sharding.out_sharded,
            fp32_dest_acc_en,
        );

        Ok(Self {
            shape,
            tile,
            in0_block_w,
            per_core_m,
            per_core_n,
            out_block_h,
            out_block_w,
            subblock,
        })
    }

    /// Dimensions of the problem counted in tiles.
    pub fn tile_counts(&self) -> TileCounts {
        TileCounts::of(&self.shape, &self.tile)
    }

    /// Cycles `cores` cores need to compute the problem at `fidelity` if they never stall.
    pub fn ideal_cycles(&self, fidelity: MathFidelity, cores: u64) -> f64 {
        let tile_products = self.shape.volume()
            / self.tile.h as f64
            / self.tile.w as f64
            / K_TILE as f64;

        tile_products * fidelity.cycles_per_tile() as f64 / cores as f64
    }
}

impl Display for TilingPlan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "M*K*N = {} in0_block_w: {}, per_core_M: {}, per_core_N: {}, out_block: {}x{}, \
             out_subblock_h: {}, out_subblock_w: {}",
            self.shape,
            self.in0_block_w,
            self.per_core_m,
            self.per_core_n,
            self.out_block_h,
            self.out_block_w,
            self.subblock.h,
            self.subblock.w,
        )
    }
}

/// Derive the plan of a problem. See [TilingPlan::build].
pub fn build_plan(problem: &MatmulProblem) -> Result<TilingPlan, MatmulSetupError> {
    TilingPlan::build(problem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BlockSplit, Sharding};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use tilemesh_common::ComputeGrid;

    fn problem(m: u32, k: u32, n: u32, split: BlockSplit, out_sharded: bool) -> MatmulProblem {
        MatmulProblem::new(
            MatrixShape::new(m, k, n),
            ComputeGrid::new(8, 8),
            TileShape::default(),
            split,
            Sharding::new(out_sharded, out_sharded),
            false,
        )
    }

    #[test]
    fn small_square_problem() {
        let plan = build_plan(&problem(512, 512, 512, BlockSplit::default(), false)).unwrap();

        assert_eq!(plan.per_core_m, 2);
        assert_eq!(plan.per_core_n, 2);
        assert_eq!(plan.in0_block_w, 2);
        assert_eq!(plan.subblock, SubblockShape::new(2, 2));
    }

    #[test]
    fn split_output_blocks_with_sharded_output() {
        let plan = build_plan(&problem(4096, 4096, 4096, BlockSplit::new(1, 2, 2), true)).unwrap();

        assert_eq!(plan.per_core_m, 16);
        assert_eq!(plan.out_block_h, 8);
        assert_eq!(plan.out_block_w, 8);
        assert_eq!(plan.out_block_w % plan.subblock.w, 0);
        assert_eq!(plan.subblock.h, 1);
    }

    #[test]
    fn rectangular_problem() {
        let plan = build_plan(&problem(512, 1024, 2048, BlockSplit::default(), true)).unwrap();

        assert_eq!(plan.in0_block_w, 4);
        assert_eq!(plan.per_core_m, 2);
        assert_eq!(plan.per_core_n, 8);
        assert_eq!(plan.subblock, SubblockShape::new(1, 8));
    }

    #[test]
    fn uneven_dimensions_are_rejected() {
        let error = build_plan(&problem(500, 512, 512, BlockSplit::default(), false)).unwrap_err();

        assert_eq!(
            error,
            MatmulSetupError::Configuration(ConfigurationError::NotDivisible {
                dim: "M",
                value: 500,
                divisor: 256
            })
        );
    }

    #[test]
    fn uneven_block_splits_are_rejected() {
        let error = build_plan(&problem(512, 512, 512, BlockSplit::new(1, 3, 1), false)).unwrap_err();
        assert!(matches!(
            error,
            MatmulSetupError::Configuration(ConfigurationError::NotDivisible {
                dim: "per_core_M",
                ..
            })
        ));

        let error = build_plan(&problem(512, 512, 512, BlockSplit::new(0, 1, 1), false)).unwrap_err();
        assert!(matches!(
            error,
            MatmulSetupError::Configuration(ConfigurationError::Zero(_))
        ));
    }

    #[test]
    fn oversized_grids_are_configuration_errors() {
        let mut problem = problem(1024, 1024, 1024, BlockSplit::default(), false);
        problem.grid = ComputeGrid::new(70000, 70000);

        assert_eq!(
            build_plan(&problem),
            Err(MatmulSetupError::Configuration(ConfigurationError::NotDivisible {
                dim: "M",
                value: 1024,
                divisor: 70000 * 32
            }))
        );

        problem.grid = ComputeGrid::new(u32::MAX, 1);
        assert_eq!(
            build_plan(&problem),
            Err(MatmulSetupError::Configuration(ConfigurationError::Overflow {
                dim: "N",
                cores: u32::MAX,
                tile: 32
            }))
        );
    }

    #[test]
    fn ideal_cycles_follow_the_fidelity() {
        let plan = build_plan(&problem(512, 512, 512, BlockSplit::default(), false)).unwrap();
        let lofi = plan.ideal_cycles(MathFidelity::LoFi, 64);

        // 16 * 16 * 16 tile products of 16 cycles over 64 cores.
        assert_eq!(lofi, 1024.0);
        assert_eq!(plan.ideal_cycles(MathFidelity::HiFi4, 64), 4.0 * lofi);
    }

    proptest! {
        #[test]
        fn plans_always_divide_their_blocks(
            grid_x in 1u32..9,
            grid_y in 1u32..9,
            tiles_m in 1u32..17,
            tiles_k in 1u32..9,
            tiles_n in 1u32..17,
            out_sharded in any::<bool>()
        ) {
            let problem = MatmulProblem::new(
                MatrixShape::new(grid_y * 32 * tiles_m, grid_x * 32 * tiles_k, grid_x * 32 * tiles_n),
                ComputeGrid::new(grid_x, grid_y),
                TileShape::default(),
                BlockSplit::default(),
                Sharding::new(false, out_sharded),
                false,
            );

            let plan = build_plan(&problem).unwrap();

            prop_assert_eq!(plan.out_block_h % plan.subblock.h, 0);
            prop_assert_eq!(plan.out_block_w % plan.subblock.w, 0);
            prop_assert_eq!(plan.per_core_m, tiles_m);
            prop_assert_eq!(plan.in0_block_w, tiles_k);
            prop_assert_eq!(build_plan(&problem).unwrap(), plan);
        }
    }
}
