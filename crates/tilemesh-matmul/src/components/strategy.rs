use core::{fmt::Display, str::FromStr};
use tilemesh_common::{
    CannonConfig, ComputeGrid, DataType, ProgramConfig, ReuseConfig, ReuseMultiCastConfig,
};

use super::{ConfigurationError, MatmulSetupError, TilingPlan, UnsupportedStrategyError};

/// Destination registers available to a subblock with 16-bit accumulation.
const MAX_SUBBLOCK_TILES: u32 = 8;

/// The multiply strategies a benchmark case can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The runtime picks its own tiling.
    NonOptimized,
    /// Every core re-reads its operand rows and columns.
    Reuse,
    /// Operand rows and columns are multicast over rows and columns of cores.
    ReuseMultiCast,
    /// Operand blocks rotate between neighbouring cores.
    Cannon,
}

impl Strategy {
    /// Every strategy, in increasing order of data movement sophistication.
    pub const ALL: [Strategy; 4] = [
        Strategy::NonOptimized,
        Strategy::Reuse,
        Strategy::ReuseMultiCast,
        Strategy::Cannon,
    ];

    /// Whether kernels exist for the data type.
    pub fn supports(&self, dtype: DataType) -> bool {
        match self {
            Strategy::Cannon => dtype == DataType::Bfloat16,
            _ => true,
        }
    }

    /// Build the program configuration of this strategy from a plan.
    pub fn program(&self, plan: &TilingPlan, grid: ComputeGrid) -> ProgramConfig {
        match self {
            Strategy::NonOptimized => ProgramConfig::NonOptimized,
            Strategy::Reuse => ProgramConfig::Reuse(ReuseConfig::new(
                grid,
                plan.in0_block_w,
                plan.subblock,
                plan.per_core_m,
                plan.per_core_n,
            )),
            Strategy::ReuseMultiCast => ProgramConfig::ReuseMultiCast(ReuseMultiCastConfig::new(
                grid,
                plan.in0_block_w,
                plan.subblock,
                plan.out_block_h,
                plan.out_block_w,
                plan.per_core_m,
                plan.per_core_n,
                false,
                None,
            )),
            Strategy::Cannon => ProgramConfig::Cannon(CannonConfig::new(
                grid,
                plan.subblock,
                plan.per_core_m,
                plan.per_core_n,
                plan.per_core_m,
            )),
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Strategy::NonOptimized => "NonOptimized",
            Strategy::Reuse => "Reuse",
            Strategy::ReuseMultiCast => "ReuseMultiCast",
            Strategy::Cannon => "Cannon",
        };
        f.write_str(name)
    }
}

impl FromStr for Strategy {
    type Err = UnsupportedStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NonOptimized" => Ok(Strategy::NonOptimized),
            "Reuse" => Ok(Strategy::Reuse),
            "ReuseMultiCast" => Ok(Strategy::ReuseMultiCast),
            "Cannon" => Ok(Strategy::Cannon),
            _ => Err(UnsupportedStrategyError::Unknown(s.to_string())),
        }
    }
}

/// Resolve a strategy tag and a plan into the program configuration the runtime executes.
///
/// The resulting program is checked against the problem before being returned, so a program that
/// the runtime would reject at issue time fails here with a [ConfigurationError].
pub fn resolve(
    tag: &str,
    plan: &TilingPlan,
    grid: ComputeGrid,
    dtype: DataType,
) -> Result<ProgramConfig, MatmulSetupError> {
    let strategy = tag.parse::<Strategy>()?;

    if !strategy.supports(dtype) {
        return Err(UnsupportedStrategyError::DataType { strategy, dtype }.into());
    }

    let program = strategy.program(plan, grid);
    program
        .validate(&plan.tile_counts(), grid, MAX_SUBBLOCK_TILES)
        .map_err(ConfigurationError::Program)?;

    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BlockSplit, MatmulProblem, Sharding, build_plan};
    use pretty_assertions::assert_eq;
    use tilemesh_common::{MatrixShape, ProgramError, TileShape};

    fn plan(m: u32, k: u32, n: u32) -> TilingPlan {
        build_plan(&MatmulProblem::new(
            MatrixShape::new(m, k, n),
            ComputeGrid::default(),
            TileShape::default(),
            BlockSplit::default(),
            Sharding::default(),
            false,
        ))
        .unwrap()
    }

    #[test]
    fn cannon_exchanges_square_blocks() {
        let plan = plan(1024, 1024, 1024);
        assert_eq!(plan.per_core_m, 4);

        let program = resolve("Cannon", &plan, ComputeGrid::default(), DataType::Bfloat16).unwrap();

        match program {
            ProgramConfig::Cannon(config) => {
                assert_eq!(config.per_core_k, 4);
                assert_eq!(config.per_core_k, config.per_core_m);
            }
            other => panic!("Expected a Cannon program, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let result = resolve(
            "Quantum",
            &plan(512, 512, 512),
            ComputeGrid::default(),
            DataType::Bfloat16,
        );

        assert_eq!(
            result,
            Err(MatmulSetupError::UnsupportedStrategy(
                UnsupportedStrategyError::Unknown("Quantum".to_string())
            ))
        );
    }

    #[test]
    fn tags_are_case_sensitive() {
        assert!("cannon".parse::<Strategy>().is_err());
        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>(), Ok(strategy));
        }
    }

    #[test]
    fn cannon_requires_bfloat16() {
        let result = resolve(
            "Cannon",
            &plan(512, 512, 512),
            ComputeGrid::default(),
            DataType::Bfloat8B,
        );

        assert!(matches!(
            result,
            Err(MatmulSetupError::UnsupportedStrategy(
                UnsupportedStrategyError::DataType {
                    strategy: Strategy::Cannon,
                    dtype: DataType::Bfloat8B
                }
            ))
        ));
    }

    #[test]
    fn cannon_requires_a_square_problem() {
        let result = resolve(
            "Cannon",
            &plan(512, 512, 1024),
            ComputeGrid::default(),
            DataType::Bfloat16,
        );

        assert!(matches!(
            result,
            Err(MatmulSetupError::Configuration(ConfigurationError::Program(
                ProgramError::NotSquare { mt: 16, nt: 32 }
            )))
        ));
    }

    #[test]
    fn multicast_carries_output_blocks() {
        let plan = plan(512, 1024, 2048);
        let program =
            resolve("ReuseMultiCast", &plan, ComputeGrid::default(), DataType::Bfloat4B).unwrap();

        assert_eq!(
            program,
            ProgramConfig::ReuseMultiCast(ReuseMultiCastConfig::new(
                ComputeGrid::default(),
                4,
                plan.subblock,
                2,
                8,
                2,
                8,
                false,
                None,
            ))
        );
    }

    #[test]
    fn non_optimized_carries_nothing() {
        let program = resolve(
            "NonOptimized",
            &plan(512, 512, 512),
            ComputeGrid::default(),
            DataType::Bfloat16,
        )
        .unwrap();

        assert_eq!(program, ProgramConfig::NonOptimized);
        assert_eq!(program.grid(), None);
    }
}
