use core::fmt::Display;
use tilemesh_common::{
    ComputeGrid, ComputeKernelConfig, DataType, MathFidelity, MatrixShape, TileShape,
};
use tilemesh_runtime::config::{GlobalConfig, sweep::ShapeEntry};

use crate::{
    components::{BlockSplit, MatmulProblem, Sharding},
    driver::ExecutionMode,
};

/// One matmul configuration to benchmark.
#[derive(new, Debug, Clone, PartialEq)]
pub struct BenchmarkCase {
    /// Logical dimensions.
    pub shape: MatrixShape,
    /// Strategy tag, resolved when the case runs.
    pub strategy: String,
    /// Sharded tensors.
    pub sharding: Sharding,
    /// Extra block splits.
    pub split: BlockSplit,
    /// Element format.
    pub dtype: DataType,
    /// Compute engine settings.
    pub kernel: ComputeKernelConfig,
    /// How measured iterations are issued.
    pub mode: ExecutionMode,
    /// Cores used.
    pub grid: ComputeGrid,
    /// Operand tile.
    pub tile: TileShape,
}

/// The tuple identifying a case in logs and failure reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseId {
    /// Logical dimensions.
    pub shape: MatrixShape,
    /// Strategy tag.
    pub strategy: String,
    /// Element format.
    pub dtype: DataType,
    /// Matrix engine fidelity.
    pub fidelity: MathFidelity,
    /// Execution mode.
    pub mode: ExecutionMode,
}

impl Display for CaseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.shape, self.strategy, self.dtype, self.fidelity, self.mode
        )
    }
}

impl BenchmarkCase {
    /// Build a case from a row of a shape table.
    pub fn from_entry(
        entry: &ShapeEntry,
        dtype: DataType,
        kernel: ComputeKernelConfig,
        mode: ExecutionMode,
        grid: ComputeGrid,
        tile: TileShape,
    ) -> Self {
        Self::new(
            entry.shape(),
            entry.strategy.clone(),
            Sharding::new(entry.in0_sharded, entry.out_sharded),
            BlockSplit::new(
                entry.in0_block_w_div,
                entry.num_out_blocks_h,
                entry.num_out_blocks_w,
            ),
            dtype,
            kernel,
            mode,
            grid,
            tile,
        )
    }

    /// Identifying tuple of the case.
    pub fn id(&self) -> CaseId {
        CaseId {
            shape: self.shape,
            strategy: self.strategy.clone(),
            dtype: self.dtype,
            fidelity: self.kernel.math_fidelity,
            mode: self.mode,
        }
    }

    /// The planning problem of the case.
    pub fn problem(&self) -> MatmulProblem {
        MatmulProblem::new(
            self.shape,
            self.grid,
            self.tile,
            self.split,
            self.sharding,
            self.kernel.fp32_dest_acc_en,
        )
    }
}

/// Restricts the cases of a sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseFilter {
    /// Only this data type.
    pub dtype: Option<DataType>,
    /// Only this strategy tag.
    pub strategy: Option<String>,
    /// Only this execution mode.
    pub mode: Option<ExecutionMode>,
    /// Skip shapes with a dimension above this, overriding the configured limit.
    pub max_dim: Option<u32>,
}

impl CaseFilter {
    fn accepts(&self, case: &BenchmarkCase) -> bool {
        self.dtype.is_none_or(|dtype| dtype == case.dtype)
            && self
                .strategy
                .as_ref()
                .is_none_or(|strategy| *strategy == case.strategy)
            && self.mode.is_none_or(|mode| mode == case.mode)
    }
}

/// Every case of the configured sweep accepted by `filter`, in configuration order.
pub fn enumerate_cases(config: &GlobalConfig, filter: &CaseFilter) -> Vec<BenchmarkCase> {
    let benchmark = &config.benchmark;
    let max_dim = filter.max_dim.or(config.sweep.max_dim);

    let mut cases = Vec::new();
    for entry in config.sweep.configs.iter() {
        let kernel = benchmark.kernel_config(entry.math_fidelity);
        let mode = ExecutionMode::from_use_trace(entry.use_trace);

        for shape in config.sweep.shapes(entry.dtype) {
            if max_dim.is_some_and(|max_dim| shape.max_dim() > max_dim) {
                log::debug!("Skipping {} above the maximum dimension", shape.shape());
                continue;
            }

            let case = BenchmarkCase::from_entry(
                shape,
                entry.dtype,
                kernel,
                mode,
                benchmark.grid,
                benchmark.tile,
            );
            if filter.accepts(&case) {
                cases.push(case);
            }
        }
    }

    cases
}
