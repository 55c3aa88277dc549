use std::path::PathBuf;
use tilemesh_common::{ComputeGrid, ComputeKernelConfig, MathFidelity, TileShape};

/// Parameters shared by every benchmark case.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Untimed iterations run before measuring.
    pub num_warmup_iterations: u32,
    /// Timed iterations.
    pub num_measurement_iterations: u32,
    /// Path of the CSV report.
    pub report: PathBuf,
    /// Accumulate in 32-bit destination registers.
    pub fp32_dest_acc_en: bool,
    /// Allow approximate transcendental functions.
    pub math_approx_mode: bool,
    /// Accumulate partial results in on-chip memory.
    pub packer_l1_acc: bool,
    /// Cores used by each matmul.
    pub grid: ComputeGrid,
    /// Operand tile.
    pub tile: TileShape,
}

impl BenchmarkConfig {
    /// Compute engine settings for one fidelity.
    pub fn kernel_config(&self, math_fidelity: MathFidelity) -> ComputeKernelConfig {
        ComputeKernelConfig::new(
            math_fidelity,
            self.math_approx_mode,
            self.fp32_dest_acc_en,
            self.packer_l1_acc,
        )
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            num_warmup_iterations: 5,
            num_measurement_iterations: 100,
            report: PathBuf::from("generated/matmul_2d_host_perf_report.csv"),
            fp32_dest_acc_en: false,
            math_approx_mode: true,
            packer_l1_acc: true,
            grid: ComputeGrid::new(8, 8),
            tile: TileShape::new(32, 32),
        }
    }
}
