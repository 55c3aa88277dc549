use core::{fmt::Display, num::NonZeroU32, time::Duration};
use tilemesh_common::{ComputeGrid, MathFidelity};

use crate::components::TilingPlan;

/// Throughput and utilization of a measured run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceSample {
    /// Time of all measured iterations.
    pub elapsed: Duration,
    /// Number of measured iterations.
    pub iterations: NonZeroU32,
    /// Time of one iteration.
    pub avg_inference_time: Duration,
    /// Achieved tera floating point operations per second.
    pub tflops: f64,
    /// Ideal over measured cycles, with the work spread over the user grid.
    pub utilization_user_grid: f64,
    /// Ideal over measured cycles, with the work spread over the full device grid.
    pub utilization_full_grid: f64,
}

/// Turn a measured time into a [PerformanceSample].
///
/// Utilization compares the measured cycles to [the ideal ones](TilingPlan::ideal_cycles). The
/// ideal model ignores data movement, so it isn't an upper bound on real throughput and values
/// above 1 are kept as they are.
pub fn analyze(
    plan: &TilingPlan,
    fidelity: MathFidelity,
    user_grid: ComputeGrid,
    full_grid: ComputeGrid,
    elapsed: Duration,
    iterations: NonZeroU32,
    frequency_mhz: f64,
) -> PerformanceSample {
    let avg_inference_time = elapsed / iterations.get();
    let seconds = avg_inference_time.as_secs_f64();

    let tflops = plan.shape.flops() / 1e12 / seconds;
    let inference_cycles = seconds * frequency_mhz * 1e6;

    let utilization = |grid: ComputeGrid| {
        plan.ideal_cycles(fidelity, grid.num_cores()) / inference_cycles
    };

    PerformanceSample {
        elapsed,
        iterations,
        avg_inference_time,
        tflops,
        utilization_user_grid: utilization(user_grid),
        utilization_full_grid: utilization(full_grid),
    }
}

impl Display for PerformanceSample {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "time {:.2} ns, {:.2} TFLOPs, utilization {:.2}% (user grid) {:.2}% (full grid)",
            self.avg_inference_time.as_secs_f64() * 1e9,
            self.tflops,
            self.utilization_user_grid * 100.0,
            self.utilization_full_grid * 100.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BlockSplit, MatmulProblem, Sharding, build_plan};
    use tilemesh_common::{MatrixShape, TileShape};

    fn plan(grid: ComputeGrid) -> TilingPlan {
        build_plan(&MatmulProblem::new(
            MatrixShape::new(512, 512, 512),
            grid,
            TileShape::default(),
            BlockSplit::default(),
            Sharding::default(),
            false,
        ))
        .unwrap()
    }

    fn iterations(count: u32) -> NonZeroU32 {
        NonZeroU32::new(count).unwrap()
    }

    #[test]
    fn throughput_of_a_known_run() {
        let grid = ComputeGrid::new(8, 8);
        let sample = analyze(
            &plan(grid),
            MathFidelity::LoFi,
            grid,
            grid,
            Duration::from_micros(100),
            iterations(10),
            1000.0,
        );

        assert_eq!(sample.avg_inference_time, Duration::from_micros(10));
        // 2 * 512^3 flops in 10 us.
        assert!((sample.tflops - 26.8435456).abs() < 1e-9);
        // 1024 ideal cycles against 10 000 measured ones.
        assert!((sample.utilization_user_grid - 0.1024).abs() < 1e-12);
        assert_eq!(sample.utilization_user_grid, sample.utilization_full_grid);
    }

    #[test]
    fn smaller_grids_report_higher_user_utilization() {
        let user = ComputeGrid::new(4, 4);
        let sample = analyze(
            &plan(user),
            MathFidelity::HiFi2,
            user,
            ComputeGrid::new(8, 8),
            Duration::from_millis(1),
            iterations(3),
            1000.0,
        );

        assert!(sample.utilization_user_grid >= sample.utilization_full_grid);
        assert!((sample.utilization_user_grid / sample.utilization_full_grid - 4.0).abs() < 1e-9);
    }

    #[test]
    fn utilization_is_not_clamped() {
        let grid = ComputeGrid::new(8, 8);
        let sample = analyze(
            &plan(grid),
            MathFidelity::HiFi4,
            grid,
            grid,
            Duration::from_nanos(100),
            iterations(1),
            1000.0,
        );

        // 4096 ideal cycles against 100 measured ones.
        assert!(sample.utilization_user_grid > 40.0);
        assert!(sample.to_string().contains("4096.00% (user grid)"));
    }
}
