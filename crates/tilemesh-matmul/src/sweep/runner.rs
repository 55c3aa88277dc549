use rand::{Rng, SeedableRng, rngs::StdRng};
use std::time::Instant;
use thiserror::Error;
use tilemesh_common::{K_TILE, TileShape};
use tilemesh_runtime::{
    ClockSource, MatmulDescriptor, TensorDescriptor, TensorHandle, TensorRuntime,
};

use super::{BenchmarkCase, CaseId};
use crate::{
    analysis::analyze,
    components::{MatmulSetupError, build_plan, resolve},
    driver::{BenchContext, ExecutionError, Iterations, run},
    report::{ReportError, ReportRow, ReportSink},
};

/// Seed of the second operand, so every run of a case multiplies the same values.
const INPUT_SEED: u64 = 0x5eed;

/// Errors that end a single case.
#[derive(Error, Debug)]
pub enum CaseError {
    /// The case couldn't be planned.
    #[error("{0}")]
    Setup(#[from] MatmulSetupError),

    /// The case failed while running.
    #[error("{0}")]
    Execution(#[from] ExecutionError),
}

/// A case that failed, with the reason.
#[derive(Debug)]
pub struct CaseFailure {
    /// Case that failed.
    pub id: CaseId,
    /// Why it failed.
    pub error: CaseError,
}

/// Outcome of a sweep.
#[derive(Debug, Default)]
pub struct SweepSummary {
    /// Rows of the cases that completed, in order.
    pub samples: Vec<ReportRow>,
    /// Cases that failed, in order.
    pub failures: Vec<CaseFailure>,
}

/// Plan, run and analyze one case.
///
/// The operands and the output are deallocated before returning, whether the case succeeds or
/// not.
pub fn run_case<R: TensorRuntime, C: ClockSource>(
    context: &mut BenchContext<R, C>,
    case: &BenchmarkCase,
    iterations: Iterations,
) -> Result<ReportRow, CaseError> {
    let start = Instant::now();
    let id = case.id();

    let plan = build_plan(&case.problem())?;
    log::debug!("{id}: {plan}");
    let program = resolve(&case.strategy, &plan, case.grid, case.dtype)?;
    context.profile_program(&format!("{id}: {program:?}"));

    let placements = case.sharding.placements(case.grid);
    let descriptor = MatmulDescriptor::new(
        program,
        placements.out,
        case.dtype,
        case.kernel,
        case.tile,
        case.tile.output_tile(case.sharding.out_sharded),
    );

    let runtime = &mut context.runtime;
    let lhs = runtime
        .upload(
            &vec![1.0; case.shape.m as usize * case.shape.k as usize],
            TensorDescriptor::new(
                case.shape.lhs(),
                case.dtype,
                placements.in0,
                TileShape::new(case.tile.h, K_TILE),
            ),
        )
        .map_err(ExecutionError::from)?;
    let rhs = match runtime.upload(
        &random_values(case.shape.k as usize * case.shape.n as usize),
        TensorDescriptor::new(
            case.shape.rhs(),
            case.dtype,
            placements.in1,
            TileShape::new(K_TILE, case.tile.w),
        ),
    ) {
        Ok(rhs) => rhs,
        Err(err) => {
            runtime.deallocate(lhs).map_err(ExecutionError::from)?;
            return Err(ExecutionError::from(err).into());
        }
    };

    let outcome = run(runtime, &descriptor, &lhs, &rhs, iterations, case.mode);
    let released = release_inputs(runtime, lhs, rhs);
    let outcome = outcome?;
    released?;
    runtime
        .deallocate(outcome.output)
        .and_then(|_| runtime.synchronize())
        .map_err(ExecutionError::from)?;

    let sample = analyze(
        &plan,
        case.kernel.math_fidelity,
        case.grid,
        runtime.compute_grid(),
        outcome.elapsed,
        outcome.iterations,
        context.clock.frequency_mhz(),
    );
    context.profile(&id.to_string(), start.elapsed());

    Ok(ReportRow::new(
        case.shape.m,
        case.shape.k,
        case.shape.n,
        case.mode.use_trace(),
        case.grid,
        case.sharding.in0_sharded,
        case.sharding.out_sharded,
        placements.in0.storage_type(),
        placements.in1.storage_type(),
        placements.out.storage_type(),
        case.dtype,
        case.kernel.math_fidelity,
        sample,
    ))
}

/// Run every case, recording completed ones into `sink`.
///
/// A failing case is logged and skipped. Only a failure of the sink itself stops the sweep.
pub fn run_sweep<R: TensorRuntime, C: ClockSource, S: ReportSink>(
    context: &mut BenchContext<R, C>,
    cases: &[BenchmarkCase],
    iterations: Iterations,
    sink: &mut S,
) -> Result<SweepSummary, ReportError> {
    let mut summary = SweepSummary::default();

    for (index, case) in cases.iter().enumerate() {
        let id = case.id();

        match run_case(context, case, iterations) {
            Ok(row) => {
                if context.log_every_case() {
                    context.log_sweep(&format!(
                        "[{}/{}] {id}: {}",
                        index + 1,
                        cases.len(),
                        row.sample
                    ));
                }
                sink.record(&row)?;
                summary.samples.push(row);
            }
            Err(error) => {
                context.log_sweep(&format!(
                    "[{}/{}] {id} failed: {error}",
                    index + 1,
                    cases.len()
                ));
                summary.failures.push(CaseFailure { id, error });
            }
        }
    }
    sink.finish()?;

    log::info!(
        "Sweep done: {} cases completed, {} failed",
        summary.samples.len(),
        summary.failures.len()
    );
    Ok(summary)
}

fn release_inputs<R: TensorRuntime>(
    runtime: &mut R,
    lhs: TensorHandle,
    rhs: TensorHandle,
) -> Result<(), ExecutionError> {
    let lhs = runtime.deallocate(lhs);
    let rhs = runtime.deallocate(rhs);

    lhs.and(rhs).map_err(ExecutionError::from)
}

fn random_values(len: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(INPUT_SEED);
    (0..len).map(|_| rng.random::<f32>()).collect()
}
