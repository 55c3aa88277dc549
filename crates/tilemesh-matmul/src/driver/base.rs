use core::{fmt::Display, num::NonZeroU32, time::Duration};
use std::time::Instant;
use tilemesh_runtime::{MatmulDescriptor, TensorHandle, TensorRuntime};

use super::{ExecutionError, Trace};

/// How measured iterations are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// The host issues every iteration.
    Direct,
    /// One iteration is captured into a trace, which is then replayed.
    Traced,
}

impl ExecutionMode {
    /// Mode matching a `use_trace` flag.
    pub fn from_use_trace(use_trace: bool) -> Self {
        match use_trace {
            true => ExecutionMode::Traced,
            false => ExecutionMode::Direct,
        }
    }

    /// Whether iterations are replayed from a trace.
    pub fn use_trace(&self) -> bool {
        matches!(self, ExecutionMode::Traced)
    }
}

impl Display for ExecutionMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExecutionMode::Direct => f.write_str("direct"),
            ExecutionMode::Traced => f.write_str("traced"),
        }
    }
}

/// Number of untimed and timed iterations of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iterations {
    /// Untimed iterations.
    pub warmup: u32,
    /// Timed iterations.
    pub measured: NonZeroU32,
}

impl Iterations {
    /// Fails if no measured iteration is requested.
    pub fn new(warmup: u32, measured: u32) -> Result<Self, ExecutionError> {
        let measured = NonZeroU32::new(measured).ok_or(ExecutionError::InvalidIterations)?;

        Ok(Self { warmup, measured })
    }
}

/// Progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing issued yet.
    Idle,
    /// Warmup iterations completed.
    WarmedUp,
    /// Timed iterations in flight.
    Measuring,
    /// Timing done and trace released.
    Done,
}

impl Display for DriverState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            DriverState::Idle => "idle",
            DriverState::WarmedUp => "warmed up",
            DriverState::Measuring => "measuring",
            DriverState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of a run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Time between the first timed issue and the end of the final synchronization.
    pub elapsed: Duration,
    /// Number of timed iterations.
    pub iterations: NonZeroU32,
    /// Output of the last iteration. The caller owns it and must deallocate it.
    pub output: TensorHandle,
}

/// Warm up then time `iterations.measured` executions of `lhs @ rhs`.
///
/// Only the timed span goes from the first issue to the end of a single synchronization, so the
/// measured time covers device execution rather than per-iteration host latency. In
/// [traced](ExecutionMode::Traced) mode the capture happens before the timer starts.
pub fn run<R: TensorRuntime>(
    runtime: &mut R,
    descriptor: &MatmulDescriptor,
    lhs: &TensorHandle,
    rhs: &TensorHandle,
    iterations: Iterations,
    mode: ExecutionMode,
) -> Result<RunOutcome, ExecutionError> {
    let mut state = DriverState::Idle;

    for _ in 0..iterations.warmup {
        let output = runtime.matmul(lhs, rhs, descriptor)?;
        runtime.deallocate(output)?;
    }
    runtime.synchronize()?;
    transition(&mut state, DriverState::WarmedUp);

    let (elapsed, output) = match mode {
        ExecutionMode::Direct => {
            measure_direct(runtime, descriptor, lhs, rhs, iterations.measured, &mut state)?
        }
        ExecutionMode::Traced => {
            measure_traced(runtime, descriptor, lhs, rhs, iterations.measured, &mut state)?
        }
    };
    transition(&mut state, DriverState::Done);

    Ok(RunOutcome {
        elapsed,
        iterations: iterations.measured,
        output,
    })
}

fn measure_direct<R: TensorRuntime>(
    runtime: &mut R,
    descriptor: &MatmulDescriptor,
    lhs: &TensorHandle,
    rhs: &TensorHandle,
    measured: NonZeroU32,
    state: &mut DriverState,
) -> Result<(Duration, TensorHandle), ExecutionError> {
    transition(state, DriverState::Measuring);
    let start = Instant::now();

    let mut output = runtime.matmul(lhs, rhs, descriptor)?;
    let timed = (1..measured.get())
        .try_for_each(|_| {
            let next = runtime.matmul(lhs, rhs, descriptor)?;
            runtime.deallocate(core::mem::replace(&mut output, next))
        })
        .and_then(|_| runtime.synchronize())
        .map(|_| start.elapsed());

    match timed {
        Ok(elapsed) => Ok((elapsed, output)),
        Err(err) => {
            runtime.deallocate(output)?;
            Err(err.into())
        }
    }
}

fn measure_traced<R: TensorRuntime>(
    runtime: &mut R,
    descriptor: &MatmulDescriptor,
    lhs: &TensorHandle,
    rhs: &TensorHandle,
    measured: NonZeroU32,
    state: &mut DriverState,
) -> Result<(Duration, TensorHandle), ExecutionError> {
    let trace = Trace::capture(runtime, lhs, rhs, descriptor)?;

    transition(state, DriverState::Measuring);
    let start = Instant::now();
    let timed = (0..measured.get())
        .try_for_each(|_| trace.replay(runtime, lhs, rhs))
        .and_then(|_| runtime.synchronize().map_err(ExecutionError::from))
        .map(|_| start.elapsed());

    let output = trace.release(runtime)?;
    match timed {
        Ok(elapsed) => Ok((elapsed, output)),
        Err(err) => {
            runtime.deallocate(output)?;
            Err(err)
        }
    }
}

fn transition(state: &mut DriverState, next: DriverState) {
    log::debug!("Driver {state} -> {next}");
    *state = next;
}
