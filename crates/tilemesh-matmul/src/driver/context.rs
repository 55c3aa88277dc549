use core::time::Duration;
use std::sync::Arc;
use tilemesh_runtime::{
    ClockSource, FixedClock, TensorRuntime,
    config::{
        GlobalConfig, Logger, profiling::ProfilingLogLevel, sweep::SweepLogLevel,
    },
    host::HostRuntime,
    profiling::Profiled,
};

/// Everything a sweep needs from the outside world: the device, its clock and where profiling
/// goes.
///
/// A context is created when a sweep starts and [closed](BenchContext::close) when it ends.
pub struct BenchContext<R: TensorRuntime, C: ClockSource> {
    /// Device running the matmuls.
    pub runtime: R,
    /// Source of the device clock frequency.
    pub clock: C,
    profiled: Profiled,
    logger: Logger,
}

impl BenchContext<HostRuntime, FixedClock> {
    /// A context backed by the host runtime, configured from `config`.
    pub fn host(config: Arc<GlobalConfig>) -> Self {
        let runtime = HostRuntime::from_config(&config.device);
        let clock = FixedClock::from_config(&config.device);

        Self::new(runtime, clock, Logger::from_config(config))
    }
}

impl<R: TensorRuntime, C: ClockSource> BenchContext<R, C> {
    /// Create a context from its parts.
    pub fn new(runtime: R, clock: C, logger: Logger) -> Self {
        Self {
            runtime,
            clock,
            profiled: Profiled::default(),
            logger,
        }
    }

    /// Configuration the context was built from.
    pub fn config(&self) -> &GlobalConfig {
        &self.logger.config
    }

    /// Record the duration of one benchmark case.
    pub fn profile(&mut self, name: &str, duration: Duration) {
        if self.logger.log_level_profiling() == ProfilingLogLevel::Disabled {
            return;
        }

        self.profiled.update(name, duration);
        if matches!(
            self.logger.log_level_profiling(),
            ProfilingLogLevel::Medium | ProfilingLogLevel::Full
        ) {
            self.logger.log_profiling(&format!("| {duration:<10?} | {name}"));
        }
    }

    /// Log the resolved program of a case, at the most verbose profiling level only.
    pub fn profile_program<S: core::fmt::Display>(&mut self, program: &S) {
        if self.logger.log_level_profiling() == ProfilingLogLevel::Full {
            self.logger.log_profiling(program);
        }
    }

    /// Log a sweep progress message.
    pub fn log_sweep(&mut self, msg: &str) {
        self.logger.log_sweep(&msg);
    }

    /// Whether sweep progress of every case is logged, not only failures.
    pub fn log_every_case(&self) -> bool {
        self.logger.log_level_sweep() == SweepLogLevel::Full
    }

    /// End the sweep, logging and returning the profiling summary.
    pub fn close(mut self) -> Profiled {
        if !self.profiled.is_empty() {
            let summary = self.profiled.to_string();
            self.logger.log_profiling(&summary);
        }

        self.profiled
    }
}
