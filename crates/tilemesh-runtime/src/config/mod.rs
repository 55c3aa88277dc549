/// Benchmark config module.
pub mod benchmark;
/// Device config module.
pub mod device;
/// Profiling config module.
pub mod profiling;
/// Sweep config module.
pub mod sweep;

mod base;
mod logger;

pub use base::*;
pub use benchmark::BenchmarkConfig;
pub use device::DeviceConfig;
pub use logger::*;
pub use sweep::SweepConfig;
