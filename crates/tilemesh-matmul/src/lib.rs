#![warn(missing_docs)]

//! Tiled matmul planning and benchmarking.
//!
//! A benchmark case goes through the [components] first: the [plan](components::TilingPlan)
//! splits the problem over the cores, the [strategy](components::Strategy) turns the plan into a
//! program configuration. The [driver] then runs the program directly or through a trace, and
//! the [analysis] turns the measured time into throughput and utilization. The [sweep] runs every
//! configured case and hands the results to a [report] sink.

#[macro_use]
extern crate derive_new;

/// Planning components.
pub mod components;
/// Execution driver.
pub mod driver;
/// Performance model.
pub mod analysis;
/// Report sinks.
pub mod report;
/// Benchmark sweep.
pub mod sweep;
