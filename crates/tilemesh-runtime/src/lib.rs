#![warn(missing_docs)]

//! Runtime side of tilemesh.
//!
//! A [TensorRuntime] owns device memory and a command queue. Matmuls are issued without blocking
//! and only [TensorRuntime::synchronize] waits for them, which is what the benchmark driver times.
//! The [host](host) runtime implements the trait in process.

#[macro_use]
extern crate derive_new;

mod clock;
mod error;
mod handle;
mod runtime;

/// Global configuration and logging.
pub mod config;
/// In-process runtime.
pub mod host;
/// Per-name duration summary.
pub mod profiling;

pub use clock::*;
pub use error::*;
pub use handle::*;
pub use runtime::*;
