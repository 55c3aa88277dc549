//! Tiled matmul execution planner and trace-based benchmark harness.
//!
//! See [matmul] for planning and running cases, and [runtime] for the device boundary and the
//! configuration.

pub use tilemesh_common::*;

pub use tilemesh_matmul as matmul;
pub use tilemesh_runtime as runtime;
