use thiserror::Error;
use tilemesh_runtime::RuntimeError;

/// Errors that can occur while running a planned matmul.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// A trace was replayed on operands of another shape than the ones it was captured with.
    ///
    /// Traces are specialized to their shapes, so this is a driver bug.
    #[error("Trace captured with {operand} of shape {expected:?} replayed with shape {actual:?}")]
    TraceShapeMismatch {
        /// Operand whose shape changed.
        operand: &'static str,
        /// Shape at capture.
        expected: [usize; 2],
        /// Shape at replay.
        actual: [usize; 2],
    },

    /// The runtime refused a command.
    #[error("Runtime error\nCaused by:\n  {0}")]
    Runtime(#[from] RuntimeError),

    /// No measured iteration was requested.
    #[error("At least one measured iteration is required")]
    InvalidIterations,
}
