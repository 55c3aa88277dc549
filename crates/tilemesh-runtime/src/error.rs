use thiserror::Error;
use tilemesh_common::ProgramError;

use crate::{TensorId, TraceId};

/// Errors reported by a [TensorRuntime](crate::TensorRuntime).
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The tensor was never allocated by this runtime, or was deallocated.
    #[error("Tensor {0} is unknown to the runtime")]
    UnknownTensor(TensorId),

    /// The trace was never captured by this runtime, or was released.
    #[error("Trace {0} is unknown to the runtime")]
    UnknownTrace(TraceId),

    /// A tensor can't be deallocated while a live trace references it.
    #[error("Tensor {tensor} is still referenced by trace {trace}")]
    TensorInUse {
        /// Tensor being deallocated.
        tensor: TensorId,
        /// Trace holding a reference to it.
        trace: TraceId,
    },

    /// The operation isn't allowed while a trace is being captured.
    #[error("Can't {operation} while trace {trace} is being captured")]
    CaptureInProgress {
        /// Rejected operation.
        operation: &'static str,
        /// Trace under capture.
        trace: TraceId,
    },

    /// Ending a capture that wasn't started.
    #[error("No capture in progress for trace {0}")]
    NoCaptureInProgress(TraceId),

    /// Operand shapes are incompatible.
    #[error("Shape mismatch: {lhs:?} can't be multiplied with {rhs:?}")]
    ShapeMismatch {
        /// Shape of the first operand.
        lhs: [usize; 2],
        /// Shape of the second operand.
        rhs: [usize; 2],
    },

    /// Uploaded data doesn't match the declared shape.
    #[error("Expected {expected} values for the declared shape, got {actual}")]
    DataLength {
        /// Number of values implied by the shape.
        expected: usize,
        /// Number of values provided.
        actual: usize,
    },

    /// The commands recorded in a trace don't fit in the trace region of the device.
    #[error("Trace {trace} needs {required} bytes but the trace region holds {available}")]
    TraceRegionExceeded {
        /// Trace under capture.
        trace: TraceId,
        /// Bytes the trace would take with the rejected command.
        required: u64,
        /// Size of the trace region.
        available: u64,
    },

    /// The program configuration can't run on the given operands.
    #[error("Invalid program configuration\nCaused by:\n  {0}")]
    InvalidProgram(#[from] ProgramError),

    /// An io error happened while talking to the device.
    #[error("An io error happened\nCaused by:\n  {0}")]
    Io(#[from] std::io::Error),
}
