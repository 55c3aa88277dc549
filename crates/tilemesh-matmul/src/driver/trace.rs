use tilemesh_runtime::{MatmulDescriptor, TensorHandle, TensorRuntime, TraceId};

use super::ExecutionError;

/// A matmul recorded once into a device trace.
///
/// The trace keeps the operands and the output it was captured with alive in the runtime until
/// it is [released](Trace::release). Releasing consumes the handle, so a released trace can't be
/// replayed.
#[derive(Debug)]
pub struct Trace {
    id: TraceId,
    lhs_shape: [usize; 2],
    rhs_shape: [usize; 2],
    output: TensorHandle,
}

impl Trace {
    /// Record `lhs @ rhs` without executing it.
    pub fn capture<R: TensorRuntime>(
        runtime: &mut R,
        lhs: &TensorHandle,
        rhs: &TensorHandle,
        descriptor: &MatmulDescriptor,
    ) -> Result<Self, ExecutionError> {
        let lhs_shape = runtime.shape(lhs)?;
        let rhs_shape = runtime.shape(rhs)?;

        let id = runtime.begin_trace_capture()?;
        let output = match runtime.matmul(lhs, rhs, descriptor) {
            Ok(output) => output,
            Err(err) => {
                runtime.end_trace_capture(id)?;
                runtime.release_trace(id)?;
                return Err(err.into());
            }
        };
        if let Err(err) = runtime.end_trace_capture(id) {
            // The capture error is the one reported.
            let _ = runtime.release_trace(id);
            let _ = runtime.deallocate(output);
            return Err(err.into());
        }

        log::debug!("Captured {id} for {lhs_shape:?} @ {rhs_shape:?}");

        Ok(Self {
            id,
            lhs_shape,
            rhs_shape,
            output,
        })
    }

    /// Id of the trace in the runtime.
    pub fn id(&self) -> TraceId {
        self.id
    }

    /// Queue one execution of the recorded matmul.
    ///
    /// The operands must have the shapes the trace was captured with.
    pub fn replay<R: TensorRuntime>(
        &self,
        runtime: &mut R,
        lhs: &TensorHandle,
        rhs: &TensorHandle,
    ) -> Result<(), ExecutionError> {
        self.check_shape("lhs", self.lhs_shape, runtime.shape(lhs)?)?;
        self.check_shape("rhs", self.rhs_shape, runtime.shape(rhs)?)?;

        runtime.execute_trace(self.id)?;
        Ok(())
    }

    /// Release the trace, handing back the output it writes to.
    pub fn release<R: TensorRuntime>(self, runtime: &mut R) -> Result<TensorHandle, ExecutionError> {
        runtime.release_trace(self.id)?;
        log::debug!("Released {}", self.id);

        Ok(self.output)
    }

    fn check_shape(
        &self,
        operand: &'static str,
        expected: [usize; 2],
        actual: [usize; 2],
    ) -> Result<(), ExecutionError> {
        match expected == actual {
            true => Ok(()),
            false => Err(ExecutionError::TraceShapeMismatch {
                operand,
                expected,
                actual,
            }),
        }
    }
}
