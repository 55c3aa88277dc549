use tilemesh_common::{
    ComputeGrid, ComputeKernelConfig, DataType, MemoryPlacement, ProgramConfig, TileShape,
};

use crate::{RuntimeError, TensorHandle, TraceId};

/// How a tensor is stored on the device.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorDescriptor {
    /// Rows and columns.
    pub shape: [usize; 2],
    /// Element format.
    pub dtype: DataType,
    /// Where the pages live.
    pub placement: MemoryPlacement,
    /// Tile the pages are laid out in.
    pub tile: TileShape,
}

/// Everything besides the operands that a matmul needs.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatmulDescriptor {
    /// Decomposition over the cores.
    pub program: ProgramConfig,
    /// Placement of the output.
    pub out_placement: MemoryPlacement,
    /// Element format of the output.
    pub dtype: DataType,
    /// Compute engine settings.
    pub kernel: ComputeKernelConfig,
    /// Tile the operands are laid out in.
    pub tile: TileShape,
    /// Tile the output is laid out in.
    pub output_tile: TileShape,
}

/// A device executing matmuls.
///
/// Every method except [synchronize](TensorRuntime::synchronize) and
/// [read](TensorRuntime::read) returns as soon as the work is queued.
pub trait TensorRuntime {
    /// Full physical grid of the device.
    fn compute_grid(&self) -> ComputeGrid;

    /// Copy host values to a new device tensor, rounding them to the descriptor's format.
    fn upload(
        &mut self,
        data: &[f32],
        descriptor: TensorDescriptor,
    ) -> Result<TensorHandle, RuntimeError>;

    /// Queue `lhs @ rhs` into a newly allocated output.
    ///
    /// During a capture the matmul is recorded instead of queued.
    fn matmul(
        &mut self,
        lhs: &TensorHandle,
        rhs: &TensorHandle,
        descriptor: &MatmulDescriptor,
    ) -> Result<TensorHandle, RuntimeError>;

    /// Start recording issued matmuls into a new trace.
    fn begin_trace_capture(&mut self) -> Result<TraceId, RuntimeError>;

    /// Stop recording into `trace`.
    fn end_trace_capture(&mut self, trace: TraceId) -> Result<(), RuntimeError>;

    /// Queue every command recorded in `trace`, without host re-issue.
    fn execute_trace(&mut self, trace: TraceId) -> Result<(), RuntimeError>;

    /// Forget `trace`. It can't be executed afterward.
    fn release_trace(&mut self, trace: TraceId) -> Result<(), RuntimeError>;

    /// Block until every queued command has completed.
    fn synchronize(&mut self) -> Result<(), RuntimeError>;

    /// Free a tensor once the commands queued before this call have completed.
    fn deallocate(&mut self, tensor: TensorHandle) -> Result<(), RuntimeError>;

    /// Copy a tensor back to the host, waiting for pending work first.
    fn read(&mut self, tensor: &TensorHandle) -> Result<Vec<f32>, RuntimeError>;

    /// Rows and columns of a tensor.
    fn shape(&self, tensor: &TensorHandle) -> Result<[usize; 2], RuntimeError>;
}
