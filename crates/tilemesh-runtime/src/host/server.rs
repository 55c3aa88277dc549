use hashbrown::HashMap;
use tilemesh_common::{ComputeGrid, K_TILE, MatrixShape, ProgramConfig, ProgramError, TileCounts};

use super::{kernel, storage::TensorStorage};
use crate::{
    MatmulDescriptor, RuntimeError, TensorDescriptor, TensorHandle, TensorId, TensorRuntime,
    TraceId, config::DeviceConfig,
};

/// A command waiting in the queue of a [HostRuntime].
#[derive(Debug, Clone)]
enum Command {
    Matmul {
        lhs: TensorId,
        rhs: TensorId,
        out: TensorId,
        descriptor: MatmulDescriptor,
    },
    Free(TensorId),
}

/// Bytes of the trace region taken by the dispatch header of a recorded matmul.
const DISPATCH_HEADER_BYTES: u64 = 1024;
/// Bytes of runtime arguments recorded for each core a matmul runs on.
const CORE_ARGS_BYTES: u64 = 256;

#[derive(Debug)]
struct Capture {
    trace: TraceId,
    commands: Vec<Command>,
    bytes: u64,
}

/// Counters of the work done by a [HostRuntime].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HostStats {
    /// Matmuls issued by the host, recorded ones included.
    pub matmuls_issued: u64,
    /// Matmuls actually computed.
    pub matmuls_executed: u64,
    /// Traces executed.
    pub traces_executed: u64,
    /// Tensors currently in memory.
    pub resident_tensors: usize,
}

/// Runtime keeping tensors in host memory and computing matmuls on the CPU.
///
/// Commands are queued and only computed on [synchronize](TensorRuntime::synchronize), like a
/// device would run them asynchronously.
#[derive(Debug)]
pub struct HostRuntime {
    grid: ComputeGrid,
    storage: TensorStorage,
    pending: Vec<Command>,
    capture: Option<Capture>,
    traces: HashMap<TraceId, Vec<Command>>,
    trace_region_size: u64,
    stats: HostStats,
}

impl HostRuntime {
    /// A runtime with a full grid of `grid` cores and the default trace region.
    pub fn new(grid: ComputeGrid) -> Self {
        Self::from_config(&DeviceConfig {
            grid,
            ..Default::default()
        })
    }

    /// A runtime matching the device configuration.
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            grid: config.grid,
            storage: TensorStorage::default(),
            pending: Vec::new(),
            capture: None,
            traces: HashMap::new(),
            trace_region_size: config.trace_region_size,
            stats: HostStats::default(),
        }
    }

    /// Bytes of the trace region a matmul with `descriptor` takes once recorded.
    ///
    /// Programs without a grid run on the full device grid.
    pub fn recorded_bytes(&self, descriptor: &MatmulDescriptor) -> u64 {
        let cores = descriptor.program.grid().unwrap_or(self.grid).num_cores();
        cores
            .saturating_mul(CORE_ARGS_BYTES)
            .saturating_add(DISPATCH_HEADER_BYTES)
    }

    /// Work done so far.
    pub fn stats(&self) -> HostStats {
        HostStats {
            resident_tensors: self.storage.len(),
            ..self.stats
        }
    }

    /// Number of commands waiting for [synchronize](TensorRuntime::synchronize).
    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    fn ensure_not_capturing(&self, operation: &'static str) -> Result<(), RuntimeError> {
        match &self.capture {
            Some(capture) => Err(RuntimeError::CaptureInProgress {
                operation,
                trace: capture.trace,
            }),
            None => Ok(()),
        }
    }

    fn validate(
        &self,
        shape: &MatrixShape,
        descriptor: &MatmulDescriptor,
    ) -> Result<(), RuntimeError> {
        if let ProgramConfig::NonOptimized = descriptor.program {
            return Ok(());
        }

        let tile = descriptor.tile;
        for (dim, value, divisor) in [
            ("M", shape.m, tile.h),
            ("K", shape.k, K_TILE),
            ("N", shape.n, tile.w),
        ] {
            if divisor == 0 || value % divisor != 0 {
                return Err(ProgramError::NotDivisible {
                    dim,
                    value,
                    divisor,
                }
                .into());
            }
        }

        let counts = TileCounts::of(shape, &tile);
        descriptor
            .program
            .validate(&counts, self.grid, descriptor.kernel.max_subblock_tiles())?;

        Ok(())
    }

    fn execute(&mut self, command: Command) -> Result<(), RuntimeError> {
        match command {
            Command::Matmul {
                lhs,
                rhs,
                out,
                descriptor,
            } => {
                let lhs = self.storage.resident(lhs)?;
                let rhs = self.storage.resident(rhs)?;
                let shape = MatrixShape::from_operands(lhs.descriptor.shape, rhs.descriptor.shape)
                    .ok_or(RuntimeError::ShapeMismatch {
                        lhs: lhs.descriptor.shape,
                        rhs: rhs.descriptor.shape,
                    })?;

                let result = kernel::matmul(&lhs.data, &rhs.data, shape, &descriptor);
                self.storage.resident_mut(out)?.data = result;
                self.stats.matmuls_executed += 1;
            }
            Command::Free(id) => self.storage.free(id),
        }

        Ok(())
    }
}

impl TensorRuntime for HostRuntime {
    fn compute_grid(&self) -> ComputeGrid {
        self.grid
    }

    fn upload(
        &mut self,
        data: &[f32],
        descriptor: TensorDescriptor,
    ) -> Result<TensorHandle, RuntimeError> {
        self.ensure_not_capturing("upload")?;

        let expected = descriptor.shape[0] * descriptor.shape[1];
        if data.len() != expected {
            return Err(RuntimeError::DataLength {
                expected,
                actual: data.len(),
            });
        }

        let mut data = data.to_vec();
        descriptor.dtype.quantize(&mut data);

        Ok(TensorHandle::new(self.storage.alloc(data, descriptor)))
    }

    fn matmul(
        &mut self,
        lhs: &TensorHandle,
        rhs: &TensorHandle,
        descriptor: &MatmulDescriptor,
    ) -> Result<TensorHandle, RuntimeError> {
        let lhs_shape = self.storage.get(lhs.id())?.descriptor.shape;
        let rhs_shape = self.storage.get(rhs.id())?.descriptor.shape;
        let shape = MatrixShape::from_operands(lhs_shape, rhs_shape).ok_or(
            RuntimeError::ShapeMismatch {
                lhs: lhs_shape,
                rhs: rhs_shape,
            },
        )?;
        self.validate(&shape, descriptor)?;

        let recorded = self.recorded_bytes(descriptor);
        if let Some(capture) = &self.capture {
            let required = capture.bytes.saturating_add(recorded);
            if required > self.trace_region_size {
                return Err(RuntimeError::TraceRegionExceeded {
                    trace: capture.trace,
                    required,
                    available: self.trace_region_size,
                });
            }
        }

        let out_descriptor = TensorDescriptor::new(
            shape.out(),
            descriptor.dtype,
            descriptor.out_placement,
            descriptor.output_tile,
        );
        let out = self
            .storage
            .alloc(vec![0.0; shape.out()[0] * shape.out()[1]], out_descriptor);

        let command = Command::Matmul {
            lhs: lhs.id(),
            rhs: rhs.id(),
            out,
            descriptor: *descriptor,
        };
        self.stats.matmuls_issued += 1;

        match &mut self.capture {
            Some(capture) => {
                capture.commands.push(command);
                capture.bytes += recorded;
            }
            None => self.pending.push(command),
        }

        Ok(TensorHandle::new(out))
    }

    fn begin_trace_capture(&mut self) -> Result<TraceId, RuntimeError> {
        self.ensure_not_capturing("begin a capture")?;

        let trace = TraceId::new();
        log::debug!("Begin capture of {trace}");
        self.capture = Some(Capture {
            trace,
            commands: Vec::new(),
            bytes: 0,
        });

        Ok(trace)
    }

    fn end_trace_capture(&mut self, trace: TraceId) -> Result<(), RuntimeError> {
        match self.capture.take() {
            Some(capture) if capture.trace == trace => {
                log::debug!(
                    "End capture of {trace} with {} commands ({} bytes)",
                    capture.commands.len(),
                    capture.bytes
                );
                self.traces.insert(trace, capture.commands);
                Ok(())
            }
            other => {
                self.capture = other;
                Err(RuntimeError::NoCaptureInProgress(trace))
            }
        }
    }

    fn execute_trace(&mut self, trace: TraceId) -> Result<(), RuntimeError> {
        self.ensure_not_capturing("execute a trace")?;

        let commands = self
            .traces
            .get(&trace)
            .ok_or(RuntimeError::UnknownTrace(trace))?;
        self.pending.extend(commands.iter().cloned());
        self.stats.traces_executed += 1;

        Ok(())
    }

    fn release_trace(&mut self, trace: TraceId) -> Result<(), RuntimeError> {
        self.traces
            .remove(&trace)
            .map(|_| log::debug!("Released {trace}"))
            .ok_or(RuntimeError::UnknownTrace(trace))
    }

    fn synchronize(&mut self) -> Result<(), RuntimeError> {
        self.ensure_not_capturing("synchronize")?;

        let mut pending = core::mem::take(&mut self.pending).into_iter();
        while let Some(command) = pending.next() {
            if let Err(err) = self.execute(command) {
                // Released tensors are freed even when an earlier command fails.
                let mut dropped = 0;
                for command in pending {
                    match command {
                        Command::Free(id) => self.storage.free(id),
                        Command::Matmul { .. } => dropped += 1,
                    }
                }
                log::warn!("Synchronize failed, {dropped} queued matmuls dropped: {err}");
                return Err(err);
            }
        }

        Ok(())
    }

    fn deallocate(&mut self, tensor: TensorHandle) -> Result<(), RuntimeError> {
        let id = tensor.id();
        self.ensure_not_capturing("deallocate")?;

        for (trace, commands) in self.traces.iter() {
            let referenced = commands.iter().any(|command| match command {
                Command::Matmul { lhs, rhs, out, .. } => [lhs, rhs, out].contains(&&id),
                Command::Free(_) => false,
            });
            if referenced {
                return Err(RuntimeError::TensorInUse { tensor: id, trace: *trace });
            }
        }

        self.storage.mark_released(id)?;
        self.pending.push(Command::Free(id));

        Ok(())
    }

    fn read(&mut self, tensor: &TensorHandle) -> Result<Vec<f32>, RuntimeError> {
        self.storage.get(tensor.id())?;
        self.synchronize()?;

        Ok(self.storage.get(tensor.id())?.data.clone())
    }

    fn shape(&self, tensor: &TensorHandle) -> Result<[usize; 2], RuntimeError> {
        Ok(self.storage.get(tensor.id())?.descriptor.shape)
    }
}
