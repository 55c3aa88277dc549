use tilemesh_common::{
    ComputeGrid, ComputeKernelConfig, DataType, MathFidelity, MemoryPlacement, ProgramConfig,
    ProgramError, ReuseConfig, SubblockShape, TileShape,
};
use tilemesh_runtime::{
    MatmulDescriptor, RuntimeError, TensorDescriptor, TensorHandle, TensorRuntime,
    config::DeviceConfig, host::HostRuntime,
};

fn runtime() -> HostRuntime {
    HostRuntime::new(ComputeGrid::new(8, 8))
}

fn upload(runtime: &mut HostRuntime, data: &[f32], shape: [usize; 2]) -> TensorHandle {
    let descriptor = TensorDescriptor::new(
        shape,
        DataType::Bfloat16,
        MemoryPlacement::DRAM,
        TileShape::default(),
    );
    runtime.upload(data, descriptor).unwrap()
}

fn descriptor(program: ProgramConfig) -> MatmulDescriptor {
    MatmulDescriptor::new(
        program,
        MemoryPlacement::DRAM,
        DataType::Bfloat16,
        ComputeKernelConfig::with_fidelity(MathFidelity::HiFi2),
        TileShape::default(),
        TileShape::default(),
    )
}

fn identity(size: usize) -> Vec<f32> {
    (0..size * size)
        .map(|i| if i / size == i % size { 1.0 } else { 0.0 })
        .collect()
}

#[test_log::test]
fn uploaded_data_is_read_back() {
    let mut runtime = runtime();
    let tensor = upload(&mut runtime, &[1.0, 2.0, 3.0, 4.0], [2, 2]);

    assert_eq!(runtime.read(&tensor).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(runtime.shape(&tensor).unwrap(), [2, 2]);
}

#[test_log::test]
fn upload_checks_the_data_length() {
    let mut runtime = runtime();
    let descriptor = TensorDescriptor::new(
        [2, 2],
        DataType::Bfloat16,
        MemoryPlacement::DRAM,
        TileShape::default(),
    );

    let result = runtime.upload(&[1.0], descriptor);

    assert!(matches!(
        result,
        Err(RuntimeError::DataLength {
            expected: 4,
            actual: 1
        })
    ));
}

#[test_log::test]
fn matmul_is_deferred_until_synchronize() {
    let mut runtime = runtime();
    let lhs = upload(&mut runtime, &[1.0, 2.0, 3.0, 4.0], [2, 2]);
    let rhs = upload(&mut runtime, &identity(2), [2, 2]);

    let out = runtime
        .matmul(&lhs, &rhs, &descriptor(ProgramConfig::NonOptimized))
        .unwrap();

    assert_eq!(runtime.num_pending(), 1);
    assert_eq!(runtime.stats().matmuls_executed, 0);

    runtime.synchronize().unwrap();

    assert_eq!(runtime.num_pending(), 0);
    assert_eq!(runtime.stats().matmuls_executed, 1);
    assert_eq!(runtime.read(&out).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test_log::test]
fn incompatible_operands_are_rejected() {
    let mut runtime = runtime();
    let lhs = upload(&mut runtime, &[0.0; 6], [2, 3]);
    let rhs = upload(&mut runtime, &[0.0; 4], [2, 2]);

    let result = runtime.matmul(&lhs, &rhs, &descriptor(ProgramConfig::NonOptimized));

    assert!(matches!(result, Err(RuntimeError::ShapeMismatch { .. })));
}

#[test_log::test]
fn invalid_programs_are_rejected_at_issue() {
    let mut runtime = runtime();
    let lhs = upload(&mut runtime, &[0.0; 64 * 64], [64, 64]);
    let rhs = upload(&mut runtime, &[0.0; 64 * 64], [64, 64]);
    let program = ProgramConfig::Reuse(ReuseConfig::new(
        ComputeGrid::new(2, 2),
        1,
        SubblockShape::new(1, 1),
        3,
        1,
    ));

    let result = runtime.matmul(&lhs, &rhs, &descriptor(program));

    assert!(matches!(
        result,
        Err(RuntimeError::InvalidProgram(ProgramError::NotDivisible { .. }))
    ));
    assert_eq!(runtime.num_pending(), 0);
}

#[test_log::test]
fn captured_matmul_runs_on_every_replay() {
    let mut runtime = runtime();
    let lhs = upload(&mut runtime, &[2.0; 4], [2, 2]);
    let rhs = upload(&mut runtime, &identity(2), [2, 2]);

    let trace = runtime.begin_trace_capture().unwrap();
    let out = runtime
        .matmul(&lhs, &rhs, &descriptor(ProgramConfig::NonOptimized))
        .unwrap();
    runtime.end_trace_capture(trace).unwrap();

    assert_eq!(runtime.num_pending(), 0);

    for _ in 0..3 {
        runtime.execute_trace(trace).unwrap();
    }
    runtime.synchronize().unwrap();

    let stats = runtime.stats();
    assert_eq!(stats.matmuls_issued, 1);
    assert_eq!(stats.matmuls_executed, 3);
    assert_eq!(stats.traces_executed, 3);
    assert_eq!(runtime.read(&out).unwrap(), vec![2.0; 4]);
}

#[test_log::test]
fn released_trace_is_never_executed() {
    let mut runtime = runtime();
    let lhs = upload(&mut runtime, &[1.0; 4], [2, 2]);
    let rhs = upload(&mut runtime, &[1.0; 4], [2, 2]);

    let trace = runtime.begin_trace_capture().unwrap();
    let _out = runtime
        .matmul(&lhs, &rhs, &descriptor(ProgramConfig::NonOptimized))
        .unwrap();
    runtime.end_trace_capture(trace).unwrap();
    runtime.release_trace(trace).unwrap();

    assert!(matches!(
        runtime.execute_trace(trace),
        Err(RuntimeError::UnknownTrace(id)) if id == trace
    ));
    assert!(matches!(
        runtime.release_trace(trace),
        Err(RuntimeError::UnknownTrace(_))
    ));
    runtime.synchronize().unwrap();
    assert_eq!(runtime.stats().matmuls_executed, 0);
}

#[test_log::test]
fn capture_blocks_host_side_operations() {
    let mut runtime = runtime();
    let lhs = upload(&mut runtime, &[1.0; 4], [2, 2]);

    let trace = runtime.begin_trace_capture().unwrap();

    assert!(matches!(
        runtime.synchronize(),
        Err(RuntimeError::CaptureInProgress { .. })
    ));
    assert!(matches!(
        runtime.begin_trace_capture(),
        Err(RuntimeError::CaptureInProgress { .. })
    ));
    assert!(matches!(
        runtime.end_trace_capture(tilemesh_runtime::TraceId::new()),
        Err(RuntimeError::NoCaptureInProgress(_))
    ));

    runtime.end_trace_capture(trace).unwrap();
    runtime.deallocate(lhs).unwrap();
}

#[test_log::test]
fn traced_tensors_cannot_be_deallocated() {
    let mut runtime = runtime();
    let lhs = upload(&mut runtime, &[1.0; 4], [2, 2]);
    let rhs = upload(&mut runtime, &[1.0; 4], [2, 2]);

    let trace = runtime.begin_trace_capture().unwrap();
    let out = runtime
        .matmul(&lhs, &rhs, &descriptor(ProgramConfig::NonOptimized))
        .unwrap();
    runtime.end_trace_capture(trace).unwrap();

    assert!(matches!(
        runtime.deallocate(out),
        Err(RuntimeError::TensorInUse { .. })
    ));

    runtime.release_trace(trace).unwrap();
    runtime.deallocate(lhs).unwrap();
    runtime.deallocate(rhs).unwrap();
}

#[test_log::test]
fn deallocation_waits_for_queued_work() {
    let mut runtime = runtime();
    let lhs = upload(&mut runtime, &[1.0; 4], [2, 2]);
    let rhs = upload(&mut runtime, &[1.0; 4], [2, 2]);
    let lhs_id = lhs.id();

    let out = runtime
        .matmul(&lhs, &rhs, &descriptor(ProgramConfig::NonOptimized))
        .unwrap();
    runtime.deallocate(lhs).unwrap();

    assert!(matches!(
        runtime.matmul(
            &TensorHandle::new(lhs_id),
            &rhs,
            &descriptor(ProgramConfig::NonOptimized)
        ),
        Err(RuntimeError::UnknownTensor(_))
    ));

    assert_eq!(runtime.read(&out).unwrap(), vec![2.0; 4]);
    assert_eq!(runtime.stats().resident_tensors, 2);
}

#[test_log::test]
fn capture_is_bounded_by_the_trace_region() {
    let matmul = descriptor(ProgramConfig::NonOptimized);
    let recorded = runtime().recorded_bytes(&matmul);
    let mut runtime = HostRuntime::from_config(&DeviceConfig {
        grid: ComputeGrid::new(8, 8),
        trace_region_size: recorded,
        ..Default::default()
    });
    let lhs = upload(&mut runtime, &[1.0; 4], [2, 2]);
    let rhs = upload(&mut runtime, &identity(2), [2, 2]);

    let trace = runtime.begin_trace_capture().unwrap();
    let out = runtime.matmul(&lhs, &rhs, &matmul).unwrap();

    assert!(matches!(
        runtime.matmul(&lhs, &rhs, &matmul),
        Err(RuntimeError::TraceRegionExceeded { trace: id, required, available })
            if id == trace && required == 2 * recorded && available == recorded
    ));
    assert_eq!(runtime.stats().resident_tensors, 3);

    runtime.end_trace_capture(trace).unwrap();
    runtime.execute_trace(trace).unwrap();
    runtime.synchronize().unwrap();
    assert_eq!(runtime.stats().matmuls_executed, 1);

    runtime.release_trace(trace).unwrap();
    assert_eq!(runtime.read(&out).unwrap(), vec![1.0; 4]);
}

#[test_log::test]
fn default_trace_region_fits_a_full_grid_matmul() {
    let runtime = runtime();
    let recorded = runtime.recorded_bytes(&descriptor(ProgramConfig::NonOptimized));

    assert_eq!(recorded, 1024 + 64 * 256);
    assert!(recorded <= DeviceConfig::default().trace_region_size);
}
