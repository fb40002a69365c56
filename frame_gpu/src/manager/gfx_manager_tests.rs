use super::*;
use std::sync::atomic::AtomicUsize;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;
use crate::graphics_device::headless::{DescriptorContent, FenceMode, HeadlessDevice};
use crate::graphics_device::{MemoryLocation, TextureFormat};
use crate::resource::{CopyMode, GpuResourceKind};

fn small_config() -> GfxConfig {
    GfxConfig {
        buffer_heap_size: 16,
        sampler_heap_size: 4,
        staging_buffer_heap_size: 8,
        staging_sampler_heap_size: 4,
        render_target_heap_size: 2,
        depth_stencil_heap_size: 2,
        ..GfxConfig::default()
    }
}

fn setup() -> (Arc<HeadlessDevice>, GfxManager) {
    let headless = Arc::new(HeadlessDevice::new());
    let manager = GfxManager::new(headless.clone(), small_config()).unwrap();
    (headless, manager)
}

fn resource_desc(kind: GpuResourceKind, size: u64, name: &str) -> GpuResourceDesc {
    GpuResourceDesc {
        kind,
        size,
        require_join_before_updating: false,
        name: name.to_string(),
    }
}

/// Bindable backed by one staging buffer descriptor
struct TestBindable {
    staging: DescriptorHandle,
    prepared_frame: Option<u32>,
    bindless_index: Option<u32>,
    fail: bool,
}

impl TestBindable {
    fn new(staging: DescriptorHandle) -> Self {
        Self {
            staging,
            prepared_frame: None,
            bindless_index: None,
            fail: false,
        }
    }
}

impl Bindable for TestBindable {
    fn prepare(&mut self, frame_index: u32) -> Result<DescriptorHandle> {
        if self.fail {
            return Err(Error::InvalidResource("material has no textures".to_string()));
        }
        self.prepared_frame = Some(frame_index);
        Ok(self.staging)
    }

    fn set_bindless_index(&mut self, index: u32) {
        self.bindless_index = Some(index);
    }
}

// ============================================================================
// Creation
// ============================================================================

#[test]
fn test_invalid_config_rejected() {
    let device: Arc<dyn GraphicsDevice> = Arc::new(HeadlessDevice::new());
    let config = GfxConfig {
        frames_in_flight: 0,
        ..GfxConfig::default()
    };
    assert!(matches!(
        GfxManager::new(device, config),
        Err(Error::InitializationFailed(_))
    ));
}

#[test]
fn test_fence_creation_failure_fails_new() {
    let headless = Arc::new(HeadlessDevice::new());
    headless.fail_next_fence();

    assert!(matches!(
        GfxManager::new(headless.clone(), small_config()),
        Err(Error::BackendError(_))
    ));
}

#[test]
fn test_heaps_sized_from_config() {
    let (_, manager) = setup();

    let buffers = manager.current_gpu_heap(DescriptorHeapKind::Buffer).unwrap();
    assert_eq!(buffers.capacity(), 16);
    assert_eq!(manager.current_gpu_heap(DescriptorHeapKind::Sampler).unwrap().capacity(), 4);
    assert!(manager.current_gpu_heap(DescriptorHeapKind::RenderTarget).is_none());

    assert_eq!(manager.staging_heap(DescriptorHeapKind::Buffer).capacity(), 8);
    assert_eq!(manager.staging_heap(DescriptorHeapKind::DepthStencil).capacity(), 2);
}

#[test]
fn test_drop_joins_device() {
    let (headless, manager) = setup();
    drop(manager);
    assert_eq!(headless.wait_idle_count(), 1);
}

// ============================================================================
// Frame loop
// ============================================================================

#[test]
fn test_frame_loop_cycles_slots() {
    let (_, mut manager) = setup();

    assert_eq!(manager.begin_frame().unwrap(), 0);
    manager.end_frame().unwrap();
    assert_eq!(manager.begin_frame().unwrap(), 1);
    manager.end_frame().unwrap();
    assert_eq!(manager.begin_frame().unwrap(), 0);
}

#[test]
fn test_begin_frame_resets_slot_heaps() {
    let (_, mut manager) = setup();

    manager.begin_frame().unwrap();
    let first = manager.get_heap_handle_block(DescriptorHeapKind::Buffer, 3).unwrap();
    manager.get_heap_handle_block(DescriptorHeapKind::Sampler, 2).unwrap();
    manager.end_frame().unwrap();

    manager.begin_frame().unwrap();
    let other_slot = manager.get_heap_handle_block(DescriptorHeapKind::Buffer, 5).unwrap();
    assert_ne!(other_slot.cpu_address, first.cpu_address, "each slot has its own heap");
    manager.end_frame().unwrap();

    manager.begin_frame().unwrap();
    assert_eq!(manager.current_gpu_heap(DescriptorHeapKind::Buffer).unwrap().cursor(), 0);
    assert_eq!(manager.current_gpu_heap(DescriptorHeapKind::Sampler).unwrap().cursor(), 0);
    let again = manager.get_heap_handle_block(DescriptorHeapKind::Buffer, 3).unwrap();
    assert_eq!(again, first);
}

#[test]
fn test_blocks_are_contiguous_within_frame() {
    let (_, mut manager) = setup();
    manager.begin_frame().unwrap();

    let a = manager.get_heap_handle_block(DescriptorHeapKind::Buffer, 4).unwrap();
    let b = manager.get_heap_handle_block(DescriptorHeapKind::Buffer, 2).unwrap();

    assert_eq!(a.heap_index, 0);
    assert_eq!(b.heap_index, 4);
    assert!(b.is_shader_visible());
}

#[test]
fn test_block_of_non_shader_visible_kind_rejected() {
    let (_, manager) = setup();
    let result = manager.get_heap_handle_block(DescriptorHeapKind::RenderTarget, 1);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(!manager.is_halted());
}

#[test]
#[should_panic(expected = "exhausted")]
fn test_frame_heap_overflow_panics() {
    let (_, mut manager) = setup();
    manager.begin_frame().unwrap();
    manager.get_heap_handle_block(DescriptorHeapKind::Buffer, 17).unwrap();
}

#[test]
fn test_begin_frame_waits_for_slot_fence() {
    let headless = Arc::new(HeadlessDevice::new());
    headless.set_fence_mode(FenceMode::Manual);
    let mut manager = GfxManager::new(headless.clone(), small_config()).unwrap();

    manager.begin_frame().unwrap();
    manager.end_frame().unwrap();
    manager.begin_frame().unwrap();
    manager.end_frame().unwrap();

    let fence = manager.frame_sync().fence().clone();
    let completed = Arc::new(AtomicBool::new(false));
    let flag = completed.clone();
    let gpu = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::SeqCst);
        HeadlessDevice::headless_fence(fence.as_ref())
            .unwrap()
            .complete_up_to(1);
    });

    assert_eq!(manager.begin_frame().unwrap(), 0);
    assert!(completed.load(Ordering::SeqCst), "slot 0 reused before its fence passed");
    gpu.join().unwrap();
}

// ============================================================================
// Staging descriptors
// ============================================================================

#[test]
fn test_staging_handles_round_trip() {
    let (_, manager) = setup();

    let a = manager.allocate_staging_handle(DescriptorHeapKind::Buffer);
    let b = manager.allocate_staging_handle(DescriptorHeapKind::Buffer);
    let rt = manager.allocate_staging_handle(DescriptorHeapKind::RenderTarget);
    assert_ne!(a, b);
    assert!(!a.is_shader_visible());
    assert_eq!(manager.staging_heap(DescriptorHeapKind::Buffer).active_count(), 2);

    manager.free_staging_handle(DescriptorHeapKind::Buffer, a);
    manager.free_staging_handle(DescriptorHeapKind::Buffer, b);
    manager.free_staging_handle(DescriptorHeapKind::RenderTarget, rt);
    assert_eq!(manager.staging_heap(DescriptorHeapKind::Buffer).active_count(), 0);
}

#[test]
fn test_write_buffer_descriptor_tracks_current_allocation() {
    let (headless, manager) = setup();
    let mut res = manager
        .create_gpu_resource(&resource_desc(GpuResourceKind::GpuOnly, 16, "instances"))
        .unwrap();
    let handle = manager.allocate_staging_handle(DescriptorHeapKind::Buffer);

    manager.write_buffer_descriptor(handle, &res).unwrap();
    assert!(matches!(
        headless.descriptor_at(handle.cpu_address),
        Some(DescriptorContent::Buffer { size: 16, .. })
    ));

    res.buffer_data(&[1; 64], 0).unwrap();
    res.copy(CopyMode::Immediately, manager.upload_context()).unwrap();
    manager.write_buffer_descriptor(handle, &res).unwrap();

    assert_eq!(
        headless.descriptor_at(handle.cpu_address),
        Some(DescriptorContent::Buffer {
            buffer_id: res.device_buffer().id(),
            size: 64,
            gpu_address: res.gpu_address(),
        })
    );
    manager.free_staging_handle(DescriptorHeapKind::Buffer, handle);
}

// ============================================================================
// Bindless binding
// ============================================================================

#[test]
fn test_bind_bindables_assigns_consecutive_indices() {
    let (headless, mut manager) = setup();
    manager.begin_frame().unwrap();
    manager.end_frame().unwrap();
    manager.begin_frame().unwrap();

    // Offset the block so indices do not start at zero
    manager.get_heap_handle_block(DescriptorHeapKind::Buffer, 2).unwrap();

    let resources: Vec<GpuResource> = (0..3)
        .map(|i| {
            manager
                .create_gpu_resource(&resource_desc(GpuResourceKind::CpuVisibleIfPossible, 16 * (i + 1), "material"))
                .unwrap()
        })
        .collect();
    let mut bindables: Vec<TestBindable> = resources
        .iter()
        .map(|res| {
            let handle = manager.allocate_staging_handle(DescriptorHeapKind::Buffer);
            manager.write_buffer_descriptor(handle, res).unwrap();
            TestBindable::new(handle)
        })
        .collect();

    let block = manager.bind_bindables(&mut bindables).unwrap();

    assert_eq!(block.heap_index, 2);
    let stride = manager
        .current_gpu_heap(DescriptorHeapKind::Buffer)
        .unwrap()
        .descriptor_size();
    for (i, bindable) in bindables.iter().enumerate() {
        assert_eq!(bindable.bindless_index, Some(2 + i as u32));
        assert_eq!(bindable.prepared_frame, Some(1));
        assert_eq!(
            headless.descriptor_at(block.offset(i as u32, stride).cpu_address),
            headless.descriptor_at(bindable.staging.cpu_address)
        );
    }
    assert_eq!(manager.current_gpu_heap(DescriptorHeapKind::Buffer).unwrap().cursor(), 5);

    for bindable in bindables {
        manager.free_staging_handle(DescriptorHeapKind::Buffer, bindable.staging);
    }
}

#[test]
fn test_bind_nothing_allocates_nothing() {
    let (_, manager) = setup();
    let mut bindables: Vec<TestBindable> = Vec::new();

    let block = manager.bind_bindables(&mut bindables).unwrap();

    assert!(!block.is_valid());
    assert_eq!(manager.current_gpu_heap(DescriptorHeapKind::Buffer).unwrap().cursor(), 0);
}

#[test]
fn test_bind_prepare_failure_propagates() {
    let (_, manager) = setup();
    let handle = manager.allocate_staging_handle(DescriptorHeapKind::Buffer);
    let ok = TestBindable::new(handle);
    let mut failing = TestBindable::new(handle);
    failing.fail = true;
    let mut bindables = vec![ok, failing];

    let result = manager.bind_bindables(&mut bindables);

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(bindables.iter().all(|b| b.bindless_index.is_none()));
    assert_eq!(manager.current_gpu_heap(DescriptorHeapKind::Buffer).unwrap().cursor(), 0);
    assert!(!manager.is_halted());
    manager.free_staging_handle(DescriptorHeapKind::Buffer, handle);
}

// ============================================================================
// Critical errors
// ============================================================================

#[test]
fn test_submission_failure_halts_rendering() {
    let (headless, mut manager) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let calls = calls.clone();
        let seen = seen.clone();
        manager.set_critical_error_handler(Box::new(move |e| {
            calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(e.to_string());
        }));
    }

    let res = manager
        .create_gpu_resource(&resource_desc(GpuResourceKind::GpuOnly, 8, "doomed"))
        .unwrap();
    manager.upload_context().copy_buffers_queue_up(res.staging().unwrap(), &res, None);
    headless.fail_next_submit();

    assert!(matches!(manager.flush(), Err(Error::BackendError(_))));
    assert!(manager.is_halted());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(seen.lock().unwrap()[0].contains("injected submission failure"));

    assert!(matches!(manager.begin_frame(), Err(Error::RenderingHalted)));
    assert!(matches!(manager.flush(), Err(Error::RenderingHalted)));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "RenderingHalted is not critical");
}

#[test]
fn test_command_list_failure_halts_rendering() {
    let (headless, manager) = setup();
    let res = manager
        .create_gpu_resource(&resource_desc(GpuResourceKind::GpuOnly, 8, "unrecorded"))
        .unwrap();
    manager.upload_context().copy_buffers_queue_up(res.staging().unwrap(), &res, None);
    headless.fail_next_command_list();

    assert!(matches!(manager.flush(), Err(Error::BackendError(_))));
    assert!(manager.is_halted());
    assert_eq!(headless.submission_count(), 0);
}

#[test]
fn test_out_of_memory_halts_rendering() {
    let (headless, manager) = setup();
    headless.set_failing_location(Some(MemoryLocation::DeviceLocal));

    let result = manager.create_gpu_resource(&resource_desc(GpuResourceKind::GpuOnly, 8, "huge"));

    assert!(matches!(result, Err(Error::OutOfMemory)));
    assert!(manager.is_halted());
}

#[test]
fn test_validation_error_does_not_halt() {
    let (_, manager) = setup();

    let result = manager.create_texture(&TextureDesc {
        width: 0,
        height: 4,
        mip_levels: 1,
        format: TextureFormat::Rgba8Unorm,
        name: "empty".to_string(),
    });

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(!manager.is_halted());
}

#[test]
fn test_device_lost_during_frame_wait_halts() {
    let headless = Arc::new(HeadlessDevice::new());
    headless.set_fence_mode(FenceMode::Manual);
    let mut manager = GfxManager::new(headless.clone(), small_config()).unwrap();

    manager.begin_frame().unwrap();
    manager.end_frame().unwrap();
    manager.begin_frame().unwrap();
    manager.end_frame().unwrap();
    HeadlessDevice::headless_fence(manager.frame_sync().fence().as_ref())
        .unwrap()
        .lose_device();

    assert!(matches!(manager.begin_frame(), Err(Error::DeviceLost(_))));
    assert!(manager.is_halted());
}

// ============================================================================
// Resources
// ============================================================================

#[test]
fn test_delete_resources_releases_buffers() {
    let (headless, manager) = setup();
    let live = headless.live_buffer_count();

    let gpu = manager
        .create_gpu_resource(&resource_desc(GpuResourceKind::GpuOnly, 8, "temp"))
        .unwrap();
    let cpu = manager.create_cpu_resource(CpuResourceHint::ConstantBuffer, 8, "constants").unwrap();
    assert_eq!(headless.live_buffer_count(), live + 3);

    manager.delete_gpu_resource(gpu);
    manager.delete_cpu_resource(cpu);
    assert_eq!(headless.live_buffer_count(), live);
}

#[test]
fn test_flush_through_manager() {
    let (headless, manager) = setup();
    let mut res = manager
        .create_gpu_resource(&resource_desc(GpuResourceKind::GpuOnly, 4, "queued"))
        .unwrap();
    res.buffer_data(&[8; 4], 0).unwrap();
    res.copy(CopyMode::QueueUp, manager.upload_context()).unwrap();

    manager.flush().unwrap();

    assert_eq!(HeadlessDevice::buffer_contents(res.device_buffer().as_ref()).unwrap(), vec![8; 4]);
    assert_eq!(headless.submission_count(), 1);
}
