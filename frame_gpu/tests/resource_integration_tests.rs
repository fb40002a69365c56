//! End-to-end resource and upload tests on the headless device
//!
//! No GPU required.
//!
//! Run with: cargo test --test resource_integration_tests

use frame_gpu::framegpu::device::{
    DescriptorHeapKind, ExecutedCopy, GraphicsDevice, HeadlessDevice, TextureDesc, TextureFormat,
};
use frame_gpu::framegpu::resource::{
    CopyMode, CpuResourceHint, GpuResourceDesc, GpuResourceKind, PixelBuffer, ResourceStrategy,
};
use frame_gpu::framegpu::upload::UploadFlush;
use frame_gpu::framegpu::{GfxConfig, GfxManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn staged_manager() -> (Arc<HeadlessDevice>, GfxManager) {
    let headless = Arc::new(HeadlessDevice::new());
    headless.set_vram_probe(None);
    let manager = GfxManager::new(headless.clone(), GfxConfig::default()).unwrap();
    (headless, manager)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

#[test]
fn test_staged_resource_grows_from_256_to_512() {
    let (headless, manager) = staged_manager();
    let mut resource = manager
        .create_gpu_resource(&GpuResourceDesc {
            kind: GpuResourceKind::CpuVisibleIfPossible,
            size: 256,
            require_join_before_updating: false,
            name: "particles".to_string(),
        })
        .unwrap();
    assert_eq!(resource.strategy(), ResourceStrategy::Staged);

    let data = pattern(512);
    resource.buffer_data(&data, 0).unwrap();
    resource.copy(CopyMode::Immediately, manager.upload_context()).unwrap();

    assert_eq!(resource.size(), 512);
    assert_eq!(resource.staging().unwrap().mapped_bytes().unwrap(), data);
    assert_eq!(HeadlessDevice::buffer_contents(resource.device_buffer().as_ref()).unwrap(), data);
    assert_eq!(headless.submission_count(), 1);
}

#[test]
fn test_padded_append_preserves_prefix_through_upload() {
    let (_, manager) = staged_manager();
    let mut resource = manager
        .create_gpu_resource(&GpuResourceDesc {
            kind: GpuResourceKind::GpuOnly,
            size: 4,
            require_join_before_updating: true,
            name: "indices".to_string(),
        })
        .unwrap();

    resource.buffer_pod(&[1u16, 2], 0).unwrap();
    resource.buffer_pod(&[3u16, 4, 5], 4).unwrap();
    resource.copy(CopyMode::QueueUp, manager.upload_context()).unwrap();
    manager.flush().unwrap();

    let bytes = HeadlessDevice::buffer_contents(resource.device_buffer().as_ref()).unwrap();
    let values: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
        .collect();
    assert_eq!(values, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_mapped_and_staged_share_one_interface() {
    let headless = Arc::new(HeadlessDevice::new());
    let manager = GfxManager::new(headless.clone(), GfxConfig::default()).unwrap();
    let data = pattern(128);

    for kind in [GpuResourceKind::CpuVisibleIfPossible, GpuResourceKind::GpuOnly] {
        let mut resource = manager
            .create_gpu_resource(&GpuResourceDesc {
                kind,
                size: 128,
                require_join_before_updating: false,
                name: format!("{:?}", kind),
            })
            .unwrap();
        resource.buffer_data(&data, 0).unwrap();
        resource.copy(CopyMode::QueueUp, manager.upload_context()).unwrap();
        manager.flush().unwrap();

        assert_eq!(
            HeadlessDevice::buffer_contents(resource.device_buffer().as_ref()).unwrap(),
            data,
            "{:?}",
            kind
        );
    }
    assert_eq!(headless.submission_count(), 1, "only the staged resource submits");
}

#[test]
fn test_frame_with_buffers_and_textures() {
    let (headless, mut manager) = staged_manager();
    let texture = manager
        .create_texture(&TextureDesc {
            width: 8,
            height: 8,
            mip_levels: 2,
            format: TextureFormat::Rgba8Unorm,
            name: "terrain".to_string(),
        })
        .unwrap();
    let mut instances = manager
        .create_gpu_resource(&GpuResourceDesc {
            kind: GpuResourceKind::GpuOnly,
            size: 64,
            require_join_before_updating: false,
            name: "instances".to_string(),
        })
        .unwrap();
    let uploaded = Arc::new(AtomicUsize::new(0));

    for frame in 0..4u8 {
        manager.begin_frame().unwrap();

        instances.buffer_data(&[frame; 64], 0).unwrap();
        let counter = uploaded.clone();
        instances
            .copy_queue_up_with(manager.upload_context(), Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        if frame == 0 {
            let pixels = PixelBuffer::new(8, 8, 4, vec![0x55; 256]).with_mip(4, 4, vec![0xAA; 64]);
            manager
                .upload_context()
                .copy_texture_queue_up(&texture, &pixels, true, None)
                .unwrap();
        }

        manager.flush_masked(UploadFlush::BUFFERS).unwrap();
        manager.flush().unwrap();
        manager.end_frame().unwrap();
    }

    assert_eq!(uploaded.load(Ordering::SeqCst), 4);
    assert_eq!(
        HeadlessDevice::buffer_contents(instances.device_buffer().as_ref()).unwrap(),
        vec![3; 64]
    );
    assert_eq!(HeadlessDevice::texture_level(texture.as_ref(), 1).unwrap(), vec![0xAA; 64]);

    let textures = headless
        .executed_copies()
        .iter()
        .filter(|c| matches!(c, ExecutedCopy::Texture { .. }))
        .count();
    assert_eq!(textures, 1);

    let stats = manager.upload_context().stats();
    assert_eq!(stats.buffer_copies, 4);
    assert_eq!(stats.texture_copies, 1);
    assert_eq!(stats.joins, 1);
}

#[test]
fn test_constant_buffers_through_manager() {
    let (_, manager) = staged_manager();
    let mut constants = manager
        .create_cpu_resource(CpuResourceHint::ConstantBuffer, 80, "camera")
        .unwrap();

    let matrix = [1.0f32; 16];
    constants.buffer_pod(&matrix, 0).unwrap();

    assert_eq!(constants.size(), 256);
    assert_eq!(constants.read(0, 64).unwrap(), bytemuck::cast_slice::<f32, u8>(&matrix));
    manager.delete_cpu_resource(constants);
}

#[test]
fn test_staging_heap_shared_across_threads() {
    let (_, manager) = staged_manager();
    let manager = Arc::new(manager);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            std::thread::spawn(move || {
                let mut taken = Vec::new();
                for _ in 0..20 {
                    taken.push(manager.allocate_staging_handle(DescriptorHeapKind::Buffer));
                }
                taken
            })
        })
        .collect();

    let mut all: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let heap = manager.staging_heap(DescriptorHeapKind::Buffer);
    assert_eq!(heap.active_count(), 80);

    all.sort_by_key(|h| h.cpu_address);
    all.dedup();
    assert_eq!(all.len(), 80, "no handle handed out twice");

    for handle in all {
        manager.free_staging_handle(DescriptorHeapKind::Buffer, handle);
    }
    assert_eq!(heap.active_count(), 0);
}

#[test]
fn test_device_trait_object_is_backend_neutral() {
    let device: Arc<dyn GraphicsDevice> = Arc::new(HeadlessDevice::new());
    let manager = GfxManager::new(device, GfxConfig::default()).unwrap();
    assert_eq!(manager.config().frames_in_flight, 2);
}
