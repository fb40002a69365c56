/// GPU resource and descriptor manager of the frame loop
///
/// Owns per-frame shader-visible heaps (one buffer and one sampler bump heap
/// per frame in flight), the long-lived staging heaps, the upload context
/// and the frame fence.
///
/// Frame protocol:
/// ```text
/// begin_frame()   wait for the slot's previous frame, reset its bump heaps
///   ...           allocate blocks, bind, write and copy resources
/// flush()         submit queued uploads
/// end_frame()     signal the frame fence, advance to the next slot
/// ```
///
/// Critical errors (backend failure, out of memory, device lost) returned by
/// any operation halt frame production: the handler registered with
/// `set_critical_error_handler` is called once per error and `begin_frame`
/// refuses to start new frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use rayon::prelude::*;
use crate::config::GfxConfig;
use crate::error::{Error, Result};
use crate::frame::FrameSync;
use crate::graphics_device::{
    DescriptorHandle, DescriptorHeapKind, DeviceTexture, GraphicsDevice, TextureDesc,
};
use crate::heap::{GpuHeap, StagingHeap};
use crate::manager::Bindable;
use crate::resource::{CpuResource, CpuResourceHint, GpuResource, GpuResourceDesc};
use crate::upload::{UploadContext, UploadFlush};
use crate::{engine_debug, engine_error, engine_info, engine_trace};

/// Callback invoked for every critical error
pub type CriticalErrorHandler = Box<dyn Fn(&Error) + Send + Sync>;

/// Shader-visible heaps of one frame slot
struct FrameHeaps {
    buffers: GpuHeap,
    samplers: GpuHeap,
}

pub struct GfxManager {
    device: Arc<dyn GraphicsDevice>,
    config: GfxConfig,
    frame_heaps: Vec<FrameHeaps>,
    staging_buffers: StagingHeap,
    staging_samplers: StagingHeap,
    render_targets: StagingHeap,
    depth_stencils: StagingHeap,
    upload: UploadContext,
    frame_sync: FrameSync,
    critical_error_handler: Option<CriticalErrorHandler>,
    halted: AtomicBool,
}

impl GfxManager {
    /// Create every heap, the upload context and the frame fence
    ///
    /// # Errors
    ///
    /// `InitializationFailed` for an invalid configuration, or the device
    /// error of the first failed creation.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: GfxConfig) -> Result<Self> {
        config.validate()?;

        let mut frame_heaps = Vec::with_capacity(config.frames_in_flight as usize);
        for frame in 0..config.frames_in_flight {
            frame_heaps.push(FrameHeaps {
                buffers: GpuHeap::new(
                    device.as_ref(),
                    DescriptorHeapKind::Buffer,
                    config.buffer_heap_size,
                    &format!("frame{}_buffers", frame),
                )?,
                samplers: GpuHeap::new(
                    device.as_ref(),
                    DescriptorHeapKind::Sampler,
                    config.sampler_heap_size,
                    &format!("frame{}_samplers", frame),
                )?,
            });
        }

        let staging_buffers = StagingHeap::new(
            device.as_ref(),
            DescriptorHeapKind::Buffer,
            config.staging_buffer_heap_size,
            "staging_buffers",
        )?;
        let staging_samplers = StagingHeap::new(
            device.as_ref(),
            DescriptorHeapKind::Sampler,
            config.staging_sampler_heap_size,
            "staging_samplers",
        )?;
        let render_targets = StagingHeap::new(
            device.as_ref(),
            DescriptorHeapKind::RenderTarget,
            config.render_target_heap_size,
            "render_targets",
        )?;
        let depth_stencils = StagingHeap::new(
            device.as_ref(),
            DescriptorHeapKind::DepthStencil,
            config.depth_stencil_heap_size,
            "depth_stencils",
        )?;

        let upload = UploadContext::new(device.clone(), &config)?;
        let frame_sync = FrameSync::new(device.clone(), config.frames_in_flight)?;

        engine_info!(
            "framegpu::GfxManager",
            "Initialized: {} frames in flight, {} buffer / {} sampler descriptors per frame",
            config.frames_in_flight,
            config.buffer_heap_size,
            config.sampler_heap_size
        );

        Ok(Self {
            device,
            config,
            frame_heaps,
            staging_buffers,
            staging_samplers,
            render_targets,
            depth_stencils,
            upload,
            frame_sync,
            critical_error_handler: None,
            halted: AtomicBool::new(false),
        })
    }

    // ===== ERROR ROUTING =====

    /// Register the callback receiving critical errors
    pub fn set_critical_error_handler(&mut self, handler: CriticalErrorHandler) {
        self.critical_error_handler = Some(handler);
    }

    /// Whether a critical error stopped frame production
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Pass `result` through, halting on critical errors
    fn route<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_critical() {
                if !self.halted.swap(true, Ordering::SeqCst) {
                    engine_error!("framegpu::GfxManager", "Critical error, rendering halted: {}", e);
                }
                if let Some(handler) = &self.critical_error_handler {
                    handler(e);
                }
            }
        }
        result
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_halted() {
            return Err(Error::RenderingHalted);
        }
        Ok(())
    }

    // ===== RESOURCES =====

    /// Create a GPU resource; its strategy is chosen from the device probe
    pub fn create_gpu_resource(&self, desc: &GpuResourceDesc) -> Result<GpuResource> {
        self.route(GpuResource::new(self.device.clone(), desc, &self.config))
    }

    /// Create a host-visible resource
    pub fn create_cpu_resource(&self, hint: CpuResourceHint, size: u64, name: &str) -> Result<CpuResource> {
        self.route(CpuResource::new(self.device.clone(), hint, size, name))
    }

    /// Release a GPU resource
    ///
    /// A queued copy that still targets it keeps the allocation alive until
    /// the copy completes.
    pub fn delete_gpu_resource(&self, resource: GpuResource) {
        engine_trace!("framegpu::GfxManager", "Deleting GPU resource '{}'", resource.name());
        drop(resource);
    }

    /// Release a host-visible resource
    pub fn delete_cpu_resource(&self, resource: CpuResource) {
        engine_trace!("framegpu::GfxManager", "Deleting CPU resource '{}'", resource.name());
        drop(resource);
    }

    pub fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn DeviceTexture>> {
        self.route(self.device.create_texture(desc))
    }

    // ===== DESCRIPTORS =====

    /// Shader-visible heap of the current frame for `kind`
    ///
    /// Only buffer and sampler descriptors are shader visible.
    pub fn current_gpu_heap(&self, kind: DescriptorHeapKind) -> Option<&GpuHeap> {
        let heaps = &self.frame_heaps[self.frame_sync.frame_index() as usize];
        match kind {
            DescriptorHeapKind::Buffer => Some(&heaps.buffers),
            DescriptorHeapKind::Sampler => Some(&heaps.samplers),
            DescriptorHeapKind::RenderTarget | DescriptorHeapKind::DepthStencil => None,
        }
    }

    /// Allocate `count` contiguous slots in the current frame's heap
    ///
    /// The block is valid until this frame slot comes around again.
    ///
    /// # Panics
    ///
    /// When the frame heap is exhausted.
    pub fn get_heap_handle_block(&self, kind: DescriptorHeapKind, count: u32) -> Result<DescriptorHandle> {
        match self.current_gpu_heap(kind) {
            Some(heap) => Ok(heap.allocate(count)),
            None => Err(Error::InvalidResource(format!(
                "{:?} descriptors are not shader visible",
                kind
            ))),
        }
    }

    /// Long-lived CPU-only heap for `kind`
    pub fn staging_heap(&self, kind: DescriptorHeapKind) -> &StagingHeap {
        match kind {
            DescriptorHeapKind::Buffer => &self.staging_buffers,
            DescriptorHeapKind::Sampler => &self.staging_samplers,
            DescriptorHeapKind::RenderTarget => &self.render_targets,
            DescriptorHeapKind::DepthStencil => &self.depth_stencils,
        }
    }

    /// Allocate one staging descriptor; pair with `free_staging_handle`
    pub fn allocate_staging_handle(&self, kind: DescriptorHeapKind) -> DescriptorHandle {
        self.staging_heap(kind).get_new_heap_handle()
    }

    pub fn free_staging_handle(&self, kind: DescriptorHeapKind, handle: DescriptorHandle) {
        self.staging_heap(kind).free_heap_handle(handle);
    }

    /// Write a view of `resource`'s current allocation into `handle`
    ///
    /// Must be rewritten after the resource grows.
    pub fn write_buffer_descriptor(&self, handle: DescriptorHandle, resource: &GpuResource) -> Result<()> {
        self.route(
            self.device
                .write_buffer_descriptor(handle, resource.device_buffer().as_ref()),
        )
    }

    /// Bind `bindables` into a contiguous block of the current buffer heap
    ///
    /// Every bindable is prepared in parallel, then their staging
    /// descriptors are copied into the block with one call and each
    /// bindable receives `block start + its position` as bindless index.
    /// Returns the block (invalid handle when `bindables` is empty).
    pub fn bind_bindables<B: Bindable>(&self, bindables: &mut [B]) -> Result<DescriptorHandle> {
        if bindables.is_empty() {
            return Ok(DescriptorHandle::INVALID);
        }

        let frame_index = self.frame_sync.frame_index();
        let sources = self.route(
            bindables
                .par_iter_mut()
                .map(|bindable| bindable.prepare(frame_index))
                .collect::<Result<Vec<DescriptorHandle>>>(),
        )?;

        let block = self.frame_heaps[frame_index as usize]
            .buffers
            .allocate(sources.len() as u32);
        self.route(
            self.device
                .copy_descriptors(DescriptorHeapKind::Buffer, block, &sources),
        )?;

        for (i, bindable) in bindables.iter_mut().enumerate() {
            bindable.set_bindless_index(block.heap_index + i as u32);
        }

        engine_trace!(
            "framegpu::GfxManager",
            "Bound {} bindables at index {} (frame {})",
            sources.len(),
            block.heap_index,
            frame_index
        );
        Ok(block)
    }

    // ===== UPLOADS =====

    /// Submit every queued upload and wait for it
    pub fn flush(&self) -> Result<()> {
        self.flush_masked(UploadFlush::all())
    }

    /// Submit the queued uploads of the classes in `mask`
    pub fn flush_masked(&self, mask: UploadFlush) -> Result<()> {
        self.ensure_running()?;
        self.route(self.upload.flush_masked(mask))
    }

    pub fn upload_context(&self) -> &UploadContext {
        &self.upload
    }

    // ===== FRAME LOOP =====

    /// Start recording a frame
    ///
    /// Blocks until the GPU finished the frame that last used this slot,
    /// then rewinds the slot's bump heaps. Returns the frame index.
    ///
    /// # Errors
    ///
    /// `RenderingHalted` once a critical error occurred, or the fence error.
    pub fn begin_frame(&mut self) -> Result<u32> {
        self.ensure_running()?;
        self.route(self.frame_sync.wait_for_slot())?;

        let frame_index = self.frame_sync.frame_index();
        let heaps = &self.frame_heaps[frame_index as usize];
        heaps.buffers.reset();
        heaps.samplers.reset();

        Ok(frame_index)
    }

    /// Signal the end of the frame and advance to the next slot
    pub fn end_frame(&mut self) -> Result<()> {
        self.ensure_running()?;
        let result = self.frame_sync.end_frame();
        self.route(result)
    }

    /// Slot currently being recorded
    pub fn frame_index(&self) -> u32 {
        self.frame_sync.frame_index()
    }

    pub fn frame_sync(&self) -> &FrameSync {
        &self.frame_sync
    }

    pub fn config(&self) -> &GfxConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }
}

impl Drop for GfxManager {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            engine_error!("framegpu::GfxManager", "wait_idle failed at shutdown: {}", e);
        }
        engine_debug!("framegpu::GfxManager", "Shut down");
    }
}

#[cfg(test)]
#[path = "gfx_manager_tests.rs"]
mod tests;
