/// Upload context - batches staging → device copies on the transfer queue
///
/// Requests are either executed immediately (record, submit, wait) or
/// queued and executed together by the next `flush`. Queued requests are
/// keyed by destination: queuing a second copy into the same buffer or
/// texture replaces the first one, whose callback is dropped without
/// running. A flush records every selected request into one command list,
/// submits it once, makes the graphics queue wait on the transfer fence,
/// waits for the fence on the CPU and then runs the callbacks in FIFO order.
///
/// Requests own `Arc`s to the buffers they read and write, so a queued copy
/// keeps both allocations alive even if the resource that queued it grows
/// or is dropped before the flush.

use std::sync::{Arc, Mutex};
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use crate::config::GfxConfig;
use crate::error::{Error, Result};
use crate::graphics_device::{
    CopyCommandList, DeviceBuffer, DeviceTexture, Fence, GraphicsDevice, QueueKind,
    SubresourceLayout,
};
use crate::resource::{CpuResource, CpuResourceHint, GpuResource, PixelBuffer, ResourceId};
use crate::utils::lock;
use crate::{engine_debug, engine_error, engine_trace, engine_warn};

/// Completion callback of a queued request
pub type CopyCallback = Box<dyn FnOnce() + Send>;

bitflags! {
    /// Request classes a flush executes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UploadFlush: u32 {
        /// Staging buffer → device buffer copies
        const BUFFERS = 1 << 0;
        /// Pixel uploads into textures
        const TEXTURES = 1 << 1;
    }
}

/// Counters since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    /// Command lists submitted to the transfer queue
    pub submissions: u64,
    /// Buffer copies executed
    pub buffer_copies: u64,
    /// Texture uploads executed
    pub texture_copies: u64,
    /// Queued requests replaced by a newer request for the same destination
    pub replaced_requests: u64,
    /// Device joins performed before a texture flush
    pub joins: u64,
}

new_key_type! {
    /// Key of a pending request
    struct RequestKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RequestTarget {
    Buffer(ResourceId),
    Texture(u64),
}

enum RequestPayload {
    Buffer {
        src: Arc<dyn DeviceBuffer>,
        dst: Arc<dyn DeviceBuffer>,
        size: u64,
    },
    Texture {
        staging: CpuResource,
        dst: Arc<dyn DeviceTexture>,
        layouts: Vec<SubresourceLayout>,
        invalidates_bound: bool,
    },
}

struct UploadRequest {
    target: RequestTarget,
    payload: RequestPayload,
    on_complete: Option<CopyCallback>,
}

impl UploadRequest {
    fn class(&self) -> UploadFlush {
        match self.payload {
            RequestPayload::Buffer { .. } => UploadFlush::BUFFERS,
            RequestPayload::Texture { .. } => UploadFlush::TEXTURES,
        }
    }

    fn record(&self, list: &mut dyn CopyCommandList) -> Result<()> {
        match &self.payload {
            RequestPayload::Buffer { src, dst, size } => list.copy_buffer(src, dst, *size),
            RequestPayload::Texture { staging, dst, layouts, .. } => {
                list.copy_buffer_to_texture(staging.device_buffer(), dst, layouts)
            }
        }
    }
}

/// Pending requests in FIFO order
///
/// `order` may hold keys of replaced requests; they are skipped.
#[derive(Default)]
struct UploadQueue {
    requests: SlotMap<RequestKey, UploadRequest>,
    by_target: FxHashMap<RequestTarget, RequestKey>,
    order: Vec<RequestKey>,
}

/// Batches and fences staging → device copies
pub struct UploadContext {
    device: Arc<dyn GraphicsDevice>,
    fence: Arc<dyn Fence>,
    queue: Mutex<UploadQueue>,
    /// Last value signaled on `fence`. Held for the whole submit-and-wait.
    fence_value: Mutex<u64>,
    stats: Mutex<UploadStats>,
    join_before_texture_flush: bool,
}

impl UploadContext {
    /// Create the context and its transfer fence
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &GfxConfig) -> Result<Self> {
        let fence = device.create_fence(0).map_err(|e| {
            engine_error!("framegpu::UploadContext", "Failed to create transfer fence: {}", e);
            e
        })?;

        Ok(Self {
            device,
            fence,
            queue: Mutex::new(UploadQueue::default()),
            fence_value: Mutex::new(0),
            stats: Mutex::new(UploadStats::default()),
            join_before_texture_flush: config.join_before_texture_flush,
        })
    }

    // ===== BUFFERS =====

    /// Queue a copy of `src` into `dst` for the next flush
    ///
    /// Replaces any pending request for `dst`; the replaced callback is
    /// dropped without running.
    pub fn copy_buffers_queue_up(&self, src: &CpuResource, dst: &GpuResource, on_copied: Option<CopyCallback>) {
        let size = src.size().min(dst.size());
        self.enqueue(UploadRequest {
            target: RequestTarget::Buffer(dst.id()),
            payload: RequestPayload::Buffer {
                src: src.device_buffer().clone(),
                dst: dst.device_buffer().clone(),
                size,
            },
            on_complete: on_copied,
        });
    }

    /// Copy `src` into `dst` now and wait for completion
    pub fn copy_buffers_immediate(&self, src: &CpuResource, dst: &GpuResource) -> Result<()> {
        let size = src.size().min(dst.size());
        self.submit_and_wait(|list| list.copy_buffer(src.device_buffer(), dst.device_buffer(), size))?;
        lock(&self.stats).buffer_copies += 1;
        Ok(())
    }

    // ===== TEXTURES =====

    /// Stage `pixels` and queue their upload into `dst`
    ///
    /// With `invalidates_bound`, the flush joins the device first (when
    /// enabled by the configuration) because the GPU may still sample the
    /// old contents.
    pub fn copy_texture_queue_up(
        &self,
        dst: &Arc<dyn DeviceTexture>,
        pixels: &PixelBuffer,
        invalidates_bound: bool,
        on_generated: Option<CopyCallback>,
    ) -> Result<()> {
        let (staging, layouts) = self.stage_pixels(dst.as_ref(), pixels)?;
        self.enqueue(UploadRequest {
            target: RequestTarget::Texture(dst.id()),
            payload: RequestPayload::Texture {
                staging,
                dst: dst.clone(),
                layouts,
                invalidates_bound,
            },
            on_complete: on_generated,
        });
        Ok(())
    }

    /// Stage `pixels` and upload them into `dst` now
    pub fn copy_texture_immediate(&self, dst: &Arc<dyn DeviceTexture>, pixels: &PixelBuffer) -> Result<()> {
        let (staging, layouts) = self.stage_pixels(dst.as_ref(), pixels)?;
        self.submit_and_wait(|list| list.copy_buffer_to_texture(staging.device_buffer(), dst, &layouts))?;
        lock(&self.stats).texture_copies += 1;
        Ok(())
    }

    /// Create a staging resource holding every level at its aligned offset
    fn stage_pixels(
        &self,
        dst: &dyn DeviceTexture,
        pixels: &PixelBuffer,
    ) -> Result<(CpuResource, Vec<SubresourceLayout>)> {
        pixels.validate()?;

        let desc = dst.desc();
        if pixels.bytes_per_pixel != desc.format.bytes_per_pixel() {
            return Err(Error::InvalidResource(format!(
                "'{}': {} bytes per pixel uploaded into a {:?} texture",
                desc.name,
                pixels.bytes_per_pixel,
                desc.format
            )));
        }
        if pixels.width() != desc.width || pixels.height() != desc.height || pixels.mip_count() > desc.mip_levels {
            return Err(Error::InvalidResource(format!(
                "'{}': {}x{} with {} mips does not fit a {}x{} texture with {} mips",
                desc.name,
                pixels.width(),
                pixels.height(),
                pixels.mip_count(),
                desc.width,
                desc.height,
                desc.mip_levels
            )));
        }

        let layouts = pixels.layouts(dst.required_alignment());
        let total: u64 = layouts.iter().map(|l| l.slice_pitch).sum();
        let mut staging = CpuResource::new(
            self.device.clone(),
            CpuResourceHint::None,
            total,
            &format!("{}_upload", desc.name),
        )?;
        for (layout, level) in layouts.iter().zip(&pixels.levels) {
            staging.buffer_data(&level.pixels, layout.offset)?;
        }

        Ok((staging, layouts))
    }

    // ===== QUEUE =====

    fn enqueue(&self, request: UploadRequest) {
        let target = request.target;
        let mut queue = lock(&self.queue);

        if let Some(old_key) = queue.by_target.remove(&target) {
            if let Some(old) = queue.requests.remove(old_key) {
                if old.on_complete.is_some() {
                    engine_warn!(
                        "framegpu::UploadContext",
                        "Replaced queued upload {:?}; its completion callback is dropped",
                        target
                    );
                } else {
                    engine_trace!("framegpu::UploadContext", "Replaced queued upload {:?}", target);
                }
                lock(&self.stats).replaced_requests += 1;
            }
        }

        let key = queue.requests.insert(request);
        queue.by_target.insert(target, key);
        queue.order.push(key);
    }

    /// Remove the requests selected by `mask`, in FIFO order
    fn take(&self, mask: UploadFlush) -> Vec<UploadRequest> {
        let mut queue = lock(&self.queue);
        let UploadQueue { requests, by_target, order } = &mut *queue;

        let mut taken = Vec::new();
        order.retain(|key| {
            let Some(request) = requests.get(*key) else {
                return false;
            };
            if !mask.contains(request.class()) {
                return true;
            }
            if let Some(request) = requests.remove(*key) {
                by_target.remove(&request.target);
                taken.push(request);
            }
            false
        });
        taken
    }

    /// Execute every pending request
    pub fn flush(&self) -> Result<()> {
        self.flush_masked(UploadFlush::all())
    }

    /// Execute the pending requests of the classes in `mask`
    ///
    /// An empty queue is a no-op without submission. An empty mask is a
    /// caller error: it is logged and nothing happens.
    pub fn flush_masked(&self, mask: UploadFlush) -> Result<()> {
        if mask.is_empty() {
            engine_error!("framegpu::UploadContext", "Flush requested with an empty mask");
            return Ok(());
        }

        let batch = self.take(mask);
        if batch.is_empty() {
            return Ok(());
        }

        let needs_join = self.join_before_texture_flush
            && batch.iter().any(|r| matches!(r.payload, RequestPayload::Texture { invalidates_bound: true, .. }));
        if needs_join {
            self.device.wait_idle().map_err(|e| {
                engine_error!("framegpu::UploadContext", "Join before texture flush failed: {}", e);
                e
            })?;
            lock(&self.stats).joins += 1;
        }

        self.submit_and_wait(|list| {
            for request in &batch {
                request.record(list)?;
            }
            Ok(())
        })?;

        let buffers = batch.iter().filter(|r| r.class() == UploadFlush::BUFFERS).count() as u64;
        {
            let mut stats = lock(&self.stats);
            stats.buffer_copies += buffers;
            stats.texture_copies += batch.len() as u64 - buffers;
        }
        engine_debug!(
            "framegpu::UploadContext",
            "Flushed {} uploads ({} buffers)",
            batch.len(),
            buffers
        );

        for request in batch {
            if let Some(on_complete) = request.on_complete {
                on_complete();
            }
        }
        Ok(())
    }

    // ===== SUBMISSION =====

    /// Record one command list, submit it on the transfer queue and wait
    ///
    /// The graphics queue is made to wait on the same fence value so later
    /// frame work observes the copied bytes.
    fn submit_and_wait<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&mut dyn CopyCommandList) -> Result<()>,
    {
        let mut fence_value = lock(&self.fence_value);

        let mut list = self.device.create_copy_command_list().map_err(|e| {
            engine_error!("framegpu::UploadContext", "Failed to create copy command list: {}", e);
            e
        })?;

        list.begin()?;
        record(list.as_mut())?;
        list.end()?;

        self.device
            .submit_copy_lists(QueueKind::Transfer, &[list.as_ref()])
            .map_err(|e| {
                engine_error!("framegpu::UploadContext", "Copy submission failed: {}", e);
                e
            })?;

        let value = *fence_value + 1;
        self.device.signal(QueueKind::Transfer, self.fence.as_ref(), value)?;
        *fence_value = value;
        self.device.queue_wait(QueueKind::Graphics, self.fence.as_ref(), value)?;

        self.fence.wait(value).map_err(|e| {
            engine_error!("framegpu::UploadContext", "Transfer fence wait failed: {}", e);
            e
        })?;

        lock(&self.stats).submissions += 1;
        Ok(())
    }

    // ===== STATE =====

    /// Number of pending requests
    pub fn pending_count(&self) -> usize {
        lock(&self.queue).requests.len()
    }

    /// Whether a request for `dst` is pending
    pub fn is_buffer_pending(&self, dst: &GpuResource) -> bool {
        lock(&self.queue).by_target.contains_key(&RequestTarget::Buffer(dst.id()))
    }

    pub fn stats(&self) -> UploadStats {
        *lock(&self.stats)
    }

    /// Last transfer fence value signaled
    pub fn fence_value(&self) -> u64 {
        *lock(&self.fence_value)
    }
}

impl Drop for UploadContext {
    fn drop(&mut self) {
        let pending = lock(&self.queue).requests.len();
        if pending != 0 {
            engine_warn!(
                "framegpu::UploadContext",
                "Dropped with {} pending uploads; they never reach the GPU",
                pending
            );
        }
    }
}

#[cfg(test)]
#[path = "upload_context_tests.rs"]
mod tests;
