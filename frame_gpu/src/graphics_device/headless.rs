//! Headless graphics device
//!
//! A `GraphicsDevice` without a GPU. Buffers and textures live in host
//! memory, copy lists execute when they are submitted, and fences complete
//! either on signal (`FenceMode::AutoComplete`) or when a test says so
//! (`FenceMode::Manual`). Every submission, signal and queue wait is
//! recorded so callers can assert on ordering.
//!
//! Failure injection covers the paths a real backend can fail on: the
//! CPU-visible VRAM probe, allocations per memory location, fence and
//! command list creation, and queue submission.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::graphics_device::{
    check_range, BufferDesc, CopyCommandList, DescriptorHandle, DescriptorHeapDesc,
    DescriptorHeapKind, DeviceBuffer, DeviceDescriptorHeap, DeviceTexture, Fence,
    GraphicsDevice, MemoryLocation, QueueKind, SubresourceLayout, TextureDesc, VramBudget,
};
use crate::utils::{align_up, lock};

/// Byte stride between headless descriptor slots
pub const HEADLESS_DESCRIPTOR_STRIDE: u32 = 32;

/// Staging alignment reported by headless textures unless overridden
pub const HEADLESS_TEXTURE_ALIGNMENT: u64 = 512;

const GPU_ADDRESS_BASE: u64 = 0x1_0000;
const GPU_ADDRESS_ALIGNMENT: u64 = 256;
const GPU_HEAP_BIT: u64 = 1 << 62;
const DEFAULT_CPU_VISIBLE_VRAM: u64 = 256 * 1024 * 1024;

// ============================================================================
// Observation types
// ============================================================================

/// How fences created by the device reach their signaled values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceMode {
    /// A signal completes immediately
    AutoComplete,
    /// Signals stay pending until `HeadlessFence::complete_up_to` or `wait_idle`
    Manual,
}

/// Content of a headless descriptor slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorContent {
    Empty,
    Buffer {
        buffer_id: u64,
        size: u64,
        gpu_address: u64,
    },
}

/// A copy executed by a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutedCopy {
    Buffer { src_id: u64, dst_id: u64, size: u64 },
    Texture { src_id: u64, texture_id: u64, levels: u32 },
}

/// A queue operation, in submission order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOp {
    Submit { queue: QueueKind, lists: usize },
    Signal { queue: QueueKind, value: u64 },
    Wait { queue: QueueKind, value: u64 },
}

// ============================================================================
// HeadlessDevice
// ============================================================================

type DescriptorSlots = Arc<Mutex<Vec<DescriptorContent>>>;

/// Graphics device executing everything on the CPU
pub struct HeadlessDevice {
    next_id: AtomicU64,
    next_gpu_address: AtomicU64,
    vram_probe: Mutex<Option<VramBudget>>,
    failing_location: Mutex<Option<MemoryLocation>>,
    fail_next_submit: AtomicBool,
    fail_next_fence: AtomicBool,
    fail_next_command_list: AtomicBool,
    fence_mode: Mutex<FenceMode>,
    texture_alignment: AtomicU64,
    heaps: Mutex<FxHashMap<u64, DescriptorSlots>>,
    fences: Mutex<Vec<Weak<HeadlessFence>>>,
    executed: Mutex<Vec<ExecutedCopy>>,
    queue_ops: Mutex<Vec<QueueOp>>,
    wait_idle_count: AtomicUsize,
    live_buffers: Arc<AtomicUsize>,
}

impl HeadlessDevice {
    /// Create a device reporting 256 MiB of CPU-visible VRAM
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            next_gpu_address: AtomicU64::new(GPU_ADDRESS_BASE),
            vram_probe: Mutex::new(Some(VramBudget {
                total: DEFAULT_CPU_VISIBLE_VRAM,
                available: DEFAULT_CPU_VISIBLE_VRAM,
            })),
            failing_location: Mutex::new(None),
            fail_next_submit: AtomicBool::new(false),
            fail_next_fence: AtomicBool::new(false),
            fail_next_command_list: AtomicBool::new(false),
            fence_mode: Mutex::new(FenceMode::AutoComplete),
            texture_alignment: AtomicU64::new(HEADLESS_TEXTURE_ALIGNMENT),
            heaps: Mutex::new(FxHashMap::default()),
            fences: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            queue_ops: Mutex::new(Vec::new()),
            wait_idle_count: AtomicUsize::new(0),
            live_buffers: Arc::new(AtomicUsize::new(0)),
        }
    }

    // ===== FAILURE INJECTION / KNOBS =====

    /// Result of subsequent `query_cpu_visible_vram` calls (`None` = probe fails)
    pub fn set_vram_probe(&self, budget: Option<VramBudget>) {
        *lock(&self.vram_probe) = budget;
    }

    /// Make every allocation in `location` fail with `OutOfMemory`
    pub fn set_failing_location(&self, location: Option<MemoryLocation>) {
        *lock(&self.failing_location) = location;
    }

    /// Make the next `submit_copy_lists` fail
    pub fn fail_next_submit(&self) {
        self.fail_next_submit.store(true, Ordering::SeqCst);
    }

    /// Make the next `create_fence` fail
    pub fn fail_next_fence(&self) {
        self.fail_next_fence.store(true, Ordering::SeqCst);
    }

    /// Make the next `create_copy_command_list` fail
    pub fn fail_next_command_list(&self) {
        self.fail_next_command_list.store(true, Ordering::SeqCst);
    }

    /// Mode of fences created from now on
    pub fn set_fence_mode(&self, mode: FenceMode) {
        *lock(&self.fence_mode) = mode;
    }

    /// `required_alignment` of textures created from now on
    pub fn set_texture_alignment(&self, alignment: u64) {
        self.texture_alignment.store(alignment, Ordering::SeqCst);
    }

    // ===== OBSERVATION =====

    /// Copies executed so far, in order
    pub fn executed_copies(&self) -> Vec<ExecutedCopy> {
        lock(&self.executed).clone()
    }

    /// Queue operations so far, in order
    pub fn queue_ops(&self) -> Vec<QueueOp> {
        lock(&self.queue_ops).clone()
    }

    /// Number of successful submissions
    pub fn submission_count(&self) -> usize {
        lock(&self.queue_ops)
            .iter()
            .filter(|op| matches!(op, QueueOp::Submit { .. }))
            .count()
    }

    /// Number of `wait_idle` calls
    pub fn wait_idle_count(&self) -> usize {
        self.wait_idle_count.load(Ordering::SeqCst)
    }

    /// Number of buffers currently alive
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.load(Ordering::SeqCst)
    }

    /// Content of the descriptor slot at `cpu_address`
    pub fn descriptor_at(&self, cpu_address: u64) -> Option<DescriptorContent> {
        let (slots, index) = self.resolve(cpu_address).ok()?;
        let slots = lock(&slots);
        slots.get(index).cloned()
    }

    /// Bytes of a headless buffer, whatever its location
    pub fn buffer_contents(buffer: &dyn DeviceBuffer) -> Option<Vec<u8>> {
        buffer
            .as_any()
            .downcast_ref::<HeadlessBuffer>()
            .map(|b| b.contents())
    }

    /// Bytes uploaded into one mip level of a headless texture
    pub fn texture_level(texture: &dyn DeviceTexture, mip_level: u32) -> Option<Vec<u8>> {
        texture
            .as_any()
            .downcast_ref::<HeadlessTexture>()
            .and_then(|t| t.level_contents(mip_level))
    }

    /// Headless view of a fence created by this device
    pub fn headless_fence(fence: &dyn Fence) -> Option<&HeadlessFence> {
        fence.as_any().downcast_ref::<HeadlessFence>()
    }

    // ===== INTERNAL =====

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn check_location(&self, location: MemoryLocation, size: u64) -> Result<()> {
        if *lock(&self.failing_location) == Some(location) {
            crate::engine_warn!(
                "framegpu::Headless",
                "Injected allocation failure ({:?}, {} bytes)",
                location,
                size
            );
            return Err(Error::OutOfMemory);
        }
        Ok(())
    }

    fn resolve(&self, cpu_address: u64) -> Result<(DescriptorSlots, usize)> {
        let address = cpu_address & !GPU_HEAP_BIT;
        let heap_key = address >> 32;
        if cpu_address == 0 || heap_key == 0 {
            return Err(Error::InvalidResource(format!(
                "descriptor address {:#x} is invalid",
                cpu_address
            )));
        }

        let slots = lock(&self.heaps)
            .get(&(heap_key - 1))
            .cloned()
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "descriptor address {:#x} belongs to no heap",
                    cpu_address
                ))
            })?;

        let index = ((address & 0xFFFF_FFFF) / HEADLESS_DESCRIPTOR_STRIDE as u64) as usize;
        Ok((slots, index))
    }

    fn execute(&self, list: &HeadlessCommandList) -> Result<()> {
        for copy in &list.copies {
            match copy {
                RecordedCopy::Buffer { src, dst, size } => {
                    let src_buffer = as_headless_buffer(src.as_ref())?;
                    let dst_buffer = as_headless_buffer(dst.as_ref())?;
                    check_range(src_buffer.size, 0, *size)?;
                    check_range(dst_buffer.size, 0, *size)?;

                    let bytes = src_buffer.contents();
                    lock(&dst_buffer.data)[..*size as usize]
                        .copy_from_slice(&bytes[..*size as usize]);

                    lock(&self.executed).push(ExecutedCopy::Buffer {
                        src_id: src_buffer.id,
                        dst_id: dst_buffer.id,
                        size: *size,
                    });
                }
                RecordedCopy::Texture { src, dst, layouts } => {
                    let src_buffer = as_headless_buffer(src.as_ref())?;
                    let texture = dst
                        .as_any()
                        .downcast_ref::<HeadlessTexture>()
                        .ok_or_else(|| {
                            Error::InvalidResource("texture was not created by HeadlessDevice".to_string())
                        })?;

                    let bytes = src_buffer.contents();
                    let mut levels = lock(&texture.levels);
                    for layout in layouts {
                        let len = layout.row_pitch * layout.height as u64;
                        check_range(src_buffer.size, layout.offset, len)?;
                        let level = levels.get_mut(layout.mip_level as usize).ok_or_else(|| {
                            Error::InvalidResource(format!(
                                "texture {} has no mip level {}",
                                texture.id, layout.mip_level
                            ))
                        })?;
                        let start = layout.offset as usize;
                        *level = bytes[start..start + len as usize].to_vec();
                    }

                    lock(&self.executed).push(ExecutedCopy::Texture {
                        src_id: src_buffer.id,
                        texture_id: texture.id,
                        levels: layouts.len() as u32,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn as_headless_buffer(buffer: &dyn DeviceBuffer) -> Result<&HeadlessBuffer> {
    buffer
        .as_any()
        .downcast_ref::<HeadlessBuffer>()
        .ok_or_else(|| Error::InvalidResource("buffer was not created by HeadlessDevice".to_string()))
}

impl GraphicsDevice for HeadlessDevice {
    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DeviceDescriptorHeap>> {
        let id = self.allocate_id();
        let cpu_start = (id + 1) << 32;
        let slots = Arc::new(Mutex::new(vec![DescriptorContent::Empty; desc.capacity as usize]));
        lock(&self.heaps).insert(id, slots);

        Ok(Box::new(HeadlessDescriptorHeap {
            kind: desc.kind,
            capacity: desc.capacity,
            cpu_start,
            gpu_start: if desc.shader_visible { cpu_start | GPU_HEAP_BIT } else { 0 },
        }))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn DeviceBuffer>> {
        self.check_location(desc.location, desc.size)?;

        let span = align_up(desc.size.max(1), GPU_ADDRESS_ALIGNMENT);
        let gpu_address = self.next_gpu_address.fetch_add(span, Ordering::SeqCst);
        self.live_buffers.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(HeadlessBuffer {
            id: self.allocate_id(),
            size: desc.size,
            location: desc.location,
            gpu_address,
            data: Mutex::new(vec![0u8; desc.size as usize]),
            live: self.live_buffers.clone(),
        }))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn DeviceTexture>> {
        if desc.mip_levels == 0 || desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "texture '{}' has an empty extent or no mip levels",
                desc.name
            )));
        }
        self.check_location(MemoryLocation::DeviceLocal, 0)?;

        Ok(Arc::new(HeadlessTexture {
            id: self.allocate_id(),
            desc: desc.clone(),
            alignment: self.texture_alignment.load(Ordering::SeqCst),
            levels: Mutex::new(vec![Vec::new(); desc.mip_levels as usize]),
        }))
    }

    fn query_cpu_visible_vram(&self) -> Option<VramBudget> {
        *lock(&self.vram_probe)
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>> {
        if self.fail_next_fence.swap(false, Ordering::SeqCst) {
            return Err(Error::BackendError("injected fence creation failure".to_string()));
        }
        let fence = Arc::new(HeadlessFence::new(initial_value, *lock(&self.fence_mode)));
        lock(&self.fences).push(Arc::downgrade(&fence));
        Ok(fence)
    }

    fn create_copy_command_list(&self) -> Result<Box<dyn CopyCommandList>> {
        if self.fail_next_command_list.swap(false, Ordering::SeqCst) {
            return Err(Error::BackendError("injected command list creation failure".to_string()));
        }
        Ok(Box::new(HeadlessCommandList {
            state: ListState::Initial,
            copies: Vec::new(),
        }))
    }

    fn submit_copy_lists(&self, queue: QueueKind, lists: &[&dyn CopyCommandList]) -> Result<()> {
        if self.fail_next_submit.swap(false, Ordering::SeqCst) {
            return Err(Error::BackendError("injected submission failure".to_string()));
        }

        for list in lists {
            let list = list
                .as_any()
                .downcast_ref::<HeadlessCommandList>()
                .ok_or_else(|| {
                    Error::InvalidResource("command list was not created by HeadlessDevice".to_string())
                })?;
            if list.state != ListState::Ended {
                return Err(Error::InvalidResource("submitted a command list that was not ended".to_string()));
            }
            self.execute(list)?;
        }

        lock(&self.queue_ops).push(QueueOp::Submit { queue, lists: lists.len() });
        Ok(())
    }

    fn signal(&self, queue: QueueKind, fence: &dyn Fence, value: u64) -> Result<()> {
        let fence = Self::headless_fence(fence)
            .ok_or_else(|| Error::InvalidResource("fence was not created by HeadlessDevice".to_string()))?;
        fence.signal_from_queue(value);
        lock(&self.queue_ops).push(QueueOp::Signal { queue, value });
        Ok(())
    }

    fn queue_wait(&self, queue: QueueKind, _fence: &dyn Fence, value: u64) -> Result<()> {
        lock(&self.queue_ops).push(QueueOp::Wait { queue, value });
        Ok(())
    }

    fn copy_descriptors(
        &self,
        _kind: DescriptorHeapKind,
        dst: DescriptorHandle,
        src: &[DescriptorHandle],
    ) -> Result<()> {
        // Read every source first: sources and destination may share a heap
        let mut contents = Vec::with_capacity(src.len());
        for handle in src {
            let (slots, index) = self.resolve(handle.cpu_address)?;
            let slots = lock(&slots);
            let content = slots.get(index).cloned().ok_or_else(|| {
                Error::InvalidResource(format!("source descriptor {:#x} out of range", handle.cpu_address))
            })?;
            contents.push(content);
        }

        let (slots, start) = self.resolve(dst.cpu_address)?;
        let mut slots = lock(&slots);
        if start + contents.len() > slots.len() {
            return Err(Error::InvalidResource(format!(
                "copying {} descriptors at slot {} overflows a {}-slot heap",
                contents.len(),
                start,
                slots.len()
            )));
        }
        for (i, content) in contents.into_iter().enumerate() {
            slots[start + i] = content;
        }
        Ok(())
    }

    fn write_buffer_descriptor(&self, dst: DescriptorHandle, buffer: &dyn DeviceBuffer) -> Result<()> {
        let (slots, index) = self.resolve(dst.cpu_address)?;
        let mut slots = lock(&slots);
        let slot = slots.get_mut(index).ok_or_else(|| {
            Error::InvalidResource(format!("descriptor {:#x} out of range", dst.cpu_address))
        })?;
        *slot = DescriptorContent::Buffer {
            buffer_id: buffer.id(),
            size: buffer.size(),
            gpu_address: buffer.gpu_address(),
        };
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.wait_idle_count.fetch_add(1, Ordering::SeqCst);
        let mut fences = lock(&self.fences);
        fences.retain(|weak| weak.strong_count() > 0);
        for fence in fences.iter().filter_map(Weak::upgrade) {
            fence.complete_pending();
        }
        Ok(())
    }
}

// ============================================================================
// Buffers and textures
// ============================================================================

/// Host-memory buffer
pub struct HeadlessBuffer {
    id: u64,
    size: u64,
    location: MemoryLocation,
    gpu_address: u64,
    data: Mutex<Vec<u8>>,
    live: Arc<AtomicUsize>,
}

impl HeadlessBuffer {
    /// Current bytes, whatever the location
    pub fn contents(&self) -> Vec<u8> {
        lock(&self.data).clone()
    }
}

impl DeviceBuffer for HeadlessBuffer {
    fn id(&self) -> u64 {
        self.id
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn location(&self) -> MemoryLocation {
        self.location
    }

    fn gpu_address(&self) -> u64 {
        self.gpu_address
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if !self.location.is_mapped() {
            return Err(Error::InvalidResource(format!("buffer {} is not mapped", self.id)));
        }
        check_range(self.size, offset, data.len() as u64)?;
        let start = offset as usize;
        lock(&self.data)[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        if !self.location.is_mapped() {
            return Err(Error::InvalidResource(format!("buffer {} is not mapped", self.id)));
        }
        check_range(self.size, offset, len)?;
        let start = offset as usize;
        Ok(lock(&self.data)[start..start + len as usize].to_vec())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for HeadlessBuffer {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Host-memory texture, one byte vector per mip level
pub struct HeadlessTexture {
    id: u64,
    desc: TextureDesc,
    alignment: u64,
    levels: Mutex<Vec<Vec<u8>>>,
}

impl HeadlessTexture {
    /// Bytes last uploaded into `mip_level`
    pub fn level_contents(&self, mip_level: u32) -> Option<Vec<u8>> {
        lock(&self.levels).get(mip_level as usize).cloned()
    }
}

impl DeviceTexture for HeadlessTexture {
    fn id(&self) -> u64 {
        self.id
    }

    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn required_alignment(&self) -> u64 {
        self.alignment
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Descriptor heaps
// ============================================================================

/// Descriptor heap addressed as `(heap id + 1) << 32 + slot * 32`
pub struct HeadlessDescriptorHeap {
    kind: DescriptorHeapKind,
    capacity: u32,
    cpu_start: u64,
    gpu_start: u64,
}

impl DeviceDescriptorHeap for HeadlessDescriptorHeap {
    fn kind(&self) -> DescriptorHeapKind {
        self.kind
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn descriptor_size(&self) -> u32 {
        HEADLESS_DESCRIPTOR_STRIDE
    }

    fn cpu_start(&self) -> u64 {
        self.cpu_start
    }

    fn gpu_start(&self) -> u64 {
        self.gpu_start
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Fences
// ============================================================================

struct FenceState {
    completed: u64,
    pending: u64,
    lost: bool,
}

/// Timeline fence backed by a mutex and condition variable
pub struct HeadlessFence {
    mode: FenceMode,
    state: Mutex<FenceState>,
    cond: Condvar,
}

impl HeadlessFence {
    fn new(initial_value: u64, mode: FenceMode) -> Self {
        Self {
            mode,
            state: Mutex::new(FenceState {
                completed: initial_value,
                pending: initial_value,
                lost: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn signal_from_queue(&self, value: u64) {
        let mut state = lock(&self.state);
        state.pending = state.pending.max(value);
        if self.mode == FenceMode::AutoComplete {
            state.completed = state.completed.max(value);
            self.cond.notify_all();
        }
    }

    fn complete_pending(&self) {
        let mut state = lock(&self.state);
        state.completed = state.completed.max(state.pending);
        self.cond.notify_all();
    }

    /// Complete every value up to `value` (manual mode)
    pub fn complete_up_to(&self, value: u64) {
        let mut state = lock(&self.state);
        state.completed = state.completed.max(value);
        self.cond.notify_all();
    }

    /// Highest value a queue has signaled, completed or not
    pub fn pending_value(&self) -> u64 {
        lock(&self.state).pending
    }

    /// Fail every current and future wait with `DeviceLost`
    pub fn lose_device(&self) {
        lock(&self.state).lost = true;
        self.cond.notify_all();
    }
}

impl Fence for HeadlessFence {
    fn completed_value(&self) -> u64 {
        lock(&self.state).completed
    }

    fn wait(&self, value: u64) -> Result<()> {
        let mut state = lock(&self.state);
        loop {
            if state.lost {
                return Err(Error::DeviceLost(format!("fence wait for value {} failed", value)));
            }
            if state.completed >= value {
                return Ok(());
            }
            state = self
                .cond
                .wait(state)
                .map_err(|_| Error::DeviceLost("fence mutex poisoned".to_string()))?;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Command lists
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListState {
    Initial,
    Recording,
    Ended,
}

enum RecordedCopy {
    Buffer {
        src: Arc<dyn DeviceBuffer>,
        dst: Arc<dyn DeviceBuffer>,
        size: u64,
    },
    Texture {
        src: Arc<dyn DeviceBuffer>,
        dst: Arc<dyn DeviceTexture>,
        layouts: Vec<SubresourceLayout>,
    },
}

/// Command list that records copies for execution at submit time
pub struct HeadlessCommandList {
    state: ListState,
    copies: Vec<RecordedCopy>,
}

impl HeadlessCommandList {
    fn ensure_recording(&self) -> Result<()> {
        if self.state != ListState::Recording {
            return Err(Error::InvalidResource("command list is not recording".to_string()));
        }
        Ok(())
    }
}

impl CopyCommandList for HeadlessCommandList {
    fn begin(&mut self) -> Result<()> {
        self.copies.clear();
        self.state = ListState::Recording;
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        src: &Arc<dyn DeviceBuffer>,
        dst: &Arc<dyn DeviceBuffer>,
        size: u64,
    ) -> Result<()> {
        self.ensure_recording()?;
        self.copies.push(RecordedCopy::Buffer {
            src: src.clone(),
            dst: dst.clone(),
            size,
        });
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: &Arc<dyn DeviceBuffer>,
        dst: &Arc<dyn DeviceTexture>,
        layouts: &[SubresourceLayout],
    ) -> Result<()> {
        self.ensure_recording()?;
        self.copies.push(RecordedCopy::Texture {
            src: src.clone(),
            dst: dst.clone(),
            layouts: layouts.to_vec(),
        });
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_recording()?;
        self.state = ListState::Ended;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
#[path = "headless_tests.rs"]
mod tests;
