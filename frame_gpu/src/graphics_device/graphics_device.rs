/// GraphicsDevice trait - the backend seam of frame_gpu
///
/// Everything above this trait (heaps, resources, upload context, frame
/// sync) is backend-neutral. A backend provides descriptor heaps, buffers,
/// textures, fences, copy command lists and queue operations.

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    BufferDesc, CopyCommandList, DescriptorHandle, DescriptorHeapDesc, DescriptorHeapKind,
    DeviceBuffer, DeviceDescriptorHeap, DeviceTexture, Fence, TextureDesc,
};

/// Hardware queue a submission, signal or wait targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Graphics queue (frame work)
    Graphics,
    /// Dedicated copy queue, falls back to graphics when the adapter has none
    Transfer,
}

/// CPU-visible VRAM budget reported by the capability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VramBudget {
    /// Total bytes of device-local memory the CPU can map
    pub total: u64,
    /// Bytes still available in that budget
    pub available: u64,
}

/// Graphics device abstraction
///
/// All methods take `&self`: implementations are internally synchronized so
/// the device can be shared (`Arc<dyn GraphicsDevice>`) by every resource.
pub trait GraphicsDevice: Send + Sync {
    /// Create a descriptor heap (table of fixed-stride descriptor slots)
    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DeviceDescriptorHeap>>;

    /// Create a buffer in the requested memory location
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn DeviceBuffer>>;

    /// Create a device-local texture
    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn DeviceTexture>>;

    /// Probe CPU-visible VRAM
    ///
    /// # Returns
    ///
    /// `None` when the adapter has no such memory or the probe failed
    fn query_cpu_visible_vram(&self) -> Option<VramBudget>;

    /// Create a timeline fence starting at `initial_value`
    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>>;

    /// Create a command list for copy work
    fn create_copy_command_list(&self) -> Result<Box<dyn CopyCommandList>>;

    /// Submit recorded (ended) copy lists to a queue
    fn submit_copy_lists(&self, queue: QueueKind, lists: &[&dyn CopyCommandList]) -> Result<()>;

    /// Signal `fence` to `value` once the queue reaches this point
    fn signal(&self, queue: QueueKind, fence: &dyn Fence, value: u64) -> Result<()>;

    /// Make the queue wait (GPU side) until `fence` reaches `value`
    fn queue_wait(&self, queue: QueueKind, fence: &dyn Fence, value: u64) -> Result<()>;

    /// Copy `src` descriptors into consecutive slots starting at `dst`
    fn copy_descriptors(
        &self,
        kind: DescriptorHeapKind,
        dst: DescriptorHandle,
        src: &[DescriptorHandle],
    ) -> Result<()>;

    /// Write a buffer view into the descriptor slot `dst`
    fn write_buffer_descriptor(&self, dst: DescriptorHandle, buffer: &dyn DeviceBuffer) -> Result<()>;

    /// Block until every queue is idle
    fn wait_idle(&self) -> Result<()>;
}
