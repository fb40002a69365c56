/// Descriptor heap types
///
/// A descriptor is an opaque fixed-stride slot in a table. Handles carry the
/// CPU address used for writes/copies and, for shader-visible heaps, the GPU
/// address that command lists bind.

use std::any::Any;

/// Handle to one descriptor slot (or the first slot of a block)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DescriptorHandle {
    /// CPU address (0 = invalid)
    pub cpu_address: u64,
    /// GPU address (0 = not shader visible)
    pub gpu_address: u64,
    /// Slot index inside the owning heap
    pub heap_index: u32,
}

impl DescriptorHandle {
    /// Handle that refers to nothing
    pub const INVALID: DescriptorHandle = DescriptorHandle {
        cpu_address: 0,
        gpu_address: 0,
        heap_index: 0,
    };

    /// Whether the handle refers to a slot
    pub fn is_valid(&self) -> bool {
        self.cpu_address != 0
    }

    /// Whether shaders can index this slot
    pub fn is_shader_visible(&self) -> bool {
        self.gpu_address != 0
    }

    /// Handle `count` slots further into the same heap
    pub fn offset(&self, count: u32, stride: u32) -> DescriptorHandle {
        let bytes = count as u64 * stride as u64;
        DescriptorHandle {
            cpu_address: self.cpu_address + bytes,
            gpu_address: if self.gpu_address != 0 { self.gpu_address + bytes } else { 0 },
            heap_index: self.heap_index + count,
        }
    }
}

/// Kind of descriptors a heap holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    /// Constant/storage buffer and texture views
    Buffer,
    /// Samplers
    Sampler,
    /// Render target views
    RenderTarget,
    /// Depth stencil views
    DepthStencil,
}

/// Descriptor for creating a descriptor heap
#[derive(Debug, Clone)]
pub struct DescriptorHeapDesc {
    /// Descriptor kind
    pub kind: DescriptorHeapKind,
    /// Number of slots
    pub capacity: u32,
    /// Whether shaders can index the heap (GPU heaps) or not (staging heaps)
    pub shader_visible: bool,
    /// Debug name
    pub name: String,
}

/// Backend descriptor heap
pub trait DeviceDescriptorHeap: Send + Sync {
    /// Descriptor kind
    fn kind(&self) -> DescriptorHeapKind;

    /// Number of slots
    fn capacity(&self) -> u32;

    /// Byte stride between slots
    fn descriptor_size(&self) -> u32;

    /// CPU address of slot 0 (never 0)
    fn cpu_start(&self) -> u64;

    /// GPU address of slot 0, 0 when not shader visible
    fn gpu_start(&self) -> u64;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}

/// Handle of slot `index` in `heap`
pub fn handle_at(heap: &dyn DeviceDescriptorHeap, index: u32) -> DescriptorHandle {
    let bytes = index as u64 * heap.descriptor_size() as u64;
    let gpu_start = heap.gpu_start();
    DescriptorHandle {
        cpu_address: heap.cpu_start() + bytes,
        gpu_address: if gpu_start != 0 { gpu_start + bytes } else { 0 },
        heap_index: index,
    }
}
