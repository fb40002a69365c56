use std::sync::Mutex;
use crate::error::Result;
use crate::graphics_device::{
    handle_at, DescriptorHandle, DescriptorHeapDesc, DescriptorHeapKind, DeviceDescriptorHeap,
    GraphicsDevice,
};
use crate::utils::lock;

/// Shader-visible descriptor heap with a monotonic cursor
///
/// Slots are handed out in contiguous blocks and never freed one by one.
/// The whole heap is rewound with `reset` when the frame slot that owns it
/// is reused, which is only legal after that slot's fence wait.
pub struct GpuHeap {
    heap: Box<dyn DeviceDescriptorHeap>,
    cursor: Mutex<u32>,
    name: String,
}

impl GpuHeap {
    /// Create a heap of `capacity` shader-visible slots
    pub fn new(
        device: &dyn GraphicsDevice,
        kind: DescriptorHeapKind,
        capacity: u32,
        name: &str,
    ) -> Result<Self> {
        let heap = device.create_descriptor_heap(&DescriptorHeapDesc {
            kind,
            capacity,
            shader_visible: true,
            name: name.to_string(),
        })?;

        crate::engine_debug!(
            "framegpu::GpuHeap",
            "Created '{}' ({:?}, {} slots)",
            name,
            kind,
            capacity
        );

        Ok(Self {
            heap,
            cursor: Mutex::new(0),
            name: name.to_string(),
        })
    }

    /// Allocate `count` contiguous slots
    ///
    /// # Returns
    ///
    /// Handle of the first slot of the block
    ///
    /// # Panics
    ///
    /// When `cursor + count` exceeds the capacity
    pub fn allocate(&self, count: u32) -> DescriptorHandle {
        let mut cursor = lock(&self.cursor);
        let capacity = self.heap.capacity();

        let end = cursor.checked_add(count).filter(|end| *end <= capacity);
        let Some(end) = end else {
            crate::engine_fatal!(
                "framegpu::GpuHeap",
                "GPU heap '{}' exhausted: {} + {} > {}",
                self.name,
                *cursor,
                count,
                capacity
            );
        };

        let handle = handle_at(self.heap.as_ref(), *cursor);
        *cursor = end;
        handle
    }

    /// Allocate `count` contiguous slots (same as `allocate`)
    pub fn get_heap_handle_block(&self, count: u32) -> DescriptorHandle {
        self.allocate(count)
    }

    /// Rewind the cursor to slot 0
    pub fn reset(&self) {
        *lock(&self.cursor) = 0;
    }

    /// Rewind the cursor to `new_start`, keeping `[0, new_start)` allocated
    ///
    /// # Panics
    ///
    /// When `new_start` exceeds the capacity
    pub fn reset_to(&self, new_start: u32) {
        if new_start > self.heap.capacity() {
            crate::engine_fatal!(
                "framegpu::GpuHeap",
                "GPU heap '{}' reset to {} beyond capacity {}",
                self.name,
                new_start,
                self.heap.capacity()
            );
        }
        *lock(&self.cursor) = new_start;
    }

    /// Next slot the cursor will hand out
    pub fn cursor(&self) -> u32 {
        *lock(&self.cursor)
    }

    pub fn capacity(&self) -> u32 {
        self.heap.capacity()
    }

    pub fn kind(&self) -> DescriptorHeapKind {
        self.heap.kind()
    }

    /// Byte stride between slots
    pub fn descriptor_size(&self) -> u32 {
        self.heap.descriptor_size()
    }

    /// Backend heap, for binding on command lists
    pub fn device_heap(&self) -> &dyn DeviceDescriptorHeap {
        self.heap.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "gpu_heap_tests.rs"]
mod tests;
