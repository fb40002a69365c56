use std::sync::Mutex;
use crate::error::Result;
use crate::graphics_device::{
    handle_at, DescriptorHandle, DescriptorHeapDesc, DescriptorHeapKind, DeviceDescriptorHeap,
    GraphicsDevice,
};
use crate::utils::{lock, FreeError, SlotAllocator};

/// CPU-only descriptor heap with a free list
///
/// Handles are allocated and returned one at a time from any thread. Every
/// allocated handle must be freed before the heap is dropped; a leak,
/// double free or foreign handle is a fatal error.
pub struct StagingHeap {
    heap: Box<dyn DeviceDescriptorHeap>,
    slots: Mutex<SlotAllocator>,
    name: String,
}

impl StagingHeap {
    /// Create a heap of `capacity` CPU-only slots
    pub fn new(
        device: &dyn GraphicsDevice,
        kind: DescriptorHeapKind,
        capacity: u32,
        name: &str,
    ) -> Result<Self> {
        let heap = device.create_descriptor_heap(&DescriptorHeapDesc {
            kind,
            capacity,
            shader_visible: false,
            name: name.to_string(),
        })?;

        crate::engine_debug!(
            "framegpu::StagingHeap",
            "Created '{}' ({:?}, {} slots)",
            name,
            kind,
            capacity
        );

        Ok(Self {
            heap,
            slots: Mutex::new(SlotAllocator::with_capacity(capacity)),
            name: name.to_string(),
        })
    }

    /// Allocate one slot
    ///
    /// # Panics
    ///
    /// When every slot is in use
    pub fn get_new_heap_handle(&self) -> DescriptorHandle {
        let mut slots = lock(&self.slots);
        match slots.alloc() {
            Some(index) => handle_at(self.heap.as_ref(), index),
            None => crate::engine_fatal!(
                "framegpu::StagingHeap",
                "Staging heap '{}' exhausted ({} slots in use)",
                self.name,
                slots.len()
            ),
        }
    }

    /// Return a slot to the free list
    ///
    /// # Panics
    ///
    /// On a double free or a handle that does not belong to this heap
    pub fn free_heap_handle(&self, handle: DescriptorHandle) {
        if handle != handle_at(self.heap.as_ref(), handle.heap_index)
            || handle.heap_index >= self.heap.capacity()
        {
            crate::engine_fatal!(
                "framegpu::StagingHeap",
                "Handle {:#x} (slot {}) does not belong to staging heap '{}'",
                handle.cpu_address,
                handle.heap_index,
                self.name
            );
        }

        let mut slots = lock(&self.slots);
        match slots.free(handle.heap_index) {
            Ok(()) => {}
            Err(FreeError::NotLive) | Err(FreeError::OutOfRange) => crate::engine_fatal!(
                "framegpu::StagingHeap",
                "Double free of slot {} in staging heap '{}' ({} active)",
                handle.heap_index,
                self.name,
                slots.len()
            ),
        }
    }

    /// Number of handles currently allocated
    pub fn active_count(&self) -> u32 {
        lock(&self.slots).len()
    }

    pub fn capacity(&self) -> u32 {
        self.heap.capacity()
    }

    pub fn kind(&self) -> DescriptorHeapKind {
        self.heap.kind()
    }

    pub fn device_heap(&self) -> &dyn DeviceDescriptorHeap {
        self.heap.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for StagingHeap {
    fn drop(&mut self) {
        let active = lock(&self.slots).len();
        if active != 0 && !std::thread::panicking() {
            crate::engine_fatal!(
                "framegpu::StagingHeap",
                "Staging heap '{}' dropped with {} handles still allocated",
                self.name,
                active
            );
        }
    }
}

#[cfg(test)]
#[path = "staging_heap_tests.rs"]
mod tests;
