use super::*;
use crate::graphics_device::headless::{HeadlessDevice, HEADLESS_DESCRIPTOR_STRIDE};

fn heap(capacity: u32) -> GpuHeap {
    let device = HeadlessDevice::new();
    GpuHeap::new(&device, DescriptorHeapKind::Buffer, capacity, "frame_buffers").unwrap()
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn test_allocations_are_monotonic() {
    let heap = heap(16);

    let a = heap.allocate(3);
    let b = heap.allocate(1);
    let c = heap.allocate(4);

    assert_eq!(a.heap_index, 0);
    assert_eq!(b.heap_index, 3);
    assert_eq!(c.heap_index, 4);
    assert_eq!(heap.cursor(), 8);

    let stride = HEADLESS_DESCRIPTOR_STRIDE as u64;
    assert_eq!(b.cpu_address - a.cpu_address, 3 * stride);
    assert_eq!(c.gpu_address - a.gpu_address, 4 * stride);
}

#[test]
fn test_handles_are_shader_visible() {
    let heap = heap(4);
    let handle = heap.allocate(1);
    assert!(handle.is_valid());
    assert!(handle.is_shader_visible());
}

#[test]
fn test_alias_allocates_the_same_way() {
    let heap = heap(8);
    let a = heap.get_heap_handle_block(2);
    let b = heap.allocate(2);
    assert_eq!(a.heap_index, 0);
    assert_eq!(b.heap_index, 2);
}

#[test]
fn test_exact_capacity_fits() {
    let heap = heap(4);
    heap.allocate(4);
    assert_eq!(heap.cursor(), 4);
}

#[test]
#[should_panic(expected = "exhausted")]
fn test_overflow_panics() {
    let heap = heap(4);
    heap.allocate(3);
    heap.allocate(2);
}

// ============================================================================
// Reset
// ============================================================================

#[test]
fn test_reset_rewinds_to_zero() {
    let heap = heap(8);
    let first = heap.allocate(5);

    heap.reset();
    let again = heap.allocate(5);

    assert_eq!(first, again);
}

#[test]
fn test_reset_is_idempotent() {
    let heap = heap(8);
    heap.allocate(5);
    heap.reset();
    heap.reset();
    assert_eq!(heap.cursor(), 0);
    assert_eq!(heap.allocate(1).heap_index, 0);
}

#[test]
fn test_reset_to_keeps_prefix() {
    let heap = heap(8);
    heap.allocate(6);

    heap.reset_to(2);

    assert_eq!(heap.allocate(1).heap_index, 2);
}

#[test]
#[should_panic(expected = "beyond capacity")]
fn test_reset_to_beyond_capacity_panics() {
    let heap = heap(8);
    heap.reset_to(9);
}

#[test]
fn test_accessors() {
    let heap = heap(8);
    assert_eq!(heap.capacity(), 8);
    assert_eq!(heap.kind(), DescriptorHeapKind::Buffer);
    assert_eq!(heap.descriptor_size(), HEADLESS_DESCRIPTOR_STRIDE);
    assert_eq!(heap.name(), "frame_buffers");
    assert_ne!(heap.device_heap().gpu_start(), 0);
}
