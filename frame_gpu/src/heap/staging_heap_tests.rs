use super::*;
use crate::graphics_device::headless::HeadlessDevice;
use std::collections::HashSet;

fn heap(capacity: u32) -> StagingHeap {
    let device = HeadlessDevice::new();
    StagingHeap::new(&device, DescriptorHeapKind::Buffer, capacity, "staging_buffers").unwrap()
}

// ============================================================================
// Allocation / free
// ============================================================================

#[test]
fn test_handles_are_unique_and_cpu_only() {
    let heap = heap(8);
    let handles: Vec<_> = (0..8).map(|_| heap.get_new_heap_handle()).collect();

    let addresses: HashSet<u64> = handles.iter().map(|h| h.cpu_address).collect();
    assert_eq!(addresses.len(), 8);
    assert!(handles.iter().all(|h| h.is_valid() && !h.is_shader_visible()));
    assert_eq!(heap.active_count(), 8);

    for handle in handles {
        heap.free_heap_handle(handle);
    }
}

#[test]
fn test_freed_handle_is_reused() {
    let heap = heap(2);
    let a = heap.get_new_heap_handle();
    let b = heap.get_new_heap_handle();

    heap.free_heap_handle(a);
    let c = heap.get_new_heap_handle();

    assert_eq!(c, a);
    heap.free_heap_handle(b);
    heap.free_heap_handle(c);
}

#[test]
fn test_active_count_is_conserved() {
    let heap = heap(16);
    let mut live = Vec::new();

    for round in 0..5 {
        for _ in 0..3 {
            live.push(heap.get_new_heap_handle());
        }
        if round % 2 == 0 {
            heap.free_heap_handle(live.remove(0));
        }
        assert_eq!(heap.active_count() as usize, live.len());
    }

    for handle in live {
        heap.free_heap_handle(handle);
    }
    assert_eq!(heap.active_count(), 0);
}

// ============================================================================
// Fatal paths
// ============================================================================

#[test]
#[should_panic(expected = "exhausted")]
fn test_exhaustion_panics() {
    let heap = heap(1);
    let _a = heap.get_new_heap_handle();
    let _b = heap.get_new_heap_handle();
}

#[test]
#[should_panic(expected = "Double free")]
fn test_double_free_panics() {
    let heap = heap(2);
    let a = heap.get_new_heap_handle();
    heap.free_heap_handle(a);
    heap.free_heap_handle(a);
}

#[test]
#[should_panic(expected = "does not belong")]
fn test_foreign_handle_panics() {
    let device = HeadlessDevice::new();
    let heap_a = StagingHeap::new(&device, DescriptorHeapKind::Buffer, 2, "a").unwrap();
    let heap_b = StagingHeap::new(&device, DescriptorHeapKind::Buffer, 2, "b").unwrap();

    let handle = heap_a.get_new_heap_handle();
    heap_b.free_heap_handle(handle);
}

#[test]
#[should_panic(expected = "still allocated")]
fn test_leak_panics_on_drop() {
    let heap = heap(2);
    let _leaked = heap.get_new_heap_handle();
    drop(heap);
}

#[test]
fn test_clean_drop_does_not_panic() {
    let heap = heap(2);
    let a = heap.get_new_heap_handle();
    heap.free_heap_handle(a);
    drop(heap);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_alloc_free() {
    let heap = std::sync::Arc::new(heap(64));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let heap = heap.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let handles: Vec<_> = (0..8).map(|_| heap.get_new_heap_handle()).collect();
                    for handle in handles {
                        heap.free_heap_handle(handle);
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(heap.active_count(), 0);
}
