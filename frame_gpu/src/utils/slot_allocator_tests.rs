use super::*;

// ============================================================================
// Basic allocation tests
// ============================================================================

#[test]
fn test_sequential_alloc() {
    let mut alloc = SlotAllocator::with_capacity(8);
    assert_eq!(alloc.alloc(), Some(0));
    assert_eq!(alloc.alloc(), Some(1));
    assert_eq!(alloc.alloc(), Some(2));
}

#[test]
fn test_new_is_empty() {
    let alloc = SlotAllocator::with_capacity(8);
    assert!(alloc.is_empty());
    assert_eq!(alloc.len(), 0);
    assert_eq!(alloc.high_water_mark(), 0);
    assert_eq!(alloc.capacity(), 8);
}

#[test]
fn test_alloc_until_full() {
    let mut alloc = SlotAllocator::with_capacity(2);
    assert_eq!(alloc.alloc(), Some(0));
    assert!(!alloc.is_full());
    assert_eq!(alloc.alloc(), Some(1));
    assert!(alloc.is_full());
    assert_eq!(alloc.alloc(), None);
    assert_eq!(alloc.len(), 2);
}

#[test]
fn test_zero_capacity_never_allocates() {
    let mut alloc = SlotAllocator::with_capacity(0);
    assert!(alloc.is_full());
    assert_eq!(alloc.alloc(), None);
}

// ============================================================================
// Free and recycle tests
// ============================================================================

#[test]
fn test_free_and_recycle() {
    let mut alloc = SlotAllocator::with_capacity(8);
    let a = alloc.alloc().unwrap(); // 0
    let b = alloc.alloc().unwrap(); // 1
    alloc.free(a).unwrap();          // 0 goes to free list
    let c = alloc.alloc().unwrap(); // 0 (recycled)
    assert_eq!(c, 0);
    assert_eq!(b, 1);
}

#[test]
fn test_free_multiple_recycle_fifo() {
    // Free list is double-ended: freed to the back, recycled from the front
    let mut alloc = SlotAllocator::with_capacity(8);
    let a = alloc.alloc().unwrap(); // 0
    let _b = alloc.alloc().unwrap(); // 1
    let c = alloc.alloc().unwrap(); // 2
    alloc.free(c).unwrap();          // free list: [2]
    alloc.free(a).unwrap();          // free list: [2, 0]

    assert_eq!(alloc.alloc(), Some(2));
    assert_eq!(alloc.alloc(), Some(0));
    // Free list exhausted, next is fresh
    assert_eq!(alloc.alloc(), Some(3));
}

#[test]
fn test_full_allocator_recycles_after_free() {
    let mut alloc = SlotAllocator::with_capacity(1);
    let a = alloc.alloc().unwrap();
    assert_eq!(alloc.alloc(), None);
    alloc.free(a).unwrap();
    assert!(!alloc.is_full());
    assert_eq!(alloc.alloc(), Some(a));
}

// ============================================================================
// Double free detection
// ============================================================================

#[test]
fn test_double_free_is_rejected() {
    let mut alloc = SlotAllocator::with_capacity(4);
    let a = alloc.alloc().unwrap();
    assert_eq!(alloc.free(a), Ok(()));
    assert_eq!(alloc.free(a), Err(FreeError::NotLive));
    // Active count untouched by the rejected free
    assert_eq!(alloc.len(), 0);
}

#[test]
fn test_free_of_never_allocated_index() {
    let mut alloc = SlotAllocator::with_capacity(4);
    alloc.alloc().unwrap();
    assert_eq!(alloc.free(3), Err(FreeError::OutOfRange));
    assert_eq!(alloc.len(), 1);
}

#[test]
fn test_is_live() {
    let mut alloc = SlotAllocator::with_capacity(4);
    let a = alloc.alloc().unwrap();
    assert!(alloc.is_live(a));
    assert!(!alloc.is_live(2));
    alloc.free(a).unwrap();
    assert!(!alloc.is_live(a));
}

// ============================================================================
// len() and high_water_mark() tests
// ============================================================================

#[test]
fn test_len_tracks_active_slots() {
    let mut alloc = SlotAllocator::with_capacity(4);
    assert_eq!(alloc.len(), 0);

    alloc.alloc();
    assert_eq!(alloc.len(), 1);

    alloc.alloc();
    assert_eq!(alloc.len(), 2);

    alloc.free(0).unwrap();
    assert_eq!(alloc.len(), 1);

    alloc.free(1).unwrap();
    assert_eq!(alloc.len(), 0);
    assert!(alloc.is_empty());
}

#[test]
fn test_high_water_mark_never_decreases() {
    let mut alloc = SlotAllocator::with_capacity(8);
    alloc.alloc(); // 0
    alloc.alloc(); // 1
    assert_eq!(alloc.high_water_mark(), 2);

    alloc.free(0).unwrap();
    alloc.free(1).unwrap();
    assert_eq!(alloc.high_water_mark(), 2);

    alloc.alloc(); // 0 (recycled)
    alloc.alloc(); // 1 (recycled)
    assert_eq!(alloc.high_water_mark(), 2);

    alloc.alloc(); // 2 (fresh)
    assert_eq!(alloc.high_water_mark(), 3);
}

// ============================================================================
// Stress / pattern tests
// ============================================================================

#[test]
fn test_alloc_free_alloc_cycle() {
    let mut alloc = SlotAllocator::with_capacity(128);

    let ids: Vec<u32> = (0..100).map(|_| alloc.alloc().unwrap()).collect();
    assert_eq!(alloc.len(), 100);

    // Free all odd indices
    for &id in ids.iter().filter(|id| *id % 2 == 1) {
        alloc.free(id).unwrap();
    }
    assert_eq!(alloc.len(), 50);

    // Allocate 50 more: all recycled
    let new_ids: Vec<u32> = (0..50).map(|_| alloc.alloc().unwrap()).collect();
    assert_eq!(alloc.high_water_mark(), 100);
    for id in &new_ids {
        assert!(id % 2 == 1, "expected recycled odd id, got {}", id);
    }

    assert_eq!(alloc.alloc(), Some(100));
}

#[test]
fn test_indices_are_unique() {
    let mut alloc = SlotAllocator::with_capacity(64);
    let mut seen = std::collections::HashSet::new();

    for _ in 0..50 {
        seen.insert(alloc.alloc().unwrap());
    }
    for id in 0..10 {
        alloc.free(id).unwrap();
        seen.remove(&id);
    }
    for _ in 0..10 {
        let id = alloc.alloc().unwrap();
        assert!(seen.insert(id), "duplicate slot id: {}", id);
    }
    assert_eq!(seen.len(), 50);
}
