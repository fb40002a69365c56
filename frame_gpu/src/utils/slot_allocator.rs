use std::collections::VecDeque;

/// Allocates and recycles `u32` slot indices inside a fixed capacity.
///
/// Backs the free-list descriptor heaps. Freed indices go to the back of a
/// double-ended free list and are recycled from the front, so a freshly
/// freed slot is the last one to be handed out again. Every index is
/// tracked as live or free, which makes double frees observable.
///
/// # Example
///
/// ```ignore
/// let mut alloc = SlotAllocator::with_capacity(4);
/// let a = alloc.alloc().unwrap();  // 0
/// let b = alloc.alloc().unwrap();  // 1
/// alloc.free(a);                   // 0 is now available
/// let c = alloc.alloc().unwrap();  // 0 (recycled)
/// ```
pub struct SlotAllocator {
    free_list: VecDeque<u32>,
    live: Vec<bool>,
    next_id: u32,
    capacity: u32,
    len: u32,
}

/// Why a slot could not be returned to the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    /// Index is beyond anything this allocator ever handed out
    OutOfRange,
    /// Index is already free
    NotLive,
}

impl SlotAllocator {
    /// Create an allocator able to hold `capacity` live slots
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            free_list: VecDeque::new(),
            live: Vec::new(),
            next_id: 0,
            capacity,
            len: 0,
        }
    }

    /// Allocate the next available slot index, `None` when full
    pub fn alloc(&mut self) -> Option<u32> {
        let id = match self.free_list.pop_front() {
            Some(id) => id,
            None => {
                if self.next_id >= self.capacity {
                    return None;
                }
                let id = self.next_id;
                self.next_id += 1;
                self.live.push(false);
                id
            }
        };

        self.live[id as usize] = true;
        self.len += 1;
        Some(id)
    }

    /// Return a slot index to the pool for reuse
    pub fn free(&mut self, id: u32) -> Result<(), FreeError> {
        if id >= self.next_id {
            return Err(FreeError::OutOfRange);
        }
        if !self.live[id as usize] {
            return Err(FreeError::NotLive);
        }

        self.live[id as usize] = false;
        self.len -= 1;
        self.free_list.push_back(id);
        Ok(())
    }

    /// Whether `id` is currently allocated
    pub fn is_live(&self, id: u32) -> bool {
        self.live.get(id as usize).copied().unwrap_or(false)
    }

    /// Highest index ever allocated + 1.
    ///
    /// Never decreases; recycled allocations do not move it.
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }

    /// Maximum number of live slots
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of currently allocated slots
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether no slots are currently allocated
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the next `alloc` would fail
    pub fn is_full(&self) -> bool {
        self.free_list.is_empty() && self.next_id >= self.capacity
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "slot_allocator_tests.rs"]
mod tests;
