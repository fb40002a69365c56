pub mod slot_allocator;

pub use slot_allocator::{FreeError, SlotAllocator};

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, taking the data back from a poisoned lock.
///
/// Poisoning only happens when a fatal error already panicked on another
/// thread; the protected state is still consistent at that point.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Round `value` up to a multiple of `alignment` (0 or 1 = no alignment)
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}
