//! Descriptor heap allocators
//!
//! - `GpuHeap`: shader-visible, one per frame in flight, bump allocated and
//!   reset once the frame's fence has passed.
//! - `StagingHeap`: CPU-only, free-list allocated, handles returned one by one.

pub mod gpu_heap;
pub mod staging_heap;

pub use gpu_heap::GpuHeap;
pub use staging_heap::StagingHeap;
