/// Device buffer trait and buffer descriptor

use std::any::Any;
use crate::error::Result;

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device-local, not mappable. Filled through copies.
    DeviceLocal,
    /// Device-local and persistently mapped (resizable BAR / UMA)
    CpuVisibleVram,
    /// Host memory, persistently mapped (staging, readback, scratch)
    Host,
}

impl MemoryLocation {
    /// Whether the CPU can write the buffer directly
    pub fn is_mapped(&self) -> bool {
        !matches!(self, MemoryLocation::DeviceLocal)
    }
}

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Shader storage / structured buffer
    Storage,
    /// Uniform/constant buffer
    Constant,
    /// Indirect draw/dispatch arguments
    Indirect,
    /// Copy source only
    Staging,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Memory location
    pub location: MemoryLocation,
    /// Debug name
    pub name: String,
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g., VulkanBuffer).
/// The buffer is destroyed when the last `Arc` is dropped.
pub trait DeviceBuffer: Send + Sync {
    /// Backend-unique id of this allocation
    fn id(&self) -> u64;

    /// Size in bytes
    fn size(&self) -> u64;

    /// Memory location
    fn location(&self) -> MemoryLocation;

    /// GPU virtual address (0 when the backend exposes none)
    fn gpu_address(&self) -> u64;

    /// Write into mapped memory
    ///
    /// # Errors
    ///
    /// `InvalidResource` for device-local buffers or out-of-range writes
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Read back mapped memory
    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>>;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}

/// Validate an `offset..offset + len` range against a buffer size
pub fn check_range(size: u64, offset: u64, len: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(crate::error::Error::InvalidResource(format!(
            "range {}..{} exceeds buffer size {}",
            offset,
            offset.saturating_add(len),
            size
        ))),
    }
}
