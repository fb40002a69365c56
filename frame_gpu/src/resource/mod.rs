//! GPU resources
//!
//! - `CpuResource`: host-visible buffer (staging, constants, indirect args)
//! - `GpuResource`: shader-read buffer, either mapped CPU-visible VRAM or a
//!   device-local buffer fed from an owned staging `CpuResource`
//! - `PixelBuffer`: texture pixels and their staging layout

pub mod cpu_resource;
pub mod gpu_resource;
pub mod pixel_buffer;

pub use cpu_resource::{CpuResource, CpuResourceHint};
pub use gpu_resource::{CopyMode, GpuResource, GpuResourceDesc, GpuResourceKind, ResourceStrategy};
pub use pixel_buffer::{MipLevel, PixelBuffer};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{BufferDesc, DeviceBuffer, GraphicsDevice};

/// Identity of a resource, stable across reallocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ResourceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// End offset of a write of `len` bytes at `padding`
pub(crate) fn write_end(padding: u64, len: usize, name: &str) -> Result<u64> {
    padding.checked_add(len as u64).ok_or_else(|| {
        Error::InvalidResource(format!(
            "'{}': write of {} bytes at offset {} overflows",
            name, len, padding
        ))
    })
}

/// Replace a mapped buffer with a bigger one
///
/// With `preserve`, bytes `[0, old size)` are read out before the old buffer
/// is released and written back into the new one.
pub(crate) fn reallocate_mapped(
    device: &dyn GraphicsDevice,
    old: &Arc<dyn DeviceBuffer>,
    desc: &BufferDesc,
    preserve: bool,
) -> Result<Arc<dyn DeviceBuffer>> {
    let prefix = if preserve {
        Some(old.read(0, old.size())?)
    } else {
        None
    };

    let buffer = device.create_buffer(desc)?;

    if let Some(prefix) = prefix {
        buffer.write(0, &prefix)?;
    }
    Ok(buffer)
}
