/// Host-visible buffer resource
///
/// Persistently mapped, single owner, released on drop. Used as upload
/// staging, constant buffers and indirect argument scratch. Never migrates
/// to device-local memory.

use std::sync::Arc;
use crate::engine_debug;
use crate::error::Result;
use crate::graphics_device::{BufferDesc, BufferUsage, DeviceBuffer, GraphicsDevice, MemoryLocation};
use crate::resource::{reallocate_mapped, write_end, ResourceId};
use crate::utils::align_up;

/// Constant buffer sizes are rounded up to this many bytes
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Intended use of a `CpuResource`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuResourceHint {
    /// Plain staging memory
    None,
    /// Constant buffer (size aligned to 256 bytes)
    ConstantBuffer,
    /// Indirect draw/dispatch arguments
    IndirectBuffer,
}

impl CpuResourceHint {
    fn usage(&self) -> BufferUsage {
        match self {
            CpuResourceHint::None => BufferUsage::Staging,
            CpuResourceHint::ConstantBuffer => BufferUsage::Constant,
            CpuResourceHint::IndirectBuffer => BufferUsage::Indirect,
        }
    }

    fn aligned_size(&self, size: u64) -> u64 {
        match self {
            CpuResourceHint::ConstantBuffer => align_up(size, CONSTANT_BUFFER_ALIGNMENT),
            _ => size,
        }
    }
}

/// Host-visible, persistently mapped buffer
pub struct CpuResource {
    id: ResourceId,
    device: Arc<dyn GraphicsDevice>,
    buffer: Arc<dyn DeviceBuffer>,
    hint: CpuResourceHint,
    name: String,
}

impl CpuResource {
    /// Allocate `size` bytes of host memory
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        hint: CpuResourceHint,
        size: u64,
        name: &str,
    ) -> Result<Self> {
        let buffer = device.create_buffer(&Self::buffer_desc(hint, size, name))?;
        Ok(Self {
            id: ResourceId::next(),
            device,
            buffer,
            hint,
            name: name.to_string(),
        })
    }

    fn buffer_desc(hint: CpuResourceHint, size: u64, name: &str) -> BufferDesc {
        BufferDesc {
            size: hint.aligned_size(size),
            usage: hint.usage(),
            location: MemoryLocation::Host,
            name: name.to_string(),
        }
    }

    /// Write `data` at byte offset `padding`
    ///
    /// Grows the buffer when `padding + data.len()` exceeds the current size.
    /// With a non-zero `padding` the bytes `[0, old size)` survive the growth.
    pub fn buffer_data(&mut self, data: &[u8], padding: u64) -> Result<()> {
        let required = write_end(padding, data.len(), &self.name)?;

        if required > self.size() {
            let old_size = self.size();
            let desc = Self::buffer_desc(self.hint, required, &self.name);
            self.buffer = reallocate_mapped(self.device.as_ref(), &self.buffer, &desc, padding != 0)?;

            engine_debug!(
                "framegpu::CpuResource",
                "'{}' grew {} -> {} bytes",
                self.name,
                old_size,
                self.size()
            );
        }

        self.buffer.write(padding, data)
    }

    /// `buffer_data` for plain-old-data slices
    pub fn buffer_pod<T: bytemuck::Pod>(&mut self, data: &[T], padding: u64) -> Result<()> {
        self.buffer_data(bytemuck::cast_slice(data), padding)
    }

    /// Read `len` bytes at `offset` from the mapping
    pub fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.buffer.read(offset, len)
    }

    /// Whole mapped contents
    pub fn mapped_bytes(&self) -> Result<Vec<u8>> {
        self.buffer.read(0, self.size())
    }

    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    pub fn gpu_address(&self) -> u64 {
        self.buffer.gpu_address()
    }

    pub fn hint(&self) -> CpuResourceHint {
        self.hint
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current device allocation (replaced on growth)
    pub fn device_buffer(&self) -> &Arc<dyn DeviceBuffer> {
        &self.buffer
    }
}

#[cfg(test)]
#[path = "cpu_resource_tests.rs"]
mod tests;
