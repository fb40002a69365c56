/// VulkanBuffer - Vulkan implementation of the DeviceBuffer trait

use frame_gpu::framegpu::{Error, Result};
use frame_gpu::framegpu::device::{
    check_range, BufferDesc, BufferUsage, DeviceBuffer, MemoryLocation,
};
use frame_gpu::{engine_err, engine_error};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan buffer implementation
pub struct VulkanBuffer {
    /// Shared GPU context (device, allocator, queues)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    allocation: Option<Allocation>,
    id: u64,
    size: u64,
    location: MemoryLocation,
    device_address: u64,
}

/// Allocator location for an engine memory location
pub(crate) fn allocator_location(location: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match location {
        MemoryLocation::DeviceLocal => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::CpuVisibleVram => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryLocation::Host => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

/// Vulkan usage flags for a buffer usage
pub(crate) fn usage_flags(usage: BufferUsage) -> vk::BufferUsageFlags {
    let copy = vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;
    match usage {
        BufferUsage::Storage => {
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS | copy
        }
        BufferUsage::Constant => {
            vk::BufferUsageFlags::UNIFORM_BUFFER
                | vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
                | copy
        }
        BufferUsage::Indirect => {
            vk::BufferUsageFlags::INDIRECT_BUFFER
                | vk::BufferUsageFlags::STORAGE_BUFFER
                | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
                | copy
        }
        BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
    }
}

impl VulkanBuffer {
    /// Create a buffer and bind fresh memory to it
    ///
    /// Zero-sized requests get a 1-byte allocation; `size()` still reports 0.
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &BufferDesc, id: u64) -> Result<Self> {
        let families = ctx.queue_families();
        let mut create_info = vk::BufferCreateInfo::default()
            .size(desc.size.max(1))
            .usage(usage_flags(desc.usage));
        create_info = if families.len() > 1 {
            create_info
                .sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families)
        } else {
            create_info.sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        unsafe {
            let buffer = ctx.device.create_buffer(&create_info, None)
                .map_err(|e| engine_err!("framegpu::vulkan",
                    "Failed to create buffer '{}' of size {} bytes: {:?}", desc.name, desc.size, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = ctx.allocator().and_then(|mut allocator| {
                allocator.allocate(&AllocationCreateDesc {
                    name: &desc.name,
                    requirements,
                    location: allocator_location(desc.location),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_e| {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("framegpu::vulkan",
                        "Out of GPU memory for buffer '{}' ({:?}, required: {:.2} MB)",
                        desc.name, desc.location, size_mb);
                    Error::OutOfMemory
                })
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            // CpuToGpu falls back to plain host memory when the adapter has
            // no mappable VRAM, which would silently defeat the mapped path
            if desc.location == MemoryLocation::CpuVisibleVram
                && !allocation.memory_properties().contains(vk::MemoryPropertyFlags::DEVICE_LOCAL)
            {
                if let Ok(mut allocator) = ctx.allocator() {
                    allocator.free(allocation).ok();
                }
                ctx.device.destroy_buffer(buffer, None);
                engine_error!("framegpu::vulkan",
                    "No CPU-visible VRAM left for buffer '{}'", desc.name);
                return Err(Error::OutOfMemory);
            }

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                if let Ok(mut allocator) = ctx.allocator() {
                    allocator.free(allocation).ok();
                }
                ctx.device.destroy_buffer(buffer, None);
                return Err(engine_err!("framegpu::vulkan", "Failed to bind buffer memory: {:?}", e));
            }

            let device_address = if create_info.usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS) {
                ctx.device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer))
            } else {
                0
            };

            Ok(Self {
                ctx,
                buffer,
                allocation: Some(allocation),
                id,
                size: desc.size,
                location: desc.location,
                device_address,
            })
        }
    }

    /// Vulkan buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    fn mapped_ptr(&self) -> Result<*mut u8> {
        if !self.location.is_mapped() {
            return Err(Error::InvalidResource(format!(
                "buffer {} is device-local and cannot be mapped",
                self.id
            )));
        }
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.as_ptr() as *mut u8)
            .ok_or_else(|| engine_err!("framegpu::vulkan", "Buffer {} is not CPU-accessible", self.id))
    }
}

impl DeviceBuffer for VulkanBuffer {
    fn id(&self) -> u64 {
        self.id
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn location(&self) -> MemoryLocation {
        self.location
    }

    fn gpu_address(&self) -> u64 {
        self.device_address
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_range(self.size, offset, data.len() as u64)?;
        if data.is_empty() {
            return Ok(());
        }
        let mapped = self.mapped_ptr()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        check_range(self.size, offset, len)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let mapped = self.mapped_ptr()?;
        let mut out = vec![0u8; len as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(mapped.add(offset as usize), out.as_mut_ptr(), out.len());
        }
        Ok(out)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_buffer_tests.rs"]
mod tests;
