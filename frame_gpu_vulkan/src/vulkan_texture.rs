/// VulkanTexture - Vulkan implementation of the DeviceTexture trait

use frame_gpu::framegpu::{Error, Result};
use frame_gpu::framegpu::device::{DeviceTexture, TextureDesc, TextureFormat};
use frame_gpu::{engine_err, engine_error};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan format of an engine texture format
pub fn texture_format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8Unorm => vk::Format::R8_UNORM,
        TextureFormat::Rg8Unorm => vk::Format::R8G8_UNORM,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
    }
}

/// Staging offset alignment for a texel size and the device copy alignment
///
/// Buffer-to-image copies need offsets that are multiples of the texel size
/// (and of 4); the optimal alignment is a performance hint on top.
pub(crate) fn staging_alignment(bytes_per_pixel: u32, optimal: u64) -> u64 {
    let texel = (bytes_per_pixel as u64).max(4);
    let optimal = optimal.max(1);
    // least common multiple
    let mut alignment = texel.max(optimal);
    while alignment % texel != 0 || alignment % optimal != 0 {
        alignment += texel.max(optimal);
    }
    alignment
}

/// Vulkan texture implementation
pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    /// Vulkan image
    pub(crate) image: vk::Image,
    /// Vulkan image view
    pub(crate) view: vk::ImageView,
    /// GPU memory allocation
    allocation: Option<Allocation>,
    id: u64,
    desc: TextureDesc,
    alignment: u64,
}

impl VulkanTexture {
    /// Create a device-local sampled texture
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &TextureDesc, id: u64) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            return Err(Error::InvalidResource(format!(
                "texture '{}' has an empty extent {}x{} with {} mip levels",
                desc.name, desc.width, desc.height, desc.mip_levels
            )));
        }

        let format = texture_format_to_vk(desc.format);
        let families = ctx.queue_families();
        let mut image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        image_info = if families.len() > 1 {
            image_info
                .sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families)
        } else {
            image_info.sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        unsafe {
            let image = ctx.device.create_image(&image_info, None)
                .map_err(|e| engine_err!("framegpu::vulkan",
                    "Failed to create texture '{}' ({}x{}): {:?}", desc.name, desc.width, desc.height, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);

            let allocation = ctx.allocator().and_then(|mut allocator| {
                allocator.allocate(&AllocationCreateDesc {
                    name: &desc.name,
                    requirements,
                    location: gpu_allocator::MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_e| {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("framegpu::vulkan",
                        "Out of GPU memory for texture '{}' (required: {:.2} MB)", desc.name, size_mb);
                    Error::OutOfMemory
                })
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            let bound = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset());
            let view = bound.and_then(|_| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: desc.mip_levels,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                ctx.device.create_image_view(&view_info, None)
            });
            let view = match view {
                Ok(view) => view,
                Err(e) => {
                    if let Ok(mut allocator) = ctx.allocator() {
                        allocator.free(allocation).ok();
                    }
                    ctx.device.destroy_image(image, None);
                    return Err(engine_err!("framegpu::vulkan",
                        "Failed to bind texture '{}' memory: {:?}", desc.name, e));
                }
            };

            let alignment = staging_alignment(desc.format.bytes_per_pixel(), ctx.copy_offset_alignment);

            Ok(Self {
                ctx,
                image,
                view,
                allocation: Some(allocation),
                id,
                desc: desc.clone(),
                alignment,
            })
        }
    }

    /// Vulkan image view (for descriptor writes by the renderer)
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl DeviceTexture for VulkanTexture {
    fn id(&self) -> u64 {
        self.id
    }

    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn required_alignment(&self) -> u64 {
        self.alignment
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);

            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_image(self.image, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
