/// VulkanCopyCommandList - Vulkan implementation of the CopyCommandList trait

use frame_gpu::framegpu::{Error, Result};
use frame_gpu::framegpu::device::{
    CopyCommandList, DeviceBuffer, DeviceTexture, SubresourceLayout,
};
use frame_gpu::engine_err;
use ash::vk;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_texture::VulkanTexture;

/// Records transfer commands into its own command pool.
///
/// Buffers and textures referenced by recorded copies are kept alive until
/// the list is dropped.
pub struct VulkanCopyCommandList {
    ctx: Arc<GpuContext>,
    /// Command pool for allocating command buffers
    command_pool: vk::CommandPool,
    /// Command buffer for recording
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Whether the command list is currently recording
    is_recording: bool,
    buffers: Vec<Arc<dyn DeviceBuffer>>,
    textures: Vec<Arc<dyn DeviceTexture>>,
}

fn as_vulkan_buffer(buffer: &Arc<dyn DeviceBuffer>) -> Result<&VulkanBuffer> {
    buffer.as_any().downcast_ref::<VulkanBuffer>().ok_or_else(|| {
        Error::InvalidResource(format!("buffer {} was not created by the Vulkan device", buffer.id()))
    })
}

fn as_vulkan_texture(texture: &Arc<dyn DeviceTexture>) -> Result<&VulkanTexture> {
    texture.as_any().downcast_ref::<VulkanTexture>().ok_or_else(|| {
        Error::InvalidResource(format!("texture {} was not created by the Vulkan device", texture.id()))
    })
}

/// Layout transition barrier covering `levels` mips of `image`
fn level_barrier(
    image: vk::Image,
    base_mip_level: u32,
    level_count: u32,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level,
            level_count,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
}

/// `(base level, level count)` spanned by `layouts`
pub(crate) fn uploaded_levels(layouts: &[SubresourceLayout]) -> (u32, u32) {
    let base = layouts.iter().map(|l| l.mip_level).min().unwrap_or(0);
    let end = layouts.iter().map(|l| l.mip_level + 1).max().unwrap_or(base);
    (base, end - base)
}

/// Buffer-to-image copy region of one staged mip level
pub(crate) fn copy_region(layout: &SubresourceLayout) -> vk::BufferImageCopy {
    vk::BufferImageCopy {
        buffer_offset: layout.offset,
        // Rows are tightly packed
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: layout.mip_level,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
        image_extent: vk::Extent3D { width: layout.width, height: layout.height, depth: 1 },
    }
}

impl VulkanCopyCommandList {
    /// Create a command list on the transfer queue family
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.transfer.family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);

            let command_pool = ctx.device.create_command_pool(&command_pool_create_info, None)
                .map_err(|e| engine_err!("framegpu::vulkan", "Failed to create command pool: {:?}", e))?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = match ctx.device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(engine_err!("framegpu::vulkan", "Failed to allocate command buffer: {:?}", e));
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer,
                is_recording: false,
                buffers: Vec::new(),
                textures: Vec::new(),
            })
        }
    }

    fn ensure_recording(&self) -> Result<()> {
        if self.is_recording {
            Ok(())
        } else {
            Err(Error::InvalidResource("copy command list is not recording".to_string()))
        }
    }
}

impl CopyCommandList for VulkanCopyCommandList {
    fn begin(&mut self) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe { self.ctx.device.begin_command_buffer(self.command_buffer, &begin_info) }
            .map_err(|e| engine_err!("framegpu::vulkan", "Failed to begin copy command list: {:?}", e))?;

        self.is_recording = true;
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        src: &Arc<dyn DeviceBuffer>,
        dst: &Arc<dyn DeviceBuffer>,
        size: u64,
    ) -> Result<()> {
        self.ensure_recording()?;
        if size > src.size() || size > dst.size() {
            return Err(Error::InvalidResource(format!(
                "copy of {} bytes exceeds source ({}) or destination ({})",
                size, src.size(), dst.size()
            )));
        }
        if size == 0 {
            return Ok(());
        }

        let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size };
        unsafe {
            self.ctx.device.cmd_copy_buffer(
                self.command_buffer,
                as_vulkan_buffer(src)?.handle(),
                as_vulkan_buffer(dst)?.handle(),
                &[region],
            );
        }

        self.buffers.push(Arc::clone(src));
        self.buffers.push(Arc::clone(dst));
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: &Arc<dyn DeviceBuffer>,
        dst: &Arc<dyn DeviceTexture>,
        layouts: &[SubresourceLayout],
    ) -> Result<()> {
        self.ensure_recording()?;
        if layouts.is_empty() {
            return Ok(());
        }
        let buffer = as_vulkan_buffer(src)?.handle();
        let image = as_vulkan_texture(dst)?.image;
        // Levels outside the upload keep their contents and layout
        let (base_level, level_count) = uploaded_levels(layouts);
        let regions: Vec<vk::BufferImageCopy> = layouts.iter().map(copy_region).collect();

        unsafe {
            let to_transfer = level_barrier(
                image,
                base_level,
                level_count,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
            );
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            self.ctx.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &regions,
            );

            // Transfer queues may not use shader stages; the graphics queue
            // waits on the upload fence before sampling
            let to_shader = level_barrier(
                image,
                base_level,
                level_count,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::empty(),
            );
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );
        }

        self.buffers.push(Arc::clone(src));
        self.textures.push(Arc::clone(dst));
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_recording()?;
        unsafe { self.ctx.device.end_command_buffer(self.command_buffer) }
            .map_err(|e| engine_err!("framegpu::vulkan", "Failed to end copy command list: {:?}", e))?;
        self.is_recording = false;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanCopyCommandList {
    fn drop(&mut self) {
        unsafe {
            // Frees the command buffer as well
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_command_list_tests.rs"]
mod tests;
