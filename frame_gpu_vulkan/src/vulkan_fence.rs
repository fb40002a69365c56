/// VulkanFence - timeline semaphore implementation of the Fence trait

use frame_gpu::framegpu::{Error, Result};
use frame_gpu::framegpu::device::Fence;
use frame_gpu::{engine_err, engine_error};
use ash::vk;
use std::any::Any;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Timeline semaphore wrapper
pub struct VulkanFence {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl VulkanFence {
    pub(crate) fn create(ctx: Arc<GpuContext>, initial_value: u64) -> Result<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = unsafe { ctx.device.create_semaphore(&create_info, None) }
            .map_err(|e| engine_err!("framegpu::vulkan", "Failed to create timeline semaphore: {:?}", e))?;

        Ok(Self { ctx, semaphore })
    }

    /// Semaphore handle (for queue signal/wait submissions)
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Fence for VulkanFence {
    fn completed_value(&self) -> u64 {
        // A failed query means the device is gone; 0 keeps callers waiting,
        // and the wait itself reports DeviceLost
        unsafe { self.ctx.device.get_semaphore_counter_value(self.semaphore) }.unwrap_or(0)
    }

    fn wait(&self, value: u64) -> Result<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        unsafe { self.ctx.device.wait_semaphores(&wait_info, u64::MAX) }.map_err(|e| {
            let message = format!("timeline wait for value {} failed: {:?}", value, e);
            engine_error!("framegpu::vulkan", "{}", message);
            Error::DeviceLost(message)
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}
