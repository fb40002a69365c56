/*!
# FrameGpu - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` trait of frame_gpu.

Uses the Ash library for Vulkan bindings and gpu-allocator for memory
management. Descriptor heaps are emulated with update-after-bind descriptor
sets, fences are timeline semaphores, and uploads go through a dedicated
transfer queue when the GPU has one.

# Example

```no_run
use std::sync::Arc;
use frame_gpu::framegpu::{GfxConfig, GfxManager};
use frame_gpu_vulkan::{VulkanConfig, VulkanDevice};

let device = Arc::new(VulkanDevice::new(VulkanConfig::default())?);
let mut manager = GfxManager::new(device, GfxConfig::default())?;
let _frame = manager.begin_frame()?;
manager.end_frame()?;
# Ok::<(), frame_gpu::framegpu::Error>(())
```
*/

mod vulkan_context;
mod vulkan_device;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_fence;
mod vulkan_command_list;
mod vulkan_descriptor_heap;
#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan_context::{DebugSeverity, GpuContext, QueueSlot, VulkanConfig};
pub use vulkan_device::VulkanDevice;
pub use vulkan_buffer::VulkanBuffer;
pub use vulkan_texture::{texture_format_to_vk, VulkanTexture};
pub use vulkan_fence::VulkanFence;
pub use vulkan_command_list::VulkanCopyCommandList;
pub use vulkan_descriptor_heap::{DescriptorRecord, VulkanDescriptorHeap, VULKAN_DESCRIPTOR_STRIDE};

// Re-export debug utilities
#[cfg(feature = "vulkan-validation")]
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
