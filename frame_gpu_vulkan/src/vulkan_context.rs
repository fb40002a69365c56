/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Contains everything resources need after creation:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Graphics and transfer queues with their submission locks
/// - Copy alignment limits

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use frame_gpu::framegpu::{Error, Result};
use frame_gpu::framegpu::device::QueueKind;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

/// Severity filter of the validation messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Vulkan backend configuration
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable VK_LAYER_KHRONOS_validation (needs the `vulkan-validation` feature)
    pub enable_validation: bool,
    /// Minimum severity forwarded to the engine log
    pub debug_severity: DebugSeverity,
    /// Panic on the first validation error
    pub panic_on_validation_error: bool,
    /// Count validation messages (see `get_validation_stats`)
    pub enable_validation_stats: bool,
    /// Use a transfer-only queue family for uploads when the GPU has one
    pub prefer_dedicated_transfer_queue: bool,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            app_name: "FrameGpu Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            panic_on_validation_error: false,
            enable_validation_stats: false,
            prefer_dedicated_transfer_queue: true,
        }
    }
}

/// A device queue and the lock serializing submissions to it
#[derive(Clone)]
pub struct QueueSlot {
    pub queue: vk::Queue,
    pub family: u32,
    /// Shared by both slots when graphics and transfer use the same queue
    pub submit_lock: Arc<Mutex<()>>,
}

/// Shared GPU context for all Vulkan resources.
///
/// Shared (via `Arc`) by the device and every buffer, texture, fence and
/// heap so each one can destroy itself. The allocator, debug messenger,
/// logical device and instance go away when the last holder drops it.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator, released before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    pub graphics: QueueSlot,
    pub transfer: QueueSlot,

    /// `optimalBufferCopyOffsetAlignment` of the physical device
    pub copy_offset_alignment: u64,

    instance: ash::Instance,

    /// Debug utils loader (for validation layers)
    debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,

    /// Loader library, must outlive `instance` and `device`
    _entry: ash::Entry,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        device: ash::Device,
        allocator: Allocator,
        graphics: QueueSlot,
        transfer: QueueSlot,
        copy_offset_alignment: u64,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Self {
        Self {
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics,
            transfer,
            copy_offset_alignment,
            instance,
            debug_utils_loader,
            debug_messenger,
            _entry: entry,
        }
    }

    pub fn queue(&self, kind: QueueKind) -> &QueueSlot {
        match kind {
            QueueKind::Graphics => &self.graphics,
            QueueKind::Transfer => &self.transfer,
        }
    }

    /// Distinct queue families (for CONCURRENT sharing)
    pub fn queue_families(&self) -> Vec<u32> {
        if self.graphics.family == self.transfer.family {
            vec![self.graphics.family]
        } else {
            vec![self.graphics.family, self.transfer.family]
        }
    }

    /// Lock the allocator
    pub fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| Error::BackendError("GPU allocator mutex poisoned".to_string()))
    }

    /// Submit to `kind`'s queue under its lock
    pub fn submit(&self, kind: QueueKind, submits: &[vk::SubmitInfo]) -> std::result::Result<(), vk::Result> {
        let slot = self.queue(kind);
        let _guard = slot.submit_lock.lock().unwrap_or_else(|p| p.into_inner());
        unsafe { self.device.queue_submit(slot.queue, submits, vk::Fence::null()) }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Frees the VkDeviceMemory blocks
            ManuallyDrop::drop(&mut self.allocator);

            // No callbacks during destruction
            #[cfg(feature = "vulkan-validation")]
            crate::debug::cleanup_debug_config();

            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
