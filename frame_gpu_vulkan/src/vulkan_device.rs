/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Headless: no surface or swapchain. Presentation belongs to the renderer
/// built on top of this crate.

use frame_gpu::framegpu::{Error, Result};
use frame_gpu::framegpu::device::{
    BufferDesc, CopyCommandList, DescriptorHandle, DescriptorHeapDesc, DescriptorHeapKind,
    DeviceBuffer, DeviceDescriptorHeap, DeviceTexture, Fence, GraphicsDevice, QueueKind,
    TextureDesc, VramBudget,
};
use frame_gpu::{engine_debug, engine_err, engine_error, engine_info};
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::VulkanCopyCommandList;
use crate::vulkan_context::{GpuContext, QueueSlot, VulkanConfig};
use crate::vulkan_descriptor_heap::HeapRegistry;
use crate::vulkan_fence::VulkanFence;
use crate::vulkan_texture::VulkanTexture;

const SOURCE: &str = "framegpu::vulkan";

/// Graphics and transfer queue family indices
///
/// The transfer family is a transfer-only family when one exists and
/// `prefer_dedicated` is set, the graphics family otherwise.
pub(crate) fn select_queue_families(
    families: &[vk::QueueFamilyProperties],
    prefer_dedicated: bool,
) -> Option<(u32, u32)> {
    let graphics = families
        .iter()
        .position(|qf| qf.queue_count > 0 && qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))? as u32;

    if !prefer_dedicated {
        return Some((graphics, graphics));
    }

    let is_transfer = |qf: &vk::QueueFamilyProperties| {
        qf.queue_count > 0
            && qf.queue_flags.contains(vk::QueueFlags::TRANSFER)
            && !qf.queue_flags.contains(vk::QueueFlags::GRAPHICS)
    };
    let transfer_only = families.iter().position(|qf| {
        is_transfer(qf) && !qf.queue_flags.contains(vk::QueueFlags::COMPUTE)
    });
    let async_compute = families.iter().position(is_transfer);

    let transfer = transfer_only.or(async_compute).map(|i| i as u32).unwrap_or(graphics);
    Some((graphics, transfer))
}

/// Selection rank of a physical device type (lower is better)
pub(crate) fn device_type_rank(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 0,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        _ => 3,
    }
}

/// CPU-visible VRAM from the memory properties and, when available, the
/// `VK_EXT_memory_budget` heap budgets and usages
///
/// CPU-visible VRAM is every heap backing a `DEVICE_LOCAL | HOST_VISIBLE`
/// memory type (resizable BAR or unified memory).
pub(crate) fn cpu_visible_vram(
    memory: &vk::PhysicalDeviceMemoryProperties,
    budget: Option<([vk::DeviceSize; vk::MAX_MEMORY_HEAPS], [vk::DeviceSize; vk::MAX_MEMORY_HEAPS])>,
) -> Option<VramBudget> {
    let wanted = vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE;
    let type_count = (memory.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
    let heap_count = (memory.memory_heap_count as usize).min(vk::MAX_MEMORY_HEAPS);

    let mut heaps: Vec<usize> = memory.memory_types[..type_count]
        .iter()
        .filter(|ty| ty.property_flags.contains(wanted))
        .map(|ty| ty.heap_index as usize)
        .filter(|&heap| heap < heap_count)
        .collect();
    heaps.sort_unstable();
    heaps.dedup();

    if heaps.is_empty() {
        return None;
    }

    let mut total = 0u64;
    let mut available = 0u64;
    for heap in heaps {
        let size = memory.memory_heaps[heap].size;
        total += size;
        available += match budget {
            Some((budgets, usages)) => budgets[heap].min(size).saturating_sub(usages[heap]),
            None => size,
        };
    }
    Some(VramBudget { total, available })
}

/// Engine error for a failed queue operation
fn queue_error(result: vk::Result, what: &str) -> Error {
    match result {
        vk::Result::ERROR_DEVICE_LOST => {
            let message = format!("{} failed: device lost", what);
            engine_error!(SOURCE, "{}", message);
            Error::DeviceLost(message)
        }
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            engine_error!(SOURCE, "{} failed: out of memory ({:?})", what, result);
            Error::OutOfMemory
        }
        other => engine_err!(SOURCE, "{} failed: {:?}", what, other),
    }
}

fn as_vulkan_fence(fence: &dyn Fence) -> Result<&VulkanFence> {
    fence
        .as_any()
        .downcast_ref::<VulkanFence>()
        .ok_or_else(|| Error::InvalidResource("fence was not created by the Vulkan device".to_string()))
}

fn init_error(message: String) -> Error {
    engine_error!(SOURCE, "{}", message);
    Error::InitializationFailed(message)
}

#[cfg(feature = "vulkan-validation")]
unsafe fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    config: &VulkanConfig,
) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
    if !config.enable_validation {
        return Ok((None, None));
    }
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

    crate::debug::init_debug_config(crate::debug::Config {
        severity: config.debug_severity,
        panic_on_error: config.panic_on_validation_error,
        enable_stats: config.enable_validation_stats,
    });

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(crate::debug::messenger_severity(config.debug_severity))
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

    let messenger = debug_utils
        .create_debug_utils_messenger(&debug_info, None)
        .map_err(|e| init_error(format!("Failed to create debug messenger: {:?}", e)))?;

    Ok((Some(debug_utils), Some(messenger)))
}

#[cfg(not(feature = "vulkan-validation"))]
unsafe fn create_debug_messenger(
    _entry: &ash::Entry,
    _instance: &ash::Instance,
    config: &VulkanConfig,
) -> Result<(Option<ash::ext::debug_utils::Instance>, Option<vk::DebugUtilsMessengerEXT>)> {
    if config.enable_validation {
        frame_gpu::engine_warn!(SOURCE, "Validation requested but the vulkan-validation feature is disabled");
    }
    Ok((None, None))
}

/// Vulkan graphics device
pub struct VulkanDevice {
    /// Instance functions for capability queries; destroyed by `GpuContext`
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    /// Shared context handed to every resource
    ctx: Arc<GpuContext>,
    heaps: HeapRegistry,
    next_id: AtomicU64,
    memory_budget_supported: bool,
    device_name: String,
}

impl VulkanDevice {
    /// Create a headless Vulkan device
    ///
    /// Requires Vulkan 1.2 with timeline semaphores, buffer device address and
    /// update-after-bind descriptor indexing.
    pub fn new(config: VulkanConfig) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_error(format!("Failed to load Vulkan library: {:?}", e)))?;

            let app_name = std::ffi::CString::new(config.app_name.as_str())
                .map_err(|e| Error::InitializationFailed(format!("Invalid application name: {}", e)))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"FrameGpu")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let validation = config.enable_validation && cfg!(feature = "vulkan-validation");
            let extension_names = if validation {
                vec![ash::ext::debug_utils::NAME.as_ptr()]
            } else {
                vec![]
            };
            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error(format!("Failed to create Vulkan instance: {:?}", e)))?;

            let (debug_utils_loader, debug_messenger) = match create_debug_messenger(&entry, &instance, &config) {
                Ok(debug) => debug,
                Err(e) => {
                    instance.destroy_instance(None);
                    return Err(e);
                }
            };
            match Self::create_device(&instance, &config) {
                Ok((physical_device, device, families, budget_supported, name)) => {
                    Self::finish(
                        entry,
                        instance,
                        physical_device,
                        device,
                        families,
                        budget_supported,
                        name,
                        debug_utils_loader,
                        debug_messenger,
                    )
                }
                Err(e) => {
                    if let (Some(loader), Some(messenger)) = (&debug_utils_loader, debug_messenger) {
                        loader.destroy_debug_utils_messenger(messenger, None);
                    }
                    instance.destroy_instance(None);
                    Err(e)
                }
            }
        }
    }

    /// Pick a physical device and create the logical device on it
    unsafe fn create_device(
        instance: &ash::Instance,
        config: &VulkanConfig,
    ) -> Result<(vk::PhysicalDevice, ash::Device, (u32, u32), bool, String)> {
        let physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| init_error(format!("Failed to enumerate physical devices: {:?}", e)))?;

        let physical_device = physical_devices
            .into_iter()
            .filter(|&pd| instance.get_physical_device_properties(pd).api_version >= vk::API_VERSION_1_2)
            .min_by_key(|&pd| device_type_rank(instance.get_physical_device_properties(pd).device_type))
            .ok_or_else(|| init_error("No Vulkan 1.2 capable GPU found".to_string()))?;

        let properties = instance.get_physical_device_properties(physical_device);
        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "Unknown GPU".to_string());

        let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
        let (graphics_family, transfer_family) =
            select_queue_families(&queue_families, config.prefer_dedicated_transfer_queue)
                .ok_or_else(|| init_error("No graphics queue family found".to_string()))?;

        let queue_priorities = [1.0];
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
            .queue_family_index(graphics_family)
            .queue_priorities(&queue_priorities)];
        if transfer_family != graphics_family {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(transfer_family)
                    .queue_priorities(&queue_priorities),
            );
        }

        let budget_supported = instance
            .enumerate_device_extension_properties(physical_device)
            .map(|extensions| {
                extensions.iter().any(|ext| {
                    ext.extension_name_as_c_str()
                        .map(|n| n == ash::ext::memory_budget::NAME)
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false);
        let device_extension_names = if budget_supported {
            vec![ash::ext::memory_budget::NAME.as_ptr()]
        } else {
            vec![]
        };

        let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
            .timeline_semaphore(true)
            .buffer_device_address(true)
            .descriptor_indexing(true)
            .runtime_descriptor_array(true)
            .descriptor_binding_partially_bound(true)
            .descriptor_binding_update_unused_while_pending(true)
            .descriptor_binding_storage_buffer_update_after_bind(true)
            .descriptor_binding_sampled_image_update_after_bind(true);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .push_next(&mut features12);

        let device = instance
            .create_device(physical_device, &device_create_info, None)
            .map_err(|e| init_error(format!("Failed to create logical device on {}: {:?}", name, e)))?;

        Ok((physical_device, device, (graphics_family, transfer_family), budget_supported, name))
    }

    #[allow(clippy::too_many_arguments)]
    unsafe fn finish(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        (graphics_family, transfer_family): (u32, u32),
        memory_budget_supported: bool,
        device_name: String,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                device.destroy_device(None);
                if let (Some(loader), Some(messenger)) = (&debug_utils_loader, debug_messenger) {
                    loader.destroy_debug_utils_messenger(messenger, None);
                }
                instance.destroy_instance(None);
                return Err(init_error(format!("Failed to create GPU allocator: {:?}", e)));
            }
        };

        let graphics = QueueSlot {
            queue: device.get_device_queue(graphics_family, 0),
            family: graphics_family,
            submit_lock: Arc::new(Mutex::new(())),
        };
        let transfer = if transfer_family == graphics_family {
            graphics.clone()
        } else {
            QueueSlot {
                queue: device.get_device_queue(transfer_family, 0),
                family: transfer_family,
                submit_lock: Arc::new(Mutex::new(())),
            }
        };

        let copy_offset_alignment = instance
            .get_physical_device_properties(physical_device)
            .limits
            .optimal_buffer_copy_offset_alignment;

        let ctx = Arc::new(GpuContext::new(
            entry,
            instance.clone(),
            device,
            allocator,
            graphics,
            transfer,
            copy_offset_alignment,
            debug_utils_loader,
            debug_messenger,
        ));

        engine_info!(SOURCE,
            "Using {} (graphics family {}, transfer family {}, memory budget {})",
            device_name,
            graphics_family,
            transfer_family,
            if memory_budget_supported { "supported" } else { "unsupported" });

        Ok(Self {
            instance,
            physical_device,
            ctx,
            heaps: HeapRegistry::new(),
            next_id: AtomicU64::new(1),
            memory_budget_supported,
            device_name,
        })
    }

    /// Name of the physical device
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Shared context (device, allocator, queues)
    pub fn context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl GraphicsDevice for VulkanDevice {
    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DeviceDescriptorHeap>> {
        Ok(Box::new(self.heaps.create_heap(&self.ctx, desc)?))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn DeviceBuffer>> {
        Ok(Arc::new(VulkanBuffer::create(Arc::clone(&self.ctx), desc, self.allocate_id())?))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn DeviceTexture>> {
        Ok(Arc::new(VulkanTexture::create(Arc::clone(&self.ctx), desc, self.allocate_id())?))
    }

    fn query_cpu_visible_vram(&self) -> Option<VramBudget> {
        unsafe {
            if self.memory_budget_supported {
                let mut budget = vk::PhysicalDeviceMemoryBudgetPropertiesEXT::default();
                let memory = {
                    let mut properties = vk::PhysicalDeviceMemoryProperties2::default().push_next(&mut budget);
                    self.instance.get_physical_device_memory_properties2(self.physical_device, &mut properties);
                    properties.memory_properties
                };
                cpu_visible_vram(&memory, Some((budget.heap_budget, budget.heap_usage)))
            } else {
                let memory = self.instance.get_physical_device_memory_properties(self.physical_device);
                cpu_visible_vram(&memory, None)
            }
        }
    }

    fn create_fence(&self, initial_value: u64) -> Result<Arc<dyn Fence>> {
        Ok(Arc::new(VulkanFence::create(Arc::clone(&self.ctx), initial_value)?))
    }

    fn create_copy_command_list(&self) -> Result<Box<dyn CopyCommandList>> {
        Ok(Box::new(VulkanCopyCommandList::new(Arc::clone(&self.ctx))?))
    }

    fn submit_copy_lists(&self, queue: QueueKind, lists: &[&dyn CopyCommandList]) -> Result<()> {
        let command_buffers = lists
            .iter()
            .map(|list| {
                list.as_any()
                    .downcast_ref::<VulkanCopyCommandList>()
                    .map(|list| list.command_buffer)
                    .ok_or_else(|| {
                        Error::InvalidResource("copy list was not created by the Vulkan device".to_string())
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        if command_buffers.is_empty() {
            return Ok(());
        }

        let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
        self.ctx
            .submit(queue, &[submit])
            .map_err(|e| queue_error(e, "Copy list submission"))
    }

    fn signal(&self, queue: QueueKind, fence: &dyn Fence, value: u64) -> Result<()> {
        let semaphores = [as_vulkan_fence(fence)?.handle()];
        let values = [value];
        let mut timeline = vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&values);
        let submit = vk::SubmitInfo::default()
            .signal_semaphores(&semaphores)
            .push_next(&mut timeline);

        self.ctx
            .submit(queue, &[submit])
            .map_err(|e| queue_error(e, "Fence signal"))
    }

    fn queue_wait(&self, queue: QueueKind, fence: &dyn Fence, value: u64) -> Result<()> {
        let semaphores = [as_vulkan_fence(fence)?.handle()];
        let values = [value];
        let stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let mut timeline = vk::TimelineSemaphoreSubmitInfo::default().wait_semaphore_values(&values);
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&semaphores)
            .wait_dst_stage_mask(&stages)
            .push_next(&mut timeline);

        self.ctx
            .submit(queue, &[submit])
            .map_err(|e| queue_error(e, "Queue wait"))
    }

    fn copy_descriptors(
        &self,
        kind: DescriptorHeapKind,
        dst: DescriptorHandle,
        src: &[DescriptorHandle],
    ) -> Result<()> {
        self.heaps.copy(&self.ctx, kind, dst, src)
    }

    fn write_buffer_descriptor(&self, dst: DescriptorHandle, buffer: &dyn DeviceBuffer) -> Result<()> {
        let vulkan_buffer = buffer.as_any().downcast_ref::<VulkanBuffer>().ok_or_else(|| {
            Error::InvalidResource(format!("buffer {} was not created by the Vulkan device", buffer.id()))
        })?;
        self.heaps.write_buffer(&self.ctx, dst, vulkan_buffer.handle(), buffer.size())
    }

    fn wait_idle(&self) -> Result<()> {
        let _graphics = self.ctx.graphics.submit_lock.lock().unwrap_or_else(|p| p.into_inner());
        let _transfer = if self.ctx.transfer.family != self.ctx.graphics.family {
            Some(self.ctx.transfer.submit_lock.lock().unwrap_or_else(|p| p.into_inner()))
        } else {
            None
        };
        unsafe { self.ctx.device.device_wait_idle() }.map_err(|e| queue_error(e, "Device wait idle"))
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }

        // The last holder of the context tears down the device and instance
        let holders = Arc::strong_count(&self.ctx) - 1;
        if holders > 0 {
            engine_debug!(SOURCE, "{} Vulkan objects outlive the device handle", holders);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;
