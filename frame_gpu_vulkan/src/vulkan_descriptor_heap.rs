/// VulkanDescriptorHeap - descriptor heaps on top of descriptor sets
///
/// Vulkan has no descriptor heap object. A shader-visible heap is one
/// descriptor set holding a single update-after-bind array binding
/// (`STORAGE_BUFFER` for buffer heaps, `SAMPLER` for sampler heaps); shaders
/// index it with the slot's heap index. Staging heaps are host-side tables of
/// records, and copying descriptors into a shader-visible heap writes the
/// recorded views into its set.
///
/// Handles encode the heap id in the upper 32 bits of their addresses so the
/// device can resolve any handle back to its heap.

use frame_gpu::framegpu::{Error, Result};
use frame_gpu::framegpu::device::{
    DescriptorHandle, DescriptorHeapDesc, DescriptorHeapKind, DeviceDescriptorHeap,
};
use frame_gpu::engine_err;
use ash::vk;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::vulkan_context::GpuContext;

/// Byte stride between descriptor slots in handle addresses
pub const VULKAN_DESCRIPTOR_STRIDE: u32 = 16;

const GPU_HEAP_BIT: u64 = 1 << 62;
const SLOT_MASK: u64 = 0xFFFF_FFFF;

/// View recorded in a descriptor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorRecord {
    Empty,
    Buffer { buffer: vk::Buffer, size: u64 },
}

/// Slot table shared between a heap and the device registry
pub(crate) struct HeapStorage {
    pub(crate) id: u32,
    pub(crate) kind: DescriptorHeapKind,
    pub(crate) capacity: u32,
    pub(crate) shader_visible: bool,
    /// Null for staging heaps and for render target / depth stencil heaps
    pub(crate) set: vk::DescriptorSet,
    pub(crate) records: Mutex<Vec<DescriptorRecord>>,
}

impl HeapStorage {
    fn cpu_start(&self) -> u64 {
        (self.id as u64 + 1) << 32
    }

    fn gpu_start(&self) -> u64 {
        if self.shader_visible {
            GPU_HEAP_BIT | self.cpu_start()
        } else {
            0
        }
    }

    fn record(&self, index: usize) -> DescriptorRecord {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(index)
            .copied()
            .unwrap_or(DescriptorRecord::Empty)
    }
}

/// Heap id and slot index encoded in a CPU address
pub(crate) fn decode_address(cpu_address: u64) -> Option<(u32, u32)> {
    let heap = cpu_address >> 32;
    if heap == 0 || cpu_address & GPU_HEAP_BIT != 0 {
        return None;
    }
    let offset = cpu_address & SLOT_MASK;
    if offset % VULKAN_DESCRIPTOR_STRIDE as u64 != 0 {
        return None;
    }
    Some(((heap - 1) as u32, (offset / VULKAN_DESCRIPTOR_STRIDE as u64) as u32))
}

/// Descriptor type of a heap kind's set binding
pub(crate) fn descriptor_type(kind: DescriptorHeapKind) -> Option<vk::DescriptorType> {
    match kind {
        DescriptorHeapKind::Buffer => Some(vk::DescriptorType::STORAGE_BUFFER),
        DescriptorHeapKind::Sampler => Some(vk::DescriptorType::SAMPLER),
        DescriptorHeapKind::RenderTarget | DescriptorHeapKind::DepthStencil => None,
    }
}

/// Descriptor heap implementation
pub struct VulkanDescriptorHeap {
    ctx: Arc<GpuContext>,
    storage: Arc<HeapStorage>,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
}

impl VulkanDescriptorHeap {
    /// Descriptor set backing a shader-visible heap (null otherwise)
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.storage.set
    }

    /// Layout of `descriptor_set()` for pipeline layouts (null for staging heaps)
    pub fn set_layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl DeviceDescriptorHeap for VulkanDescriptorHeap {
    fn kind(&self) -> DescriptorHeapKind {
        self.storage.kind
    }

    fn capacity(&self) -> u32 {
        self.storage.capacity
    }

    fn descriptor_size(&self) -> u32 {
        VULKAN_DESCRIPTOR_STRIDE
    }

    fn cpu_start(&self) -> u64 {
        self.storage.cpu_start()
    }

    fn gpu_start(&self) -> u64 {
        self.storage.gpu_start()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanDescriptorHeap {
    fn drop(&mut self) {
        unsafe {
            // Frees the set as well
            if self.pool != vk::DescriptorPool::null() {
                self.ctx.device.destroy_descriptor_pool(self.pool, None);
            }
            if self.layout != vk::DescriptorSetLayout::null() {
                self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
            }
        }
    }
}

/// Every live heap of a device, by id
pub(crate) struct HeapRegistry {
    next_id: AtomicU32,
    heaps: Mutex<FxHashMap<u32, Weak<HeapStorage>>>,
}

impl HeapRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU32::new(0),
            heaps: Mutex::new(FxHashMap::default()),
        }
    }

    /// Create a heap and register it
    pub(crate) fn create_heap(
        &self,
        ctx: &Arc<GpuContext>,
        desc: &DescriptorHeapDesc,
    ) -> Result<VulkanDescriptorHeap> {
        if desc.capacity == 0 {
            return Err(Error::InvalidResource(format!("descriptor heap '{}' has no slots", desc.name)));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (pool, layout, set) = match descriptor_type(desc.kind) {
            Some(ty) if desc.shader_visible => create_set(ctx, ty, desc.capacity)?,
            _ => (vk::DescriptorPool::null(), vk::DescriptorSetLayout::null(), vk::DescriptorSet::null()),
        };

        let storage = Arc::new(HeapStorage {
            id,
            kind: desc.kind,
            capacity: desc.capacity,
            shader_visible: desc.shader_visible,
            set,
            records: Mutex::new(vec![DescriptorRecord::Empty; desc.capacity as usize]),
        });

        let mut heaps = self.heaps.lock().unwrap_or_else(|p| p.into_inner());
        heaps.retain(|_, heap| heap.strong_count() > 0);
        heaps.insert(id, Arc::downgrade(&storage));

        Ok(VulkanDescriptorHeap {
            ctx: Arc::clone(ctx),
            storage,
            pool,
            layout,
        })
    }

    /// Heap and slot index a handle refers to
    pub(crate) fn resolve(&self, handle: DescriptorHandle) -> Result<(Arc<HeapStorage>, u32)> {
        let (heap_id, index) = decode_address(handle.cpu_address).ok_or_else(|| {
            Error::InvalidResource(format!("descriptor handle {:#x} is not a Vulkan handle", handle.cpu_address))
        })?;
        let storage = self
            .heaps
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(&heap_id)
            .and_then(Weak::upgrade)
            .ok_or_else(|| Error::InvalidResource(format!("descriptor heap {} no longer exists", heap_id)))?;
        if index >= storage.capacity {
            return Err(Error::InvalidResource(format!(
                "descriptor slot {} outside heap {} of {} slots",
                index, heap_id, storage.capacity
            )));
        }
        Ok((storage, index))
    }

    /// Copy `src` records into consecutive slots from `dst`
    pub(crate) fn copy(
        &self,
        ctx: &GpuContext,
        kind: DescriptorHeapKind,
        dst: DescriptorHandle,
        src: &[DescriptorHandle],
    ) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        let (dst_heap, first) = self.resolve(dst)?;
        if dst_heap.kind != kind {
            return Err(Error::InvalidResource(format!(
                "copy of {:?} descriptors into a {:?} heap", kind, dst_heap.kind
            )));
        }
        if first as u64 + src.len() as u64 > dst_heap.capacity as u64 {
            return Err(Error::InvalidResource(format!(
                "copy of {} descriptors from slot {} overflows heap of {} slots",
                src.len(), first, dst_heap.capacity
            )));
        }

        let mut copied = Vec::with_capacity(src.len());
        for handle in src {
            let (src_heap, index) = self.resolve(*handle)?;
            if src_heap.kind != kind {
                return Err(Error::InvalidResource(format!(
                    "copy of a {:?} descriptor as {:?}", src_heap.kind, kind
                )));
            }
            copied.push(src_heap.record(index as usize));
        }

        {
            let mut records = dst_heap.records.lock().unwrap_or_else(|p| p.into_inner());
            for (i, record) in copied.iter().enumerate() {
                records[first as usize + i] = *record;
            }
        }

        write_set(ctx, &dst_heap, first, &copied);
        Ok(())
    }

    /// Record a buffer view in `dst`
    pub(crate) fn write_buffer(
        &self,
        ctx: &GpuContext,
        dst: DescriptorHandle,
        buffer: vk::Buffer,
        size: u64,
    ) -> Result<()> {
        let (heap, index) = self.resolve(dst)?;
        if heap.kind != DescriptorHeapKind::Buffer {
            return Err(Error::InvalidResource(format!(
                "buffer view written into a {:?} heap", heap.kind
            )));
        }
        let record = DescriptorRecord::Buffer { buffer, size };
        heap.records.lock().unwrap_or_else(|p| p.into_inner())[index as usize] = record;
        write_set(ctx, &heap, index, &[record]);
        Ok(())
    }
}

fn create_set(
    ctx: &GpuContext,
    ty: vk::DescriptorType,
    capacity: u32,
) -> Result<(vk::DescriptorPool, vk::DescriptorSetLayout, vk::DescriptorSet)> {
    let bindings = [vk::DescriptorSetLayoutBinding::default()
        .binding(0)
        .descriptor_type(ty)
        .descriptor_count(capacity)
        .stage_flags(vk::ShaderStageFlags::ALL)];
    let binding_flags = [vk::DescriptorBindingFlags::PARTIALLY_BOUND
        | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND
        | vk::DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING];
    let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default()
        .binding_flags(&binding_flags);
    let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
        .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
        .bindings(&bindings)
        .push_next(&mut flags_info);

    unsafe {
        let layout = ctx.device.create_descriptor_set_layout(&layout_info, None)
            .map_err(|e| engine_err!("framegpu::vulkan", "Failed to create heap set layout: {:?}", e))?;

        let pool_sizes = [vk::DescriptorPoolSize { ty, descriptor_count: capacity }];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let pool = match ctx.device.create_descriptor_pool(&pool_info, None) {
            Ok(pool) => pool,
            Err(e) => {
                ctx.device.destroy_descriptor_set_layout(layout, None);
                return Err(engine_err!("framegpu::vulkan", "Failed to create heap descriptor pool: {:?}", e));
            }
        };

        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        match ctx.device.allocate_descriptor_sets(&alloc_info) {
            Ok(sets) => Ok((pool, layout, sets[0])),
            Err(e) => {
                ctx.device.destroy_descriptor_pool(pool, None);
                ctx.device.destroy_descriptor_set_layout(layout, None);
                Err(engine_err!("framegpu::vulkan", "Failed to allocate heap descriptor set: {:?}", e))
            }
        }
    }
}

/// Write buffer records into a shader-visible heap's set
fn write_set(ctx: &GpuContext, heap: &HeapStorage, first: u32, records: &[DescriptorRecord]) {
    if heap.set == vk::DescriptorSet::null() {
        return;
    }
    // Empty slots stay as they are: PARTIALLY_BOUND allows stale entries
    // that shaders never index
    let infos: Vec<(u32, [vk::DescriptorBufferInfo; 1])> = records
        .iter()
        .enumerate()
        .filter_map(|(i, record)| match record {
            DescriptorRecord::Buffer { buffer, .. } => Some((
                first + i as u32,
                [vk::DescriptorBufferInfo { buffer: *buffer, offset: 0, range: vk::WHOLE_SIZE }],
            )),
            DescriptorRecord::Empty => None,
        })
        .collect();
    if infos.is_empty() {
        return;
    }
    let writes: Vec<vk::WriteDescriptorSet> = infos
        .iter()
        .map(|(element, info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(heap.set)
                .dst_binding(0)
                .dst_array_element(*element)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(info)
        })
        .collect();
    unsafe {
        ctx.device.update_descriptor_sets(&writes, &[]);
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_heap_tests.rs"]
mod tests;
