/// Shader-read buffer resource with a per-allocation strategy
///
/// A `GpuResource` is either:
/// - **Mapped**: persistently mapped CPU-visible VRAM. Writes land directly
///   in GPU memory and `copy` is a no-op.
/// - **Staged**: a device-local buffer plus an owned staging `CpuResource`.
///   Writes land in the staging buffer; `copy` moves them through the
///   upload context.
///
/// The strategy is decided once at creation from the device's
/// CPU-visible VRAM probe. The only later change is Mapped -> Staged, when a
/// mapped resource cannot grow inside CPU-visible VRAM.

use std::sync::Arc;
use crate::config::GfxConfig;
use crate::error::Result;
use crate::graphics_device::{BufferDesc, BufferUsage, DeviceBuffer, GraphicsDevice, MemoryLocation};
use crate::resource::{write_end, CpuResource, CpuResourceHint, ResourceId};
use crate::upload::{CopyCallback, UploadContext};
use crate::{engine_debug, engine_info, engine_warn};

/// Requested residency of a `GpuResource`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuResourceKind {
    /// Always device-local, always staged
    GpuOnly,
    /// CPU-visible VRAM when the adapter has enough of it, staged otherwise
    CpuVisibleIfPossible,
}

/// Strategy selected for a `GpuResource` at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStrategy {
    /// Persistently mapped CPU-visible VRAM
    Mapped,
    /// Device-local buffer fed from a staging buffer
    Staged,
}

/// How `GpuResource::copy` hands the staged bytes to the upload context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Record, submit and wait for the copy now
    Immediately,
    /// Batch into the next flush
    QueueUp,
}

/// Descriptor for creating a `GpuResource`
#[derive(Debug, Clone)]
pub struct GpuResourceDesc {
    pub kind: GpuResourceKind,
    /// Initial size in bytes
    pub size: u64,
    /// Join the device before replacing the allocation on growth
    pub require_join_before_updating: bool,
    /// Debug name
    pub name: String,
}

/// Shader-read buffer resource
pub struct GpuResource {
    id: ResourceId,
    device: Arc<dyn GraphicsDevice>,
    kind: GpuResourceKind,
    strategy: ResourceStrategy,
    buffer: Arc<dyn DeviceBuffer>,
    staging: Option<CpuResource>,
    require_join_before_updating: bool,
    name: String,
}

impl GpuResource {
    /// Create the resource and decide its strategy
    pub fn new(device: Arc<dyn GraphicsDevice>, desc: &GpuResourceDesc, config: &GfxConfig) -> Result<Self> {
        let mut strategy = Self::choose_strategy(device.as_ref(), desc.kind, desc.size, config);

        let mut mapped = None;
        if strategy == ResourceStrategy::Mapped {
            match device.create_buffer(&Self::buffer_desc(desc.size, MemoryLocation::CpuVisibleVram, &desc.name)) {
                Ok(buffer) => mapped = Some(buffer),
                Err(e) => {
                    engine_warn!(
                        "framegpu::GpuResource",
                        "'{}': CPU-visible VRAM allocation failed ({}), falling back to staging",
                        desc.name,
                        e
                    );
                    strategy = ResourceStrategy::Staged;
                }
            }
        }

        let (buffer, staging) = match mapped {
            Some(buffer) => (buffer, None),
            None => {
                let buffer = device.create_buffer(&Self::buffer_desc(desc.size, MemoryLocation::DeviceLocal, &desc.name))?;
                let staging = CpuResource::new(
                    device.clone(),
                    CpuResourceHint::None,
                    desc.size,
                    &format!("{}_staging", desc.name),
                )?;
                (buffer, Some(staging))
            }
        };

        engine_info!(
            "framegpu::GpuResource",
            "'{}' created: {} bytes, {:?}, strategy {:?}",
            desc.name,
            desc.size,
            desc.kind,
            strategy
        );

        Ok(Self {
            id: ResourceId::next(),
            device,
            kind: desc.kind,
            strategy,
            buffer,
            staging,
            require_join_before_updating: desc.require_join_before_updating,
            name: desc.name.clone(),
        })
    }

    /// Decide the strategy from the CPU-visible VRAM probe
    ///
    /// Mapped only when the probe succeeds, the total budget exceeds
    /// `config.min_cpu_visible_vram` and the free budget exceeds `size`.
    /// The caller still falls back to staged if the allocation fails.
    pub fn choose_strategy(
        device: &dyn GraphicsDevice,
        kind: GpuResourceKind,
        size: u64,
        config: &GfxConfig,
    ) -> ResourceStrategy {
        if kind == GpuResourceKind::GpuOnly || !config.prefer_cpu_visible_vram {
            return ResourceStrategy::Staged;
        }

        match device.query_cpu_visible_vram() {
            Some(budget) if budget.total > config.min_cpu_visible_vram && budget.available > size => {
                ResourceStrategy::Mapped
            }
            Some(budget) => {
                engine_debug!(
                    "framegpu::GpuResource",
                    "CPU-visible VRAM too small (total {}, free {}, requested {})",
                    budget.total,
                    budget.available,
                    size
                );
                ResourceStrategy::Staged
            }
            None => {
                engine_debug!("framegpu::GpuResource", "CPU-visible VRAM probe unavailable");
                ResourceStrategy::Staged
            }
        }
    }

    fn buffer_desc(size: u64, location: MemoryLocation, name: &str) -> BufferDesc {
        BufferDesc {
            size,
            usage: BufferUsage::Storage,
            location,
            name: name.to_string(),
        }
    }

    fn join_if_required(&self) -> Result<()> {
        if self.require_join_before_updating {
            self.device.wait_idle()?;
        }
        Ok(())
    }

    /// Write `data` at byte offset `padding`
    ///
    /// Mapped resources grow in place (join first if required) and keep
    /// `[0, old size)` when `padding` is non-zero. If the bigger CPU-visible
    /// allocation fails the resource switches to the staged strategy and the
    /// write goes to staging. Staged resources write into the staging buffer,
    /// which grows the same way; the device-local buffer follows at the next
    /// `copy`.
    pub fn buffer_data(&mut self, data: &[u8], padding: u64) -> Result<()> {
        if self.staging.is_none() {
            let required = write_end(padding, data.len(), &self.name)?;
            if required > self.buffer.size() {
                self.grow_mapped(required, padding != 0)?;
            }
        }

        match self.staging.as_mut() {
            Some(staging) => staging.buffer_data(data, padding),
            None => self.buffer.write(padding, data),
        }
    }

    fn grow_mapped(&mut self, required: u64, preserve: bool) -> Result<()> {
        let old_size = self.buffer.size();
        self.join_if_required()?;

        let prefix = if preserve {
            Some(self.buffer.read(0, old_size)?)
        } else {
            None
        };

        match self
            .device
            .create_buffer(&Self::buffer_desc(required, MemoryLocation::CpuVisibleVram, &self.name))
        {
            Ok(buffer) => {
                if let Some(prefix) = &prefix {
                    buffer.write(0, prefix)?;
                }
                self.buffer = buffer;
                engine_debug!(
                    "framegpu::GpuResource",
                    "'{}' (mapped) grew {} -> {} bytes",
                    self.name,
                    old_size,
                    required
                );
            }
            Err(e) => {
                engine_warn!(
                    "framegpu::GpuResource",
                    "'{}': CPU-visible VRAM growth {} -> {} bytes failed ({}), switching to staging",
                    self.name,
                    old_size,
                    required,
                    e
                );
                let buffer = self
                    .device
                    .create_buffer(&Self::buffer_desc(required, MemoryLocation::DeviceLocal, &self.name))?;
                let mut staging = CpuResource::new(
                    self.device.clone(),
                    CpuResourceHint::None,
                    required,
                    &format!("{}_staging", self.name),
                )?;
                if let Some(prefix) = &prefix {
                    staging.buffer_data(prefix, 0)?;
                }

                self.buffer = buffer;
                self.staging = Some(staging);
                self.strategy = ResourceStrategy::Staged;
            }
        }
        Ok(())
    }

    /// `buffer_data` for plain-old-data slices
    pub fn buffer_pod<T: bytemuck::Pod>(&mut self, data: &[T], padding: u64) -> Result<()> {
        self.buffer_data(bytemuck::cast_slice(data), padding)
    }

    /// Grow the device-local buffer to the staging size
    fn sync_device_capacity(&mut self) -> Result<()> {
        let staging_size = match &self.staging {
            Some(staging) => staging.size(),
            None => return Ok(()),
        };

        if staging_size > self.buffer.size() {
            let old_size = self.buffer.size();
            self.join_if_required()?;
            self.buffer = self.device.create_buffer(&Self::buffer_desc(
                staging_size,
                MemoryLocation::DeviceLocal,
                &self.name,
            ))?;

            engine_debug!(
                "framegpu::GpuResource",
                "'{}' (staged) grew {} -> {} bytes",
                self.name,
                old_size,
                staging_size
            );
        }
        Ok(())
    }

    /// Transfer staged bytes to the device-local buffer
    ///
    /// No-op for mapped resources.
    pub fn copy(&mut self, mode: CopyMode, context: &UploadContext) -> Result<()> {
        if self.staging.is_none() {
            return Ok(());
        }
        self.sync_device_capacity()?;

        let Some(staging) = self.staging.as_ref() else {
            return Ok(());
        };
        match mode {
            CopyMode::Immediately => context.copy_buffers_immediate(staging, self),
            CopyMode::QueueUp => {
                context.copy_buffers_queue_up(staging, self, None);
                Ok(())
            }
        }
    }

    /// Queue the staged bytes for the next flush and run `on_copied` once they land
    ///
    /// Mapped resources have nothing to copy: `on_copied` runs immediately.
    pub fn copy_queue_up_with(&mut self, context: &UploadContext, on_copied: CopyCallback) -> Result<()> {
        if self.staging.is_none() {
            on_copied();
            return Ok(());
        }
        self.sync_device_capacity()?;

        if let Some(staging) = self.staging.as_ref() {
            context.copy_buffers_queue_up(staging, self, Some(on_copied));
        }
        Ok(())
    }

    /// GPU virtual address of the current allocation
    pub fn gpu_address(&self) -> u64 {
        self.buffer.gpu_address()
    }

    /// Size of the current GPU allocation
    pub fn size(&self) -> u64 {
        self.buffer.size()
    }

    pub fn strategy(&self) -> ResourceStrategy {
        self.strategy
    }

    pub fn kind(&self) -> GpuResourceKind {
        self.kind
    }

    /// Owned staging resource (staged strategy only)
    pub fn staging(&self) -> Option<&CpuResource> {
        self.staging.as_ref()
    }

    pub fn require_join_before_updating(&self) -> bool {
        self.require_join_before_updating
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
#[path = "gpu_resource_tests.rs"]
mod tests;
