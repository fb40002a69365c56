//! Configuration for the frame_gpu subsystem

use crate::error::{Error, Result};

/// Configuration of a `GfxManager`
///
/// Heap sizes are in descriptors. GPU heaps are created once per frame in
/// flight; staging heaps exist once per manager.
#[derive(Debug, Clone)]
pub struct GfxConfig {
    /// Number of frames the CPU may record ahead of the GPU
    pub frames_in_flight: u32,
    /// Shader-visible buffer descriptors per frame (bump heap)
    pub buffer_heap_size: u32,
    /// Shader-visible sampler descriptors per frame (bump heap)
    pub sampler_heap_size: u32,
    /// CPU-only buffer descriptors (free-list heap)
    pub staging_buffer_heap_size: u32,
    /// CPU-only sampler descriptors (free-list heap)
    pub staging_sampler_heap_size: u32,
    /// Render target view slots (free-list heap)
    pub render_target_heap_size: u32,
    /// Depth stencil view slots (free-list heap)
    pub depth_stencil_heap_size: u32,
    /// Try CPU-visible VRAM for `CpuVisibleIfPossible` resources
    pub prefer_cpu_visible_vram: bool,
    /// Minimum total CPU-visible VRAM budget (bytes) for the mapped strategy
    pub min_cpu_visible_vram: u64,
    /// Join the device before flushing texture uploads that replace bound textures
    pub join_before_texture_flush: bool,
}

impl Default for GfxConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            buffer_heap_size: 1024,
            sampler_heap_size: 128,
            staging_buffer_heap_size: 100,
            staging_sampler_heap_size: 100,
            render_target_heap_size: 10,
            depth_stencil_heap_size: 10,
            prefer_cpu_visible_vram: true,
            min_cpu_visible_vram: 1_000_000,
            join_before_texture_flush: true,
        }
    }
}

impl GfxConfig {
    /// Reject configurations no manager can run with
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        let heaps = [
            ("buffer_heap_size", self.buffer_heap_size),
            ("sampler_heap_size", self.sampler_heap_size),
            ("staging_buffer_heap_size", self.staging_buffer_heap_size),
            ("staging_sampler_heap_size", self.staging_sampler_heap_size),
            ("render_target_heap_size", self.render_target_heap_size),
            ("depth_stencil_heap_size", self.depth_stencil_heap_size),
        ];

        for (name, size) in heaps {
            if size == 0 {
                return Err(Error::InitializationFailed(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
