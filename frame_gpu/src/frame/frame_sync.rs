/// Frame pacing - one fence value per frame in flight
///
/// The CPU records frame N while the GPU may still execute frames
/// N-1 .. N-frames_in_flight+1. Each slot remembers the fence value signaled
/// at the end of its last use; `wait_for_slot` blocks until the GPU has
/// passed that value, after which the slot's per-frame state may be reused.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{Fence, GraphicsDevice, QueueKind};
use crate::{engine_error, engine_trace};

/// Fence values of the frames in flight
pub struct FrameSync {
    device: Arc<dyn GraphicsDevice>,
    fence: Arc<dyn Fence>,
    /// Last value signaled on `fence`
    fence_value: u64,
    /// Value signaled at the end of each slot's previous use (0 = never used)
    slot_values: Vec<u64>,
    frame_index: u32,
}

impl FrameSync {
    /// Create the frame fence for `frames_in_flight` slots
    pub fn new(device: Arc<dyn GraphicsDevice>, frames_in_flight: u32) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }

        let fence = device.create_fence(0).map_err(|e| {
            engine_error!("framegpu::FrameSync", "Failed to create frame fence: {}", e);
            e
        })?;

        Ok(Self {
            device,
            fence,
            fence_value: 0,
            slot_values: vec![0; frames_in_flight as usize],
            frame_index: 0,
        })
    }

    /// Block until the GPU is done with the current slot's previous frame
    ///
    /// Returns immediately when the fence already passed the stored value.
    pub fn wait_for_slot(&self) -> Result<()> {
        let target = self.slot_values[self.frame_index as usize];
        if self.fence.completed_value() >= target {
            return Ok(());
        }

        engine_trace!(
            "framegpu::FrameSync",
            "Slot {} waits for fence value {} (completed {})",
            self.frame_index,
            target,
            self.fence.completed_value()
        );
        self.fence.wait(target).map_err(|e| {
            engine_error!(
                "framegpu::FrameSync",
                "Frame fence wait for value {} failed: {}",
                target,
                e
            );
            e
        })
    }

    /// Signal the end of the current frame and move to the next slot
    pub fn end_frame(&mut self) -> Result<()> {
        let value = self.fence_value + 1;
        self.device.signal(QueueKind::Graphics, self.fence.as_ref(), value)?;

        self.fence_value = value;
        self.slot_values[self.frame_index as usize] = value;
        self.frame_index = (self.frame_index + 1) % self.frames_in_flight();
        Ok(())
    }

    /// Slot the CPU is currently recording
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    pub fn frames_in_flight(&self) -> u32 {
        self.slot_values.len() as u32
    }

    /// Last value signaled on the frame fence
    pub fn fence_value(&self) -> u64 {
        self.fence_value
    }

    /// Value the current slot waits for
    pub fn slot_value(&self) -> u64 {
        self.slot_values[self.frame_index as usize]
    }

    pub fn fence(&self) -> &Arc<dyn Fence> {
        &self.fence
    }
}

#[cfg(test)]
#[path = "frame_sync_tests.rs"]
mod tests;
