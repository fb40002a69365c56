/// Texture pixels ready for upload
///
/// Level 0 is the full-size image, further levels are its mip chain. Each
/// level is tightly packed (`width * bytes_per_pixel` bytes per row).

use crate::error::{Error, Result};
use crate::graphics_device::SubresourceLayout;
use crate::utils::align_up;

/// One mip level
#[derive(Debug, Clone)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A base image and its mip chain
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub bytes_per_pixel: u32,
    pub levels: Vec<MipLevel>,
}

impl PixelBuffer {
    /// Single-level image
    pub fn new(width: u32, height: u32, bytes_per_pixel: u32, pixels: Vec<u8>) -> Self {
        Self {
            bytes_per_pixel,
            levels: vec![MipLevel { width, height, pixels }],
        }
    }

    /// Append a mip level
    pub fn with_mip(mut self, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        self.levels.push(MipLevel { width, height, pixels });
        self
    }

    pub fn width(&self) -> u32 {
        self.levels.first().map(|l| l.width).unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        self.levels.first().map(|l| l.height).unwrap_or(0)
    }

    pub fn mip_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Check every level holds exactly `width * height * bytes_per_pixel` bytes
    pub fn validate(&self) -> Result<()> {
        if self.levels.is_empty() {
            return Err(Error::InvalidResource("pixel buffer has no levels".to_string()));
        }
        for (mip, level) in self.levels.iter().enumerate() {
            let expected = level.width as u64 * level.height as u64 * self.bytes_per_pixel as u64;
            if level.pixels.len() as u64 != expected {
                return Err(Error::InvalidResource(format!(
                    "mip {} holds {} bytes, expected {} ({}x{}x{})",
                    mip,
                    level.pixels.len(),
                    expected,
                    level.width,
                    level.height,
                    self.bytes_per_pixel
                )));
            }
        }
        Ok(())
    }

    /// Staging placement of every level
    ///
    /// Row pitch is `width * bytes_per_pixel`; each slice is aligned to
    /// `alignment` and levels are laid out back to back.
    pub fn layouts(&self, alignment: u64) -> Vec<SubresourceLayout> {
        let mut offset = 0;
        self.levels
            .iter()
            .enumerate()
            .map(|(mip, level)| {
                let row_pitch = level.width as u64 * self.bytes_per_pixel as u64;
                let slice_pitch = align_up(row_pitch * level.height as u64, alignment);
                let layout = SubresourceLayout {
                    mip_level: mip as u32,
                    offset,
                    width: level.width,
                    height: level.height,
                    row_pitch,
                    slice_pitch,
                };
                offset += slice_pitch;
                layout
            })
            .collect()
    }

    /// Staging bytes needed for all levels
    pub fn staging_size(&self, alignment: u64) -> u64 {
        self.layouts(alignment).iter().map(|l| l.slice_pitch).sum()
    }
}

#[cfg(test)]
#[path = "pixel_buffer_tests.rs"]
mod tests;
