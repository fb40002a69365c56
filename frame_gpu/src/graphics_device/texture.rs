/// Device texture trait and texture descriptor

use std::any::Any;

/// Texture formats supported by the upload path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Rgba16Float,
    Rgba32Float,
}

impl TextureFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm => 2,
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8Srgb => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Width of mip 0
    pub width: u32,
    /// Height of mip 0
    pub height: u32,
    /// Number of mip levels (at least 1)
    pub mip_levels: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Debug name
    pub name: String,
}

/// Texture resource trait
///
/// Always device-local. Filled by buffer-to-texture copies.
pub trait DeviceTexture: Send + Sync {
    /// Backend-unique id of this allocation
    fn id(&self) -> u64;

    /// Creation parameters
    fn desc(&self) -> &TextureDesc;

    /// Alignment each subresource must have inside a staging buffer
    fn required_alignment(&self) -> u64;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}
