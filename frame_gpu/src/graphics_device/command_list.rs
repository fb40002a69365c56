/// CopyCommandList trait - records transfer work

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{DeviceBuffer, DeviceTexture};

/// Placement of one texture subresource (mip level) inside a staging buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceLayout {
    /// Mip level
    pub mip_level: u32,
    /// Byte offset of the level inside the staging buffer
    pub offset: u64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per row (width * bytes per pixel)
    pub row_pitch: u64,
    /// Bytes reserved for the level (row_pitch * height, aligned)
    pub slice_pitch: u64,
}

/// Command list for copy work
///
/// Recorded copies keep their buffers and textures alive (`Arc`) until the
/// list is dropped, which the upload context does only after the fence wait.
pub trait CopyCommandList: Send + Sync {
    /// Begin recording commands
    fn begin(&mut self) -> Result<()>;

    /// Copy `size` bytes from the start of `src` to the start of `dst`
    fn copy_buffer(
        &mut self,
        src: &Arc<dyn DeviceBuffer>,
        dst: &Arc<dyn DeviceBuffer>,
        size: u64,
    ) -> Result<()>;

    /// Copy staged pixels into every listed subresource of `dst`
    fn copy_buffer_to_texture(
        &mut self,
        src: &Arc<dyn DeviceBuffer>,
        dst: &Arc<dyn DeviceTexture>,
        layouts: &[SubresourceLayout],
    ) -> Result<()>;

    /// End recording commands
    fn end(&mut self) -> Result<()>;

    /// Downcast support for backends
    fn as_any(&self) -> &dyn Any;
}
