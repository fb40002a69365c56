use crate::error::Result;
use crate::graphics_device::DescriptorHandle;

/// Something bound through the bindless buffer table (materials, dynamic textures)
///
/// `prepare` runs on a worker thread and returns the staging descriptor to
/// copy into the frame's GPU heap. `set_bindless_index` then receives the
/// slot the shader reads it from; the index is valid for the current frame only.
pub trait Bindable: Send {
    fn prepare(&mut self, frame_index: u32) -> Result<DescriptorHandle>;

    fn set_bindless_index(&mut self, index: u32);
}
