/// Graphics device module - the backend seam and its headless implementation

pub mod graphics_device;
pub mod buffer;
pub mod texture;
pub mod descriptor;
pub mod fence;
pub mod command_list;
pub mod headless;

pub use graphics_device::*;
pub use buffer::*;
pub use texture::*;
pub use descriptor::*;
pub use fence::*;
pub use command_list::*;
