/*!
# FrameGpu

GPU resource and descriptor lifecycle for a frame-pipelined renderer.

The CPU records frame N while the GPU still executes the previous frames in
flight. This crate owns everything that has to be synchronized across that
gap: descriptor heaps, buffers that are either mapped or staged, the upload
context that batches staging copies, and the per-frame fence values.

## Architecture

- **GraphicsDevice**: backend seam (heaps, buffers, textures, fences, copy lists)
- **GpuHeap / StagingHeap**: bump-allocated shader-visible heaps, free-list CPU heaps
- **CpuResource / GpuResource**: host scratch memory and shader-read buffers
- **UploadContext**: immediate and queued staging copies on the transfer queue
- **FrameSync**: one fence value per frame in flight
- **GfxManager**: frame loop entry point tying the above together

Backends implement `GraphicsDevice`; `HeadlessDevice` runs everything on the
CPU and is what the tests use.
*/

// Internal modules
mod error;
mod gfx;
pub mod log;
pub mod config;
pub mod utils;
pub mod graphics_device;
pub mod heap;
pub mod resource;
pub mod upload;
pub mod frame;
pub mod manager;

// Main framegpu namespace module
pub mod framegpu {
    // Error types
    pub use crate::error::{Error, Result};

    // Global logger access
    pub use crate::gfx::Gfx;

    // Configuration
    pub use crate::config::GfxConfig;

    // Frame loop entry point
    pub use crate::manager::{Bindable, CriticalErrorHandler, GfxManager};

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{format_entry, Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Backend seam and the headless device
    pub mod device {
        pub use crate::graphics_device::*;
        pub use crate::graphics_device::headless::*;
    }

    // Descriptor heaps
    pub mod heap {
        pub use crate::heap::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Uploads
    pub mod upload {
        pub use crate::upload::*;
    }

    // Frame pacing
    pub mod frame {
        pub use crate::frame::*;
    }
}
