//! Frame loop entry point
//!
//! `GfxManager` owns the descriptor heaps, the upload context and the frame
//! fence, and routes critical backend errors to a registered handler.

pub mod bindable;
pub mod gfx_manager;

pub use bindable::Bindable;
pub use gfx_manager::{CriticalErrorHandler, GfxManager};
