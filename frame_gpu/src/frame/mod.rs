//! Frame pacing across frames in flight

pub mod frame_sync;

pub use frame_sync::FrameSync;
