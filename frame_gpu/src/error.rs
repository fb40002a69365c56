//! Error types for the frame_gpu subsystem
//!
//! Recoverable-at-the-caller failures (backend calls, allocations, device loss)
//! travel as `Error` values. Programmer errors (heap exhaustion, double frees,
//! leaked descriptors) never become an `Error`: they go through `engine_fatal!`.

use std::fmt;

/// Result type for frame_gpu operations
pub type Result<T> = std::result::Result<T, Error>;

/// frame_gpu errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, headless, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (buffer, texture, descriptor, etc.)
    InvalidResource(String),

    /// Initialization failed (device, heaps, upload context)
    InitializationFailed(String),

    /// A fence wait or submission reported the device as lost
    DeviceLost(String),

    /// Frame production was stopped by a previous critical error
    RenderingHalted,
}

impl Error {
    /// Whether this error leaves the GPU state torn and must stop frame production
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::BackendError(_) | Error::OutOfMemory | Error::DeviceLost(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::RenderingHalted => write!(f, "Rendering halted after a critical graphics error"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
