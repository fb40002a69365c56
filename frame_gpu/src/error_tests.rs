//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Debug, Clone, std::error::Error).

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit returned ERROR_DEVICE_LOST".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkQueueSubmit"));
}

#[test]
fn test_out_of_memory_display() {
    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of GPU memory");
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("staging buffer is not mapped".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid resource"));
    assert!(display.contains("not mapped"));
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("no transfer queue".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Initialization failed"));
    assert!(display.contains("no transfer queue"));
}

#[test]
fn test_device_lost_display() {
    let err = Error::DeviceLost("fence wait failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Device lost"));
    assert!(display.contains("fence wait failed"));
}

#[test]
fn test_rendering_halted_display() {
    let display = format!("{}", Error::RenderingHalted);
    assert!(display.contains("halted"));
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[test]
fn test_is_critical() {
    assert!(Error::BackendError("x".to_string()).is_critical());
    assert!(Error::OutOfMemory.is_critical());
    assert!(Error::DeviceLost("x".to_string()).is_critical());

    assert!(!Error::InvalidResource("x".to_string()).is_critical());
    assert!(!Error::InitializationFailed("x".to_string()).is_critical());
    assert!(!Error::RenderingHalted.is_critical());
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug() {
    assert!(format!("{:?}", Error::BackendError("test".to_string())).contains("BackendError"));
    assert!(format!("{:?}", Error::OutOfMemory).contains("OutOfMemory"));
    assert!(format!("{:?}", Error::DeviceLost("gone".to_string())).contains("DeviceLost"));
    assert!(format!("{:?}", Error::RenderingHalted).contains("RenderingHalted"));
}

#[test]
fn test_error_clone() {
    let err1 = Error::DeviceLost("removed".to_string());
    let err2 = err1.clone();
    assert_eq!(format!("{}", err1), format!("{}", err2));
}

// ============================================================================
// RESULT TYPE TESTS
// ============================================================================

#[test]
fn test_error_propagation_with_question_mark() {
    fn inner() -> Result<u64> {
        Err(Error::OutOfMemory)
    }

    fn outer() -> Result<u64> {
        let value = inner()?;
        Ok(value + 1)
    }

    let result = outer();
    assert!(matches!(result, Err(Error::OutOfMemory)));
}
