//! Unit tests for log.rs

use crate::log::{format_entry, DefaultLogger, Logger, LogEntry, LogSeverity};
use std::time::{Duration, SystemTime};

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_123),
        source: "framegpu::StagingHeap".to_string(),
        message: "handle 3 released".to_string(),
        file,
        line,
    }
}

// ============================================================================
// SEVERITY
// ============================================================================

#[test]
fn test_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_labels_are_fixed_width() {
    let severities = [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ];
    for severity in severities {
        assert_eq!(severity.label().len(), 5, "{:?}", severity);
    }
    assert_eq!(LogSeverity::Warn.label().trim_end(), "WARN");
}

// ============================================================================
// FORMATTING
// ============================================================================

#[test]
fn test_format_without_location() {
    let line = format_entry(&entry(LogSeverity::Info, None, None));

    assert!(line.ends_with("[INFO ] [framegpu::StagingHeap] handle 3 released"), "{}", line);
    assert!(!line.contains('('));
}

#[test]
fn test_format_with_location() {
    let line = format_entry(&entry(LogSeverity::Error, Some("src/heap/staging_heap.rs"), Some(88)));

    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("handle 3 released (src/heap/staging_heap.rs:88)"), "{}", line);
}

#[test]
fn test_format_needs_both_file_and_line() {
    let line = format_entry(&entry(LogSeverity::Error, Some("a.rs"), None));
    assert!(!line.contains("a.rs"));
}

#[test]
fn test_timestamp_has_millisecond_precision() {
    let line = format_entry(&entry(LogSeverity::Debug, None, None));

    // [YYYY-MM-DD HH:MM:SS.mmm]
    let stamp = &line[1..line.find(']').unwrap()];
    assert_eq!(stamp.len(), 23, "{}", stamp);
    assert_eq!(&stamp[4..5], "-");
    assert_eq!(&stamp[10..11], " ");
    assert!(stamp.ends_with(".123"), "{}", stamp);
}

// ============================================================================
// DEFAULT LOGGER
// ============================================================================

#[test]
fn test_default_logger_filters_below_info() {
    let logger = DefaultLogger::default();

    assert!(!logger.accepts(LogSeverity::Trace));
    assert!(!logger.accepts(LogSeverity::Debug));
    assert!(logger.accepts(LogSeverity::Info));
    assert!(logger.accepts(LogSeverity::Error));
}

#[test]
fn test_verbose_logger_accepts_trace() {
    assert!(DefaultLogger::with_min_severity(LogSeverity::Trace).accepts(LogSeverity::Trace));
}

#[test]
fn test_default_logger_prints_every_severity() {
    let logger = DefaultLogger::with_min_severity(LogSeverity::Trace);
    for severity in [LogSeverity::Trace, LogSeverity::Info, LogSeverity::Error] {
        logger.log(&entry(severity, Some("file.rs"), Some(1)));
        logger.log(&entry(severity, None, None));
    }
}

#[test]
fn test_logger_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
    assert_send_sync::<Box<dyn Logger>>();
}

// ============================================================================
// ERROR HELPER MACRO TESTS
// ============================================================================

use crate::error::Error;
use crate::gfx::Gfx;
use serial_test::serial;
use std::sync::{Arc, Mutex};

struct CapturingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

fn capture() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Gfx::set_logger(CapturingLogger { entries: entries.clone() });
    entries
}

impl Logger for CapturingLogger {
    fn log(&self, entry: &LogEntry) {
        // Other unit tests log concurrently; keep only this module's entries
        if entry.source == "framegpu::test" {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }
}

#[test]
#[serial]
fn test_engine_err_logs_and_builds_backend_error() {
    let entries = capture();

    let err = crate::engine_err!("framegpu::test", "submit failed: {}", 7);

    assert!(matches!(&err, Error::BackendError(msg) if msg == "submit failed: 7"));
    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].source, "framegpu::test");
    assert!(captured[0].file.is_some());
    assert!(captured[0].line.is_some());
    drop(captured);

    Gfx::reset_logger();
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    let entries = capture();

    fn failing(flag: bool) -> crate::error::Result<u32> {
        if flag {
            crate::engine_bail!("framegpu::test", "bailed");
        }
        Ok(1)
    }

    assert_eq!(failing(false).unwrap(), 1);
    assert!(matches!(failing(true), Err(Error::BackendError(_))));
    assert_eq!(entries.lock().unwrap().len(), 1);

    Gfx::reset_logger();
}

#[test]
#[serial]
fn test_engine_warn_err_logs_at_warn() {
    let entries = capture();

    let err = crate::engine_warn_err!("framegpu::test", "recoverable");

    assert!(matches!(err, Error::BackendError(_)));
    let captured = entries.lock().unwrap();
    assert_eq!(captured[0].severity, LogSeverity::Warn);
    assert!(captured[0].file.is_none());
    drop(captured);

    Gfx::reset_logger();
}

#[test]
#[serial]
#[should_panic(expected = "heap exhausted")]
fn test_engine_fatal_panics_with_message() {
    crate::engine_fatal!("framegpu::test", "heap exhausted: {} slots", 4);
}

#[test]
#[serial]
fn test_engine_fatal_logs_before_panicking() {
    let entries = capture();

    let result = std::panic::catch_unwind(|| {
        crate::engine_fatal!("framegpu::test", "double free of slot {}", 3);
    });

    assert!(result.is_err());
    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "double free of slot 3");
    drop(captured);

    Gfx::reset_logger();
}
