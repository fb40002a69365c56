//! Logging for the frame_gpu subsystem
//!
//! A process-wide, swappable logger (see `Gfx::set_logger`) fed by the
//! `engine_*` macros. Errors carry file:line. The `engine_err!`,
//! `engine_bail!` and `engine_fatal!` helpers tie logging to the error
//! discipline: every backend failure is logged once where it is created,
//! and every hard stop is logged before it panics.

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Sink for log entries
///
/// ```no_run
/// use frame_gpu::framegpu::log::{Logger, LogEntry, LogSeverity};
///
/// struct ErrorsToStderr;
///
/// impl Logger for ErrorsToStderr {
///     fn log(&self, entry: &LogEntry) {
///         if entry.severity == LogSeverity::Error {
///             eprintln!("{}: {}", entry.source, entry.message);
///         }
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Component tag, e.g. "framegpu::UploadContext" or "framegpu::vulkan"
    pub source: String,
    pub message: String,
    /// Set by `engine_error!`, `engine_err!` and `engine_fatal!`
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

/// Log severity, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Per-frame and per-handle detail
    Trace,
    Debug,
    /// Lifecycle events and strategy decisions
    Info,
    /// Recoverable oddities (dropped callbacks, fallbacks)
    Warn,
    /// Failures; carries file:line
    Error,
}

impl LogSeverity {
    /// Fixed-width label used by `DefaultLogger`
    pub fn label(&self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }
}

/// Render an entry as `[timestamp] [SEVERITY] [source] message`, followed by
/// ` (file:line)` when the entry carries a location
///
/// The timestamp is local time, `%Y-%m-%d %H:%M:%S%.3f`.
pub fn format_entry(entry: &LogEntry) -> String {
    let datetime: DateTime<Local> = entry.timestamp.into();
    let mut line = format!(
        "[{}] [{}] [{}] {}",
        datetime.format("%Y-%m-%d %H:%M:%S%.3f"),
        entry.severity.label(),
        entry.source,
        entry.message
    );
    if let (Some(file), Some(at)) = (entry.file, entry.line) {
        line.push_str(&format!(" ({}:{})", file, at));
    }
    line
}

/// Colored console logger
///
/// Drops entries below `min_severity` (Info by default, so per-frame trace
/// output stays silent unless asked for). Colors: trace grey, debug cyan,
/// info green, warn yellow, error bold red.
#[derive(Debug, Clone, Copy)]
pub struct DefaultLogger {
    pub min_severity: LogSeverity,
}

impl DefaultLogger {
    pub fn with_min_severity(min_severity: LogSeverity) -> Self {
        Self { min_severity }
    }

    pub fn accepts(&self, severity: LogSeverity) -> bool {
        severity >= self.min_severity
    }
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self::with_min_severity(LogSeverity::Info)
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        if !self.accepts(entry.severity) {
            return;
        }

        let datetime: DateTime<Local> = entry.timestamp.into();
        let label = entry.severity.label();
        let severity = match entry.severity {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        };
        let location = match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(" ({}:{})", file, line),
            _ => String::new(),
        };

        println!(
            "[{}] [{}] [{}] {}{}",
            datetime.format("%Y-%m-%d %H:%M:%S%.3f"),
            severity,
            entry.source.bright_blue(),
            entry.message,
            location
        );
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (very verbose, typically disabled)
///
/// # Example
///
/// ```no_run
/// # use frame_gpu::engine_trace;
/// # let free = 0;
/// engine_trace!("framegpu::StagingHeap", "free list holds {} handles", free);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::framegpu::Gfx::log(
            $crate::framegpu::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message (development information)
///
/// # Example
///
/// ```no_run
/// # use frame_gpu::engine_debug;
/// # let count = 0;
/// engine_debug!("framegpu::UploadContext", "Recorded {} copies", count);
/// ```
#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::framegpu::Gfx::log(
            $crate::framegpu::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message (important events)
///
/// # Example
///
/// ```no_run
/// # use frame_gpu::engine_info;
/// engine_info!("framegpu::GfxManager", "Manager initialized");
/// ```
#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::framegpu::Gfx::log(
            $crate::framegpu::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message (potential issues)
///
/// # Example
///
/// ```no_run
/// # use frame_gpu::engine_warn;
/// # let id = 0;
/// engine_warn!("framegpu::UploadContext", "Replaced queued copy for resource {}", id);
/// ```
#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::framegpu::Gfx::log(
            $crate::framegpu::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
///
/// # Example
///
/// ```no_run
/// # use frame_gpu::engine_error;
/// # let error = "";
/// engine_error!("framegpu::GfxManager", "Flush failed: {}", error);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::framegpu::Gfx::log_detailed(
            $crate::framegpu::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an ERROR and build an `Error::BackendError` carrying the same message
///
/// # Example
///
/// ```no_run
/// # use frame_gpu::engine_err;
/// # use frame_gpu::framegpu::device::*;
/// # fn f() -> frame_gpu::framegpu::Result<()> {
/// # let device = HeadlessDevice::new();
/// # let desc = BufferDesc { size: 16, usage: BufferUsage::Storage, location: MemoryLocation::DeviceLocal, name: String::new() };
/// let buffer = device.create_buffer(&desc)
///     .map_err(|e| engine_err!("framegpu::GpuResource", "Buffer creation failed: {}", e))?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::framegpu::Gfx::log_detailed(
            $crate::framegpu::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::framegpu::Error::BackendError(message)
    }};
}

/// Log an ERROR and return `Err(Error::BackendError(..))` from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a WARN and build an `Error::BackendError` (non-fatal failures the caller may absorb)
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::framegpu::Gfx::log(
            $crate::framegpu::log::LogSeverity::Warn,
            $source,
            message.clone()
        );
        $crate::framegpu::Error::BackendError(message)
    }};
}

/// Log an ERROR with file:line, then panic with the same message
///
/// Reserved for programmer errors: heap exhaustion, double frees, leaks.
///
/// # Example
///
/// ```no_run
/// # use frame_gpu::engine_fatal;
/// # let (cursor, count, max) = (0, 0, 0);
/// engine_fatal!("framegpu::GpuHeap", "Heap exhausted: {} + {} > {}", cursor, count, max);
/// ```
#[macro_export]
macro_rules! engine_fatal {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::framegpu::Gfx::log_detailed(
            $crate::framegpu::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        panic!("{}", message)
    }};
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
