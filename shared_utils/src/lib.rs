//! Shared Utilities for the aac-sweep tools
//!
//! Common plumbing kept apart from the sweep logic:
//! - Logging (tracing, daily log file) and external command execution
//! - FFmpeg process management (stdin streaming, stderr drained off-thread)
//! - Error categorisation and reporting
//! - Progress bar
//! - Safety checks (dangerous directory detection)
//! - External tools detection
//! - File checksums

pub mod checksum;
pub mod error_handler;
pub mod ffmpeg_process;
pub mod logging;
pub mod progress;
pub mod safety;
pub mod tools;

pub use checksum::file_checksum;
pub use error_handler::{handle_error, report_error, ErrorAction, ErrorCategory};
pub use ffmpeg_process::FfmpegProcess;
pub use logging::{init_logging, LogConfig};
pub use progress::{create_progress_bar, format_duration};
pub use safety::check_dangerous_directory;
pub use tools::{is_tool_available, missing_tools};
