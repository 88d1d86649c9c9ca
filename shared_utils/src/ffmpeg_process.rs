//! FFmpeg process management - streaming stdin without pipe deadlocks
//!
//! ## Background
//!
//! When PCM is written to ffmpeg's stdin while stderr is piped but never read,
//! ffmpeg blocks as soon as its stderr buffer (typically 64KB) fills up, and
//! the writer blocks on the full stdin pipe right after. Both sides then wait
//! on each other forever.
//!
//! stderr is therefore drained on a dedicated thread for the whole lifetime
//! of the process.
//!
//! ```ignore
//! use shared_utils::ffmpeg_process::FfmpegProcess;
//! use std::process::Command;
//!
//! let mut cmd = Command::new("ffmpeg");
//! cmd.args(["-f", "f32le", "-ar", "44100", "-ac", "2", "-i", "pipe:0", "out.m4a"]);
//!
//! let mut process = FfmpegProcess::spawn_with_stdin(&mut cmd)?;
//! process.write_input(&pcm_bytes)?;
//! let (status, stderr) = process.wait_with_output()?;
//! ```

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

// ═══════════════════════════════════════════════════════════════
// FfmpegProcess - ffmpeg wrapper with a background stderr drain
// ═══════════════════════════════════════════════════════════════

pub struct FfmpegProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_thread: Option<JoinHandle<String>>,
    command: String,
}

impl FfmpegProcess {
    /// Spawn ffmpeg with stdin piped for streaming input.
    ///
    /// stdout is discarded; stderr is collected in the background and handed
    /// back by [`FfmpegProcess::wait_with_output`].
    pub fn spawn_with_stdin(cmd: &mut Command) -> Result<Self> {
        let command = format!("{:?}", cmd);
        info!(command = %command, "Executing FFmpeg command");

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().context("Failed to spawn FFmpeg process")?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture FFmpeg stderr"))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture FFmpeg stdin"))?;

        let stderr_thread = thread::spawn(move || {
            let mut buf = String::new();
            let reader = BufReader::new(stderr);
            for line in reader.lines().map_while(std::result::Result::ok) {
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr_thread: Some(stderr_thread),
            command,
        })
    }

    /// Write one block of input bytes.
    ///
    /// A broken pipe means ffmpeg already exited (it usually rejected its
    /// arguments); the caller should go on to `wait_with_output` to learn why.
    pub fn write_input(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(bytes),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "FFmpeg stdin already closed",
            )),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Close stdin, wait for exit and return `(status, stderr)`.
    pub fn wait_with_output(mut self) -> Result<(ExitStatus, String)> {
        // EOF on stdin lets ffmpeg flush and finalise the container
        drop(self.stdin.take());

        let status = self.child.wait().context("Failed to wait for FFmpeg")?;
        let stderr = self
            .stderr_thread
            .take()
            .map(|t| t.join().unwrap_or_default())
            .unwrap_or_default();

        if status.success() {
            debug!(exit_code = status.code(), "FFmpeg process completed successfully");
        } else {
            warn!(
                exit_code = status.code(),
                error = %format_ffmpeg_error(&stderr),
                "FFmpeg process failed"
            );
        }

        Ok((status, stderr))
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        // Dropped without wait_with_output: do not leave a zombie behind.
        if self.stderr_thread.is_some() {
            drop(self.stdin.take());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Error formatting
// ═══════════════════════════════════════════════════════════════

/// Pull the most meaningful line out of ffmpeg's stderr.
///
/// 1. the last line mentioning "Error"/"error"
/// 2. otherwise the last non-empty, non-progress line
/// 3. otherwise "Unknown FFmpeg error"
pub fn format_ffmpeg_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with("size=") && !trimmed.starts_with("frame=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown FFmpeg error".to_string())
}

/// stderr fragments that point at the host (paths, permissions, disk), not at
/// the arguments ffmpeg was given.
const ENVIRONMENT_ERROR_PATTERNS: &[&str] = &[
    "Permission denied",
    "No such file or directory",
    "No space left on device",
    "Read-only file system",
    "Input/output error",
    "Too many open files",
    "Cannot allocate memory",
];

/// Whether ffmpeg failed because of its environment rather than its options.
pub fn is_environment_error(stderr: &str) -> bool {
    ENVIRONMENT_ERROR_PATTERNS
        .iter()
        .any(|pattern| stderr.contains(pattern))
}

/// Map common audio encoder failures to an actionable hint.
pub fn get_error_suggestion(stderr: &str) -> Option<String> {
    let patterns = [
        ("Unknown encoder", "this ffmpeg build lacks the requested encoder (aac_at needs macOS)"),
        ("No such file or directory", "check the input/output paths"),
        ("Permission denied", "check write permissions of the output directory"),
        ("Invalid data found", "the input file may be corrupt"),
        ("Option not found", "the encoder does not accept one of the configured options"),
        ("Error while opening encoder", "the encoder rejected this combination of settings"),
    ];

    patterns
        .iter()
        .find(|(pattern, _)| stderr.contains(pattern))
        .map(|(_, suggestion)| suggestion.to_string())
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_format_error_non_empty(content in "[a-zA-Z0-9 ]{1,100}") {
            let error = format_ffmpeg_error(&content);
            prop_assert!(!error.is_empty());
        }

        #[test]
        fn prop_format_error_prefers_error_line(
            prefix in "[a-zA-Z ]{0,50}",
            suffix in "[a-zA-Z ]{0,50}"
        ) {
            let stderr = format!("{}\nError: test error message\n{}", prefix, suffix);
            let error = format_ffmpeg_error(&stderr);
            prop_assert!(error.contains("rror"), "got: {}", error);
        }
    }
}
