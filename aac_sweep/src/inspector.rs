//! Measured bit rate of an encoded file, as reported by an external inspector.
//!
//! `afinfo` only prints human-readable text, so its bit rate is scraped from
//! the `bit rate: N bits per second` line. That is a brittle integration point:
//! a missing line is reported as [`InspectError::BitRateNotReported`], never
//! silently turned into a number. `ffprobe` is the structured alternative.

use serde::Deserialize;
use shared_utils::logging::execute_external_command;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InspectError {
    #[error("{tool} failed on {}: {reason}", .path.display())]
    ToolFailed {
        tool: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("{tool} did not report a bit rate for {}", .path.display())]
    BitRateNotReported { tool: &'static str, path: PathBuf },

    #[error("Unreadable ffprobe output for {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait BitRateInspector {
    /// Tool name, used for preflight checks and logs.
    fn tool(&self) -> &'static str;

    fn measured_bit_rate(&self, path: &Path) -> Result<u64, InspectError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum InspectorKind {
    /// macOS `afinfo`: the encoder's own bit-rate report
    Afinfo,
    /// `ffprobe -show_format -show_streams` (JSON)
    Ffprobe,
}

impl InspectorKind {
    pub fn build(&self) -> Box<dyn BitRateInspector> {
        match self {
            InspectorKind::Afinfo => Box::new(AfinfoInspector),
            InspectorKind::Ffprobe => Box::new(FfprobeInspector),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// afinfo
// ═══════════════════════════════════════════════════════════════

pub struct AfinfoInspector;

/// Bit rate from afinfo's `bit rate: 128000 bits per second` line.
pub fn parse_afinfo_bit_rate(output: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("bit rate:")?;
        let value = rest.trim().strip_suffix("bits per second")?;
        value.trim().parse().ok()
    })
}

impl BitRateInspector for AfinfoInspector {
    fn tool(&self) -> &'static str {
        "afinfo"
    }

    fn measured_bit_rate(&self, path: &Path) -> Result<u64, InspectError> {
        let path_str = path.to_string_lossy();
        let result = execute_external_command(self.tool(), &[path_str.as_ref()]).map_err(|e| {
            InspectError::ToolFailed {
                tool: self.tool(),
                path: path.to_path_buf(),
                reason: format!("{:#}", e),
            }
        })?;

        if !result.success() {
            return Err(InspectError::ToolFailed {
                tool: self.tool(),
                path: path.to_path_buf(),
                reason: result.stderr.trim().to_string(),
            });
        }

        parse_afinfo_bit_rate(&result.stdout).ok_or_else(|| InspectError::BitRateNotReported {
            tool: self.tool(),
            path: path.to_path_buf(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// ffprobe
// ═══════════════════════════════════════════════════════════════

pub struct FfprobeInspector;

#[derive(Debug, Deserialize, Default)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeSection>,
    #[serde(default)]
    format: Option<ProbeSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ProbeSection {
    #[serde(default)]
    bit_rate: Option<String>,
}

/// Audio stream bit rate, falling back to the container's overall bit rate.
pub fn parse_ffprobe_bit_rate(json: &str) -> Result<Option<u64>, serde_json::Error> {
    let parsed: ProbeOutput = serde_json::from_str(json)?;
    let parse = |section: &ProbeSection| section.bit_rate.as_deref()?.trim().parse::<u64>().ok();

    Ok(parsed
        .streams
        .iter()
        .find_map(parse)
        .or_else(|| parsed.format.as_ref().and_then(parse)))
}

impl BitRateInspector for FfprobeInspector {
    fn tool(&self) -> &'static str {
        "ffprobe"
    }

    fn measured_bit_rate(&self, path: &Path) -> Result<u64, InspectError> {
        let path_str = path.to_string_lossy();
        let args = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "a:0",
            "--",
            path_str.as_ref(),
        ];
        let result = execute_external_command(self.tool(), &args).map_err(|e| {
            InspectError::ToolFailed {
                tool: self.tool(),
                path: path.to_path_buf(),
                reason: format!("{:#}", e),
            }
        })?;

        if !result.success() {
            return Err(InspectError::ToolFailed {
                tool: self.tool(),
                path: path.to_path_buf(),
                reason: result.stderr.trim().to_string(),
            });
        }

        parse_ffprobe_bit_rate(&result.stdout)
            .map_err(|source| InspectError::Json {
                path: path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| InspectError::BitRateNotReported {
                tool: self.tool(),
                path: path.to_path_buf(),
            })
    }
}
