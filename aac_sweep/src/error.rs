use shared_utils::error_handler::ErrorCategory;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;
use crate::inspector::InspectError;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Cannot read source waveform {}: {source}", .path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Inspect(#[from] InspectError),

    #[error("External tool not found: {tool} ({hint})")]
    ToolNotFound { tool: String, hint: String },

    #[error("Encoder '{encoder}' is not available in this ffmpeg build")]
    EncoderUnavailable { encoder: String },

    #[error("Refusing to recreate output directory: {0}")]
    UnsafeOutputDirectory(String),

    #[error("Filesystem error on {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to export results: {0}")]
    Export(#[from] serde_json::Error),

    /// An error the handler decided to stop on, with its context attached
    #[error("{0:#}")]
    Aborted(anyhow::Error),
}

impl SweepError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SweepError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Only a rejected configuration is recoverable; it becomes a failed
    /// trial record. Everything else stops the sweep.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SweepError::Codec(e) if e.is_incompatible_settings() => ErrorCategory::Recoverable,
            _ => ErrorCategory::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
