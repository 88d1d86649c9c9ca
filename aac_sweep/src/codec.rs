//! Native codec seam
//!
//! The encoder/decoder is an opaque collaborator. [`AudioCodec`] is the only
//! thing the trial runner knows about it; `AudioToolboxCodec` talks to the
//! real encoder through ffmpeg, tests plug in an in-process fake.

use crate::config::Configuration;
use crate::source::SourceFormat;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of decoded reference files.
pub const REFERENCE_EXTENSION: &str = "aiff";

#[derive(Error, Debug)]
pub enum CodecError {
    /// The encoder refused this configuration. Expected for some axis
    /// combinations; recorded as a failed trial.
    #[error("Incompatible settings: {reason}")]
    IncompatibleSettings { reason: String },

    #[error("{tool} process failed: {message}")]
    Process { tool: String, message: String },

    #[error("Failed to decode {} to the reference format: {reason}", .path.display())]
    DecodeFailed { path: PathBuf, reason: String },

    #[error("Codec I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub fn is_incompatible_settings(&self) -> bool {
        matches!(self, CodecError::IncompatibleSettings { .. })
    }
}

/// Uncompressed format every encoded file is decoded back into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub big_endian: bool,
}

impl ReferenceFormat {
    /// 16-bit big-endian linear PCM at the source's rate and channel count.
    pub fn linear_pcm_16_be(source: SourceFormat) -> Self {
        Self {
            sample_rate: source.sample_rate,
            channels: source.channels,
            bits_per_sample: 16,
            big_endian: true,
        }
    }
}

pub trait AudioCodec {
    /// Open an encoder writing `destination` with `config`.
    ///
    /// A configuration rejected up front comes back as
    /// [`CodecError::IncompatibleSettings`].
    fn open_writer(
        &self,
        config: &Configuration,
        destination: &Path,
    ) -> Result<Box<dyn EncodedWriter>, CodecError>;

    /// Decode `encoded` into an uncompressed `reference` file.
    fn decode_to_reference(
        &self,
        encoded: &Path,
        reference: &Path,
        format: ReferenceFormat,
    ) -> Result<(), CodecError>;
}

/// Sink for interleaved `f32` PCM.
///
/// Encoders that only learn about a bad configuration while running (a
/// subprocess exiting early, for instance) report it from `write` or
/// `finish` as [`CodecError::IncompatibleSettings`].
pub trait EncodedWriter {
    fn write(&mut self, interleaved: &[f32]) -> Result<(), CodecError>;

    /// Flush and close the output file.
    fn finish(self: Box<Self>) -> Result<(), CodecError>;
}
