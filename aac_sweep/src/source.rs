//! Fixed source waveform
//!
//! Every trial opens its own [`SourceReader`], so trials never share a read
//! position.

use crate::error::{Result, SweepError};
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// An uncompressed WAV file, validated once at startup.
#[derive(Debug, Clone)]
pub struct SourceAudio {
    path: PathBuf,
    format: SourceFormat,
    frames: u64,
}

impl SourceAudio {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = WavReader::open(path).map_err(|source| SweepError::Source {
            path: path.to_path_buf(),
            source,
        })?;
        let spec = reader.spec();

        Ok(Self {
            path: path.to_path_buf(),
            format: SourceFormat {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
            },
            frames: u64::from(reader.duration()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Length in frames.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// File stem used to name trial outputs.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string())
    }

    /// Fresh read stream positioned at the first frame.
    pub fn reader(&self) -> Result<SourceReader> {
        let inner = WavReader::open(&self.path).map_err(|source| SweepError::Source {
            path: self.path.clone(),
            source,
        })?;
        let spec = inner.spec();
        let int_scale = match spec.sample_format {
            SampleFormat::Int => Some(1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32),
            SampleFormat::Float => None,
        };

        Ok(SourceReader {
            inner,
            channels: usize::from(spec.channels),
            int_scale,
            path: self.path.clone(),
        })
    }
}

/// Sequential reader yielding interleaved `f32` samples.
pub struct SourceReader {
    inner: WavReader<BufReader<File>>,
    channels: usize,
    /// `Some(1 / 2^(bits-1))` for integer PCM, `None` for float PCM
    int_scale: Option<f32>,
    path: PathBuf,
}

impl SourceReader {
    /// Read up to `max_frames` frames into `out` (cleared first).
    ///
    /// Returns the number of frames read; 0 means the source is exhausted.
    pub fn read_chunk(&mut self, max_frames: usize, out: &mut Vec<f32>) -> Result<usize> {
        out.clear();
        let wanted = max_frames * self.channels;
        let path = &self.path;
        let read_error = |source: hound::Error| SweepError::Source {
            path: path.clone(),
            source,
        };

        match self.int_scale {
            Some(scale) => {
                for sample in self.inner.samples::<i32>().take(wanted) {
                    out.push(sample.map_err(read_error)? as f32 * scale);
                }
            }
            None => {
                for sample in self.inner.samples::<f32>().take(wanted) {
                    out.push(sample.map_err(read_error)?);
                }
            }
        }

        Ok(out.len() / self.channels.max(1))
    }
}
