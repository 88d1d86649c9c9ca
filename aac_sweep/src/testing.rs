//! Test doubles: a deterministic in-process codec and a matching inspector.

use crate::codec::{AudioCodec, CodecError, EncodedWriter, ReferenceFormat};
use crate::config::Configuration;
use crate::inspector::{BitRateInspector, InspectError};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 8] = b"FAKEAAC\0";
const HEADER_LEN: usize = 16;

/// Write a short 16-bit stereo/mono sine sweep.
pub fn write_test_wav(path: &Path, sample_rate: u32, channels: u16, frames: u32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        for ch in 0..channels {
            let freq = 440.0 * (1.0 + ch as f32);
            let sample = (t * freq * std::f32::consts::TAU).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

/// Bit rate the fake encoder "achieves": the requested one when set,
/// otherwise driven by the quality hints.
pub fn fake_bit_rate(config: &Configuration) -> u64 {
    match config.bit_rate {
        Some(bit_rate) => bit_rate.total_for(config.channels),
        None => {
            let quality = config
                .vbr_quality
                .or(config.quality)
                .map(|q| q.raw_value())
                .unwrap_or(0x40);
            64_000 + u64::from(quality) * 1000
        }
    }
}

/// Quantises samples with a step derived from the effective bit rate, so
/// output depends on the bit rate but not on how it was expressed.
#[derive(Debug, Default)]
pub struct FakeCodec {
    /// Reject configurations above this bit rate when opening
    pub max_bit_rate: Option<u64>,
    /// Reject on the write after this many chunks
    pub reject_after_chunks: Option<usize>,
    pub fail_decode: bool,
}

impl AudioCodec for FakeCodec {
    fn open_writer(
        &self,
        config: &Configuration,
        destination: &Path,
    ) -> Result<Box<dyn EncodedWriter>, CodecError> {
        let bit_rate = fake_bit_rate(config);
        if self.max_bit_rate.is_some_and(|max| bit_rate > max) {
            return Err(CodecError::IncompatibleSettings {
                reason: format!("bit rate {} out of range", bit_rate),
            });
        }

        let mut file = BufWriter::new(File::create(destination)?);
        file.write_all(MAGIC)?;
        file.write_all(&bit_rate.to_le_bytes())?;

        Ok(Box::new(FakeWriter {
            file,
            levels: (bit_rate / 1000) as f32,
            chunks: 0,
            reject_after_chunks: self.reject_after_chunks,
        }))
    }

    fn decode_to_reference(
        &self,
        encoded: &Path,
        reference: &Path,
        _format: ReferenceFormat,
    ) -> Result<(), CodecError> {
        if self.fail_decode {
            return Err(CodecError::DecodeFailed {
                path: encoded.to_path_buf(),
                reason: "fake decoder refused".to_string(),
            });
        }

        let mut bytes = Vec::new();
        File::open(encoded)?.read_to_end(&mut bytes)?;
        let payload = bytes.get(HEADER_LEN..).unwrap_or_default();

        let mut out = BufWriter::new(File::create(reference)?);
        out.write_all(b"FORM")?;
        for pair in payload.chunks_exact(2) {
            // little-endian payload to big-endian reference
            out.write_all(&[pair[1], pair[0]])?;
        }
        out.flush()?;
        Ok(())
    }
}

struct FakeWriter {
    file: BufWriter<File>,
    levels: f32,
    chunks: usize,
    reject_after_chunks: Option<usize>,
}

impl EncodedWriter for FakeWriter {
    fn write(&mut self, interleaved: &[f32]) -> Result<(), CodecError> {
        if self
            .reject_after_chunks
            .is_some_and(|limit| self.chunks >= limit)
        {
            self.file.flush()?;
            return Err(CodecError::IncompatibleSettings {
                reason: "fake encoder gave up".to_string(),
            });
        }
        for sample in interleaved {
            let q = (sample * self.levels).round() as i16;
            self.file.write_all(&q.to_le_bytes())?;
        }
        self.chunks += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), CodecError> {
        self.file.flush()?;
        Ok(())
    }
}

/// Reads back the bit rate [`FakeCodec`] stores in its header.
pub struct HeaderInspector;

impl BitRateInspector for HeaderInspector {
    fn tool(&self) -> &'static str {
        "header"
    }

    fn measured_bit_rate(&self, path: &Path) -> Result<u64, InspectError> {
        let failed = |reason: String| InspectError::ToolFailed {
            tool: "header",
            path: PathBuf::from(path),
            reason,
        };

        let mut header = [0u8; HEADER_LEN];
        File::open(path)
            .and_then(|mut f| f.read_exact(&mut header))
            .map_err(|e| failed(e.to_string()))?;
        if &header[..8] != MAGIC {
            return Err(InspectError::BitRateNotReported {
                tool: "header",
                path: path.to_path_buf(),
            });
        }

        let mut value = [0u8; 8];
        value.copy_from_slice(&header[8..]);
        Ok(u64::from_le_bytes(value))
    }
}
