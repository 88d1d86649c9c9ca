//! Trial Runner: encode → decode → measure → clean up, for one configuration.

use crate::codec::{AudioCodec, CodecError, ReferenceFormat, REFERENCE_EXTENSION};
use crate::config::{field, Configuration};
use crate::error::{Result, SweepError};
use crate::inspector::BitRateInspector;
use crate::source::SourceAudio;
use shared_utils::checksum::file_checksum;
use shared_utils::error_handler::{handle_error, ErrorAction, ErrorCategory};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Frames per chunk streamed into the encoder.
pub const DEFAULT_CHUNK_FRAMES: usize = 8192;

/// Measured bit rate recorded for a rejected configuration.
pub const FAILED_BIT_RATE: i64 = -1;

/// Outcome of one trial. Never modified once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialResult {
    pub configuration: Configuration,
    /// `FAILED_BIT_RATE` when the encoder rejected the configuration
    pub measured_bit_rate: i64,
    pub conversion_time: Duration,
    /// Checksum of the encoded file, empty on failure
    pub checksum: String,
    /// Checksum of the decoded reference, empty on failure
    pub reference_checksum: String,
    /// Container extension
    pub file_format: String,
}

impl TrialResult {
    pub fn failed(configuration: Configuration, file_format: &str) -> Self {
        Self {
            configuration,
            measured_bit_rate: FAILED_BIT_RATE,
            conversion_time: Duration::ZERO,
            checksum: String::new(),
            reference_checksum: String::new(),
            file_format: file_format.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.measured_bit_rate == FAILED_BIT_RATE
    }

    /// Flat record: configuration fields that were set plus measurements.
    pub fn to_record(&self) -> BTreeMap<String, String> {
        let mut record = self.configuration.fields();
        record.insert(
            field::MEASURED_BIT_RATE.to_string(),
            self.measured_bit_rate.to_string(),
        );
        record.insert(
            field::CONVERSION_TIME_NS.to_string(),
            self.conversion_time.as_nanos().to_string(),
        );
        record.insert(field::CHECKSUM.to_string(), self.checksum.clone());
        record.insert(
            field::REFERENCE_CHECKSUM.to_string(),
            self.reference_checksum.clone(),
        );
        record.insert(field::FILE_FORMAT.to_string(), self.file_format.clone());
        record
    }
}

/// A transient file removed when the guard goes away.
///
/// `remove()` is the normal path and reports failures; `Drop` covers early
/// returns and can only log.
struct ScratchFile {
    path: PathBuf,
    keep: bool,
    armed: bool,
}

impl ScratchFile {
    fn new(path: PathBuf, keep: bool) -> Self {
        Self {
            path,
            keep,
            armed: true,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn remove(mut self) -> Result<()> {
        self.armed = false;
        if self.keep || !self.path.exists() {
            return Ok(());
        }
        std::fs::remove_file(&self.path).map_err(|e| SweepError::filesystem(&self.path, e))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed || self.keep || !self.path.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file");
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrialOptions {
    pub chunk_frames: usize,
    /// Leave encoded files on disk (decoded references are always removed)
    pub keep_encoded: bool,
}

impl Default for TrialOptions {
    fn default() -> Self {
        Self {
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            keep_encoded: false,
        }
    }
}

pub struct TrialRunner<'a> {
    source: &'a SourceAudio,
    codec: &'a dyn AudioCodec,
    inspector: &'a dyn BitRateInspector,
    options: TrialOptions,
}

impl<'a> TrialRunner<'a> {
    pub fn new(
        source: &'a SourceAudio,
        codec: &'a dyn AudioCodec,
        inspector: &'a dyn BitRateInspector,
        options: TrialOptions,
    ) -> Self {
        Self {
            source,
            codec,
            inspector,
            options,
        }
    }

    /// Run one trial writing the encoded file to `output`.
    ///
    /// A configuration rejected by the encoder yields a failed result, not
    /// an error. Decode, inspection and filesystem failures are errors.
    pub fn run(&self, config: &Configuration, output: &Path) -> Result<TrialResult> {
        let file_format = output
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(output = %output.display(), settings = %config, "Encode");

        let encoded = ScratchFile::new(output.to_path_buf(), self.options.keep_encoded);
        let reference = ScratchFile::new(output.with_extension(REFERENCE_EXTENSION), false);

        let conversion_time = match self.encode(config, encoded.path()) {
            Ok(elapsed) => elapsed,
            Err(SweepError::Codec(e @ CodecError::IncompatibleSettings { .. })) => {
                let context = format!("Encoding {}", config);
                match handle_error(ErrorCategory::Recoverable, &context, e, None) {
                    ErrorAction::Continue => {
                        info!("❌ Incompatible settings");
                        encoded.remove()?;
                        return Ok(TrialResult::failed(config.clone(), &file_format));
                    }
                    ErrorAction::Abort(e) => return Err(SweepError::Aborted(e)),
                }
            }
            Err(e) => return Err(e),
        };

        let format = ReferenceFormat::linear_pcm_16_be(self.source.format());
        debug!(reference = %reference.path().display(), "Decode");
        self.codec
            .decode_to_reference(encoded.path(), reference.path(), format)
            .map_err(|e| match e {
                // decoding a file we just produced must work
                CodecError::IncompatibleSettings { reason } => CodecError::DecodeFailed {
                    path: encoded.path().to_path_buf(),
                    reason,
                },
                other => other,
            })?;

        let measured = self.inspector.measured_bit_rate(encoded.path())?;
        let checksum =
            file_checksum(encoded.path()).map_err(|e| SweepError::filesystem(encoded.path(), e))?;
        let reference_checksum = file_checksum(reference.path())
            .map_err(|e| SweepError::filesystem(reference.path(), e))?;

        reference.remove()?;
        encoded.remove()?;

        let result = TrialResult {
            configuration: config.clone(),
            measured_bit_rate: i64::try_from(measured).unwrap_or(i64::MAX),
            conversion_time,
            checksum,
            reference_checksum,
            file_format,
        };
        info!(
            measured_bit_rate = result.measured_bit_rate,
            conversion_ms = conversion_time.as_millis() as u64,
            "✅ Trial complete"
        );
        Ok(result)
    }

    /// Stream the whole source into a new encoder; returns the encode time.
    fn encode(&self, config: &Configuration, destination: &Path) -> Result<Duration> {
        let mut reader = self.source.reader()?;
        let mut writer = self.codec.open_writer(config, destination)?;

        let start = Instant::now();
        let mut buf = Vec::with_capacity(self.options.chunk_frames * usize::from(config.channels));
        let mut frames_written: u64 = 0;
        loop {
            let frames = reader.read_chunk(self.options.chunk_frames, &mut buf)?;
            if frames == 0 {
                break;
            }
            writer.write(&buf)?;
            frames_written += frames as u64;
        }
        writer.finish()?;
        let elapsed = start.elapsed();

        debug!(frames = frames_written, "Frames written");
        Ok(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioQuality, BitRate, BitRateStrategy};
    use crate::testing::{write_test_wav, FakeCodec, HeaderInspector};

    fn fixture() -> (tempfile::TempDir, SourceAudio) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Unity.wav");
        write_test_wav(&path, 44100, 2, 20_000);
        let source = SourceAudio::open(&path).unwrap();
        (dir, source)
    }

    fn constant_128k_high() -> Configuration {
        Configuration::aac(44100, 2)
            .with_strategy(BitRateStrategy::Constant)
            .with_bit_rate(BitRate::Total(128000))
            .with_quality(AudioQuality::High)
    }

    fn leftover_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "Unity.wav")
            .collect()
    }

    #[test]
    fn test_same_configuration_twice_is_deterministic() {
        let (dir, source) = fixture();
        let codec = FakeCodec::default();
        let runner = TrialRunner::new(&source, &codec, &HeaderInspector, TrialOptions::default());
        let config = constant_128k_high();

        let first = runner.run(&config, &dir.path().join("Unity_a.m4a")).unwrap();
        let second = runner.run(&config, &dir.path().join("Unity_b.m4a")).unwrap();

        assert!(!first.checksum.is_empty());
        assert_eq!(first.checksum, second.checksum);
        assert_eq!(first.reference_checksum, second.reference_checksum);
        assert_eq!(first.measured_bit_rate, 128000);
        assert_eq!(first.file_format, "m4a");
    }

    #[test]
    fn test_rejected_configuration_is_recorded_not_raised() {
        let (dir, source) = fixture();
        let codec = FakeCodec {
            max_bit_rate: Some(256000),
            ..FakeCodec::default()
        };
        let runner = TrialRunner::new(&source, &codec, &HeaderInspector, TrialOptions::default());
        let config = Configuration::aac(44100, 2)
            .with_strategy(BitRateStrategy::Constant)
            .with_bit_rate(BitRate::Total(320000));

        let result = runner.run(&config, &dir.path().join("Unity_Constant_BR320000.caf")).unwrap();

        assert!(result.is_failure());
        assert_eq!(result.measured_bit_rate, -1);
        assert!(result.checksum.is_empty());
        assert!(result.reference_checksum.is_empty());
        assert_eq!(result.file_format, "caf");
        assert_eq!(result.configuration, config);
    }

    #[test]
    fn test_rejection_mid_stream_cleans_partial_output() {
        let (dir, source) = fixture();
        let codec = FakeCodec {
            reject_after_chunks: Some(1),
            ..FakeCodec::default()
        };
        let options = TrialOptions {
            chunk_frames: 4096,
            keep_encoded: false,
        };
        let runner = TrialRunner::new(&source, &codec, &HeaderInspector, options);

        let result = runner.run(&constant_128k_high(), &dir.path().join("Unity.caf")).unwrap();

        assert!(result.is_failure());
        assert!(leftover_files(dir.path()).is_empty());
    }

    #[test]
    fn test_outputs_removed_after_measurement() {
        let (dir, source) = fixture();
        let codec = FakeCodec::default();
        let runner = TrialRunner::new(&source, &codec, &HeaderInspector, TrialOptions::default());

        runner.run(&constant_128k_high(), &dir.path().join("Unity.caf")).unwrap();

        assert!(leftover_files(dir.path()).is_empty());
    }

    #[test]
    fn test_keep_encoded_retains_only_encoded_file() {
        let (dir, source) = fixture();
        let codec = FakeCodec::default();
        let options = TrialOptions {
            keep_encoded: true,
            ..TrialOptions::default()
        };
        let runner = TrialRunner::new(&source, &codec, &HeaderInspector, options);

        runner.run(&constant_128k_high(), &dir.path().join("Unity.caf")).unwrap();

        assert_eq!(leftover_files(dir.path()), vec!["Unity.caf".to_string()]);
    }

    #[test]
    fn test_decode_failure_is_fatal_and_still_cleans_up() {
        let (dir, source) = fixture();
        let codec = FakeCodec {
            fail_decode: true,
            ..FakeCodec::default()
        };
        let runner = TrialRunner::new(&source, &codec, &HeaderInspector, TrialOptions::default());

        let err = runner
            .run(&constant_128k_high(), &dir.path().join("Unity.caf"))
            .unwrap_err();

        assert!(matches!(err, SweepError::Codec(CodecError::DecodeFailed { .. })));
        assert_eq!(err.category(), ErrorCategory::Fatal);
        assert!(leftover_files(dir.path()).is_empty());
    }

    #[test]
    fn test_record_fields() {
        let (dir, source) = fixture();
        let codec = FakeCodec::default();
        let runner = TrialRunner::new(&source, &codec, &HeaderInspector, TrialOptions::default());
        let config = Configuration::aac(44100, 2)
            .with_strategy(BitRateStrategy::LongTermAverage)
            .with_bit_rate(BitRate::PerChannel(64000))
            .with_vbr_quality(AudioQuality::Low);

        let record = runner.run(&config, &dir.path().join("Unity.m4a")).unwrap().to_record();

        assert_eq!(record[field::STRATEGY], "LongTermAverage");
        assert_eq!(record[field::BIT_RATE_PER_CHANNEL], "64000");
        assert_eq!(record[field::VBR_QUALITY], "32");
        assert_eq!(record[field::MEASURED_BIT_RATE], "128000");
        assert_eq!(record[field::FILE_FORMAT], "m4a");
        assert!(!record.contains_key(field::BIT_RATE));
        assert!(!record.contains_key(field::QUALITY));
    }
}
