//! 🍎 AudioToolbox AAC encoder, driven through ffmpeg's `aac_at` encoder
//!
//! PCM is streamed to ffmpeg's stdin as `f32le`, chunk by chunk. Only an
//! encoder refusing its options (mode, bit rate, quality) is reported as
//! `IncompatibleSettings` and recorded as a failed trial. ffmpeg dying on a
//! signal, host errors (permissions, missing paths, full disk) and any
//! failure it does not explain are `Process` errors and stop the sweep.
//!
//! Option mapping:
//!
//! | configuration          | ffmpeg                                   |
//! |------------------------|------------------------------------------|
//! | strategy               | `-aac_at_mode cbr / abr / cvbr / vbr`    |
//! | bit rate               | `-b:a N`                                 |
//! | bit rate per channel   | `-b:a N * channels`                      |
//! | quality (0..=127)      | `-aac_at_quality 0..=2` (0 = best)       |
//! | VBR quality (0..=127)  | `-q:a 0..=14` (0 = best)                 |
//!
//! Outputs are written with `+bitexact` so identical input and settings give
//! byte-identical files.

use crate::codec::{AudioCodec, CodecError, EncodedWriter, ReferenceFormat};
use crate::config::{AudioQuality, BitRateStrategy, Configuration};
use crate::source::SourceFormat;
use shared_utils::ffmpeg_process::{
    format_ffmpeg_error, get_error_suggestion, is_environment_error, FfmpegProcess,
};
use shared_utils::logging::execute_external_command;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::{debug, warn};

pub const FFMPEG: &str = "ffmpeg";
pub const ENCODER: &str = "aac_at";

/// stderr fragments of an encoder refusing its configuration.
const REJECTION_PATTERNS: &[&str] = &[
    "Error setting",
    "Error while opening encoder",
    "Error initializing output stream",
    "Option not found",
    "Invalid argument",
];

pub struct AudioToolboxCodec {
    input: SourceFormat,
    program: PathBuf,
}

impl AudioToolboxCodec {
    /// `input` is the layout of the PCM that will be written to encoders.
    pub fn new(input: SourceFormat) -> Self {
        Self {
            input,
            program: PathBuf::from(FFMPEG),
        }
    }

    /// Run `program` instead of the `ffmpeg` found on PATH.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn tool(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

fn strategy_mode(strategy: BitRateStrategy) -> &'static str {
    match strategy {
        BitRateStrategy::Constant => "cbr",
        BitRateStrategy::LongTermAverage => "abr",
        BitRateStrategy::VariableConstrained => "cvbr",
        BitRateStrategy::Variable => "vbr",
    }
}

/// AudioToolbox codec quality (0..=127) to ffmpeg's 3-step `aac_at_quality`.
fn codec_quality_level(quality: AudioQuality) -> u8 {
    match quality.raw_value() {
        0x60..=0x7F => 0,
        0x40..=0x5F => 1,
        _ => 2,
    }
}

/// VBR sound quality (0..=127) to ffmpeg's `-q:a` scale (0..=14, 0 = best).
fn vbr_quality_scale(quality: AudioQuality) -> u8 {
    let inverted = 127 - u32::from(quality.raw_value());
    ((inverted + 4) / 9).min(14) as u8
}

/// Arguments for encoding `input` PCM from stdin into `destination`.
pub fn encode_args(input: SourceFormat, config: &Configuration, destination: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-f".into(),
        "f32le".into(),
        "-ar".into(),
        input.sample_rate.to_string(),
        "-ac".into(),
        input.channels.to_string(),
        "-i".into(),
        "pipe:0".into(),
        "-c:a".into(),
        ENCODER.into(),
        "-ar".into(),
        config.sample_rate.to_string(),
        "-ac".into(),
        config.channels.to_string(),
    ];

    if let Some(strategy) = config.strategy {
        args.push("-aac_at_mode".into());
        args.push(strategy_mode(strategy).into());
    }
    if let Some(bit_rate) = config.bit_rate {
        args.push("-b:a".into());
        args.push(bit_rate.total_for(config.channels).to_string());
    }
    if let Some(quality) = config.quality {
        args.push("-aac_at_quality".into());
        args.push(codec_quality_level(quality).to_string());
    }
    if let Some(vbr_quality) = config.vbr_quality {
        args.push("-q:a".into());
        args.push(vbr_quality_scale(vbr_quality).to_string());
    }

    args.extend(
        ["-map_metadata", "-1", "-fflags", "+bitexact", "-flags:a", "+bitexact"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(destination.to_string_lossy().into_owned());
    args
}

/// Arguments for decoding `encoded` into a linear PCM AIFF `reference`.
pub fn decode_args(encoded: &Path, reference: &Path, format: ReferenceFormat) -> Vec<String> {
    let codec = match (format.bits_per_sample, format.big_endian) {
        (16, true) => "pcm_s16be",
        (16, false) => "pcm_s16le",
        (24, true) => "pcm_s24be",
        (24, false) => "pcm_s24le",
        (_, true) => "pcm_s32be",
        (_, false) => "pcm_s32le",
    };

    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        encoded.to_string_lossy().into_owned(),
        "-c:a".into(),
        codec.into(),
        "-ar".into(),
        format.sample_rate.to_string(),
        "-ac".into(),
        format.channels.to_string(),
        "-map_metadata".into(),
        "-1".into(),
        "-fflags".into(),
        "+bitexact".into(),
        "-flags:a".into(),
        "+bitexact".into(),
        "-f".into(),
        "aiff".into(),
        reference.to_string_lossy().into_owned(),
    ]
}

/// Whether `ffmpeg -encoders` output lists `encoder`.
pub fn encoder_listed(encoders_output: &str, encoder: &str) -> bool {
    encoders_output
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(encoder))
}

/// Ask the local ffmpeg whether it was built with `encoder`.
pub fn encoder_available(encoder: &str) -> Result<bool, CodecError> {
    let result = execute_external_command(FFMPEG, &["-hide_banner", "-encoders"]).map_err(|e| {
        CodecError::Process {
            tool: FFMPEG.to_string(),
            message: format!("{:#}", e),
        }
    })?;
    Ok(result.success() && encoder_listed(&result.stdout, encoder))
}

impl AudioCodec for AudioToolboxCodec {
    fn open_writer(
        &self,
        config: &Configuration,
        destination: &Path,
    ) -> Result<Box<dyn EncodedWriter>, CodecError> {
        let args = encode_args(self.input, config, destination);
        let mut cmd = Command::new(&self.program);
        cmd.args(&args);

        let process = FfmpegProcess::spawn_with_stdin(&mut cmd).map_err(|e| CodecError::Process {
            tool: self.tool(),
            message: format!("{:#}", e),
        })?;

        Ok(Box::new(FfmpegEncodedWriter {
            process: Some(process),
            tool: self.tool(),
            destination: destination.to_path_buf(),
            bytes: Vec::new(),
        }))
    }

    fn decode_to_reference(
        &self,
        encoded: &Path,
        reference: &Path,
        format: ReferenceFormat,
    ) -> Result<(), CodecError> {
        let args = decode_args(encoded, reference, format);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let tool = self.tool();
        let result = execute_external_command(&tool, &arg_refs).map_err(|e| CodecError::Process {
            tool: tool.clone(),
            message: format!("{:#}", e),
        })?;

        if !result.success() {
            return Err(CodecError::DecodeFailed {
                path: encoded.to_path_buf(),
                reason: format_ffmpeg_error(&result.stderr),
            });
        }
        debug!(reference = %reference.display(), "Decoded to reference PCM");
        Ok(())
    }
}

struct FfmpegEncodedWriter {
    process: Option<FfmpegProcess>,
    tool: String,
    destination: PathBuf,
    bytes: Vec<u8>,
}

impl FfmpegEncodedWriter {
    fn process_error(&self, message: String) -> CodecError {
        CodecError::Process {
            tool: self.tool.clone(),
            message,
        }
    }

    /// ffmpeg stopped reading its input: wait for it and classify the exit.
    fn early_exit(&mut self) -> CodecError {
        match self.process.take() {
            Some(process) => {
                debug!(command = process.command(), "Encoder stopped reading input");
                match process.wait_with_output() {
                    Ok((status, stderr)) if status.success() => self.process_error(format!(
                        "exited before the input was complete: {}",
                        format_ffmpeg_error(&stderr)
                    )),
                    Ok((status, stderr)) => classify_failure(&self.tool, status, &stderr),
                    Err(e) => self.process_error(format!("{:#}", e)),
                }
            }
            None => self.process_error("encoder already closed".to_string()),
        }
    }
}

/// Decide whether a failed encode is the encoder refusing its configuration
/// or something the sweep must not carry on from.
fn classify_failure(tool: &str, status: ExitStatus, stderr: &str) -> CodecError {
    let reason = format_ffmpeg_error(stderr);
    if let Some(suggestion) = get_error_suggestion(stderr) {
        debug!(suggestion = %suggestion, "Encoder failure hint");
    }

    // killed by a signal: a crash, never a verdict on the settings
    if status.code().is_none() {
        return CodecError::Process {
            tool: tool.to_string(),
            message: format!("terminated abnormally ({}): {}", status, reason),
        };
    }

    if is_environment_error(stderr) {
        return CodecError::Process {
            tool: tool.to_string(),
            message: reason,
        };
    }

    if REJECTION_PATTERNS.iter().any(|pattern| stderr.contains(pattern)) {
        return CodecError::IncompatibleSettings { reason };
    }

    CodecError::Process {
        tool: tool.to_string(),
        message: format!("unexpected failure ({}): {}", status, reason),
    }
}

impl EncodedWriter for FfmpegEncodedWriter {
    fn write(&mut self, interleaved: &[f32]) -> Result<(), CodecError> {
        self.bytes.clear();
        self.bytes.reserve(interleaved.len() * 4);
        for sample in interleaved {
            self.bytes.extend_from_slice(&sample.to_le_bytes());
        }

        let outcome = match self.process.as_mut() {
            Some(process) => process.write_input(&self.bytes),
            None => return Err(self.early_exit()),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Err(self.early_exit()),
            Err(e) => Err(CodecError::Io(e)),
        }
    }

    fn finish(mut self: Box<Self>) -> Result<(), CodecError> {
        let process = match self.process.take() {
            Some(process) => process,
            None => return Err(self.early_exit()),
        };

        let (status, stderr) = process
            .wait_with_output()
            .map_err(|e| self.process_error(format!("{:#}", e)))?;

        if !status.success() {
            return Err(classify_failure(&self.tool, status, &stderr));
        }

        let written = std::fs::metadata(&self.destination)?.len();
        if written == 0 {
            warn!(
                destination = %self.destination.display(),
                "Encoder exited cleanly but wrote nothing"
            );
            return Err(CodecError::IncompatibleSettings {
                reason: "encoder produced an empty file".to_string(),
            });
        }
        Ok(())
    }
}
