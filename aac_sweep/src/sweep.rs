//! Sweep orchestration: preflight, output directory, trial loop, analysis.

use crate::aggregate::{analyze, Finding};
use crate::audiotoolbox::{self, AudioToolboxCodec, FFMPEG};
use crate::codec::AudioCodec;
use crate::config::Container;
use crate::enumerator::{enumerate, PlannedTrial};
use crate::error::{Result, SweepError};
use crate::inspector::{BitRateInspector, InspectorKind};
use crate::report::RunSummary;
use crate::source::SourceAudio;
use crate::trial::{TrialOptions, TrialResult, TrialRunner, DEFAULT_CHUNK_FRAMES};
use shared_utils::progress::create_progress_bar;
use shared_utils::safety::check_dangerous_directory;
use shared_utils::tools::{install_hint, missing_tools};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_INPUT: &str = "resources/Unity.wav";
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub input: PathBuf,
    /// Deleted and recreated at the start of every run
    pub output_dir: PathBuf,
    pub keep_encoded: bool,
    pub inspector: InspectorKind,
    pub containers: Vec<Container>,
    pub chunk_frames: usize,
    pub results_json: Option<PathBuf>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            keep_encoded: false,
            inspector: InspectorKind::Afinfo,
            containers: Container::ALL.to_vec(),
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            results_json: None,
        }
    }
}

impl SweepConfig {
    fn trial_options(&self) -> TrialOptions {
        TrialOptions {
            chunk_frames: self.chunk_frames.max(1),
            keep_encoded: self.keep_encoded,
        }
    }
}

#[derive(Debug)]
pub struct SweepOutcome {
    pub results: Vec<TrialResult>,
    pub findings: Vec<Finding>,
    pub summary: RunSummary,
}

/// External programs a run needs for the chosen inspector.
pub fn required_tools(inspector: InspectorKind) -> Vec<&'static str> {
    let mut tools = vec![FFMPEG];
    let probe = inspector.build().tool();
    if !tools.contains(&probe) {
        tools.push(probe);
    }
    tools
}

/// Fail fast before touching the output directory.
pub fn preflight(inspector: InspectorKind) -> Result<()> {
    let tools = required_tools(inspector);
    if let Some(tool) = missing_tools(&tools).first() {
        return Err(SweepError::ToolNotFound {
            tool: tool.to_string(),
            hint: install_hint(tool).to_string(),
        });
    }

    if !audiotoolbox::encoder_available(audiotoolbox::ENCODER)? {
        return Err(SweepError::EncoderUnavailable {
            encoder: audiotoolbox::ENCODER.to_string(),
        });
    }

    debug!(tools = ?tools, encoder = audiotoolbox::ENCODER, "Preflight passed");
    Ok(())
}

/// Delete `dir` if present and recreate it empty.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    check_dangerous_directory(dir).map_err(SweepError::UnsafeOutputDirectory)?;

    match fs::remove_dir_all(dir) {
        Ok(()) => debug!(dir = %dir.display(), "Removed previous outputs"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(SweepError::filesystem(dir, e)),
    }
    fs::create_dir_all(dir).map_err(|e| SweepError::filesystem(dir, e))
}

/// Run every planned trial in order. The first fatal error stops the loop.
pub fn run_trials(
    runner: &TrialRunner<'_>,
    plan: &[PlannedTrial],
    output_dir: &Path,
) -> Result<Vec<TrialResult>> {
    let pb = create_progress_bar(plan.len() as u64, "Trials");
    let mut results = Vec::with_capacity(plan.len());

    for (index, trial) in plan.iter().enumerate() {
        pb.set_message(trial.file_name.clone());
        debug!(trial = index + 1, total = plan.len(), "Starting trial");

        let result = match runner.run(&trial.configuration, &output_dir.join(&trial.file_name)) {
            Ok(result) => result,
            Err(e) => {
                pb.abandon();
                return Err(e);
            }
        };
        results.push(result);
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(results)
}

/// Flat records, one object per trial, in run order.
pub fn write_results_json(path: &Path, results: &[TrialResult]) -> Result<()> {
    let records: Vec<_> = results.iter().map(TrialResult::to_record).collect();

    let file = File::create(path).map_err(|e| SweepError::filesystem(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer
        .flush()
        .map_err(|e| SweepError::filesystem(path, e))?;

    info!(path = %path.display(), records = records.len(), "📄 Results exported");
    Ok(())
}

/// Sweep with an already-opened source and explicit collaborators.
pub fn execute(
    config: &SweepConfig,
    source: &SourceAudio,
    codec: &dyn AudioCodec,
    inspector: &dyn BitRateInspector,
) -> Result<SweepOutcome> {
    prepare_output_dir(&config.output_dir)?;

    let plan = enumerate(&source.stem(), source.format(), &config.containers);
    info!(
        trials = plan.len(),
        output_dir = %config.output_dir.display(),
        inspector = inspector.tool(),
        "🎧 Starting sweep"
    );

    let started = Instant::now();
    let runner = TrialRunner::new(source, codec, inspector, config.trial_options());
    let results = run_trials(&runner, &plan, &config.output_dir)?;
    let duration = started.elapsed();

    if let Some(path) = &config.results_json {
        write_results_json(path, &results)?;
    }

    let source_name = source
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let summary = RunSummary::new(source_name, source.format(), &results, duration);
    let findings = analyze(&results);

    info!(
        trials = summary.trials,
        rejected = summary.failures,
        "✅ Sweep complete"
    );
    Ok(SweepOutcome {
        results,
        findings,
        summary,
    })
}

/// Full run against the local ffmpeg `aac_at` encoder.
pub fn run_sweep(config: &SweepConfig) -> Result<SweepOutcome> {
    preflight(config.inspector)?;

    let source = SourceAudio::open(&config.input)?;
    info!(
        input = %config.input.display(),
        sample_rate = source.format().sample_rate,
        channels = source.format().channels,
        frames = source.frames(),
        "Source opened"
    );

    let codec = AudioToolboxCodec::new(source.format());
    let inspector = config.inspector.build();
    execute(config, &source, &codec, inspector.as_ref())
}
