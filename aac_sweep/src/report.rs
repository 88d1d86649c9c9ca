//! Report Module
//!
//! Renders findings and run statistics. Everything goes to a caller-supplied
//! writer (stdout in the binary) and never through tracing, so the report
//! stays identical whatever the log level.

use crate::aggregate::{is_uniform, ContainerVerdict, Finding};
use crate::enumerator::PlannedTrial;
use crate::source::SourceFormat;
use crate::trial::TrialResult;
use console::style;
use shared_utils::progress::format_duration;
use std::io::{self, Write};
use std::time::Duration;

const RULE: &str = "══════════════════════════════════════════════════════════════════════════════";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub source_name: String,
    pub source: SourceFormat,
    pub trials: usize,
    pub failures: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn new(
        source_name: impl Into<String>,
        source: SourceFormat,
        results: &[TrialResult],
        duration: Duration,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            source,
            trials: results.len(),
            failures: results.iter().filter(|r| r.is_failure()).count(),
            duration,
        }
    }
}

fn join_values(values: &[i64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

fn verdict_mark(uniform: bool) -> String {
    if uniform {
        style("✅ single value").green().to_string()
    } else {
        style("⚠️  varies").yellow().to_string()
    }
}

fn yes_no(flag: bool) -> String {
    if flag {
        style("yes").green().to_string()
    } else {
        style("no").red().to_string()
    }
}

fn write_header<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "╔{}╗", RULE)?;
    writeln!(out, "║  {}", style(title).bold())?;
    writeln!(out, "╚{}╝", RULE)
}

fn write_section<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "── {} ──", style(title).cyan().bold())
}

fn write_container<W: Write>(out: &mut W, verdict: &ContainerVerdict) -> io::Result<()> {
    if verdict.trials == 0 {
        return writeln!(
            out,
            "    {:<4} {}",
            verdict.container.extension(),
            style("no trials").dim()
        );
    }
    writeln!(
        out,
        "    {:<4} files identical: {:<3}  audio identical: {:<3}  ({} trials)",
        verdict.container.extension(),
        yes_no(verdict.files_identical),
        yes_no(verdict.audio_identical),
        verdict.trials
    )
}

fn write_finding<W: Write>(out: &mut W, finding: &Finding) -> io::Result<()> {
    match finding {
        Finding::MeasuredBitRates {
            description,
            trials,
            values,
        } => {
            writeln!(out, "  {} ({} trials)", description, trials)?;
            if *trials == 0 {
                return writeln!(out, "    {}", style("no trials").dim());
            }
            writeln!(
                out,
                "    measured bit rates: {}  {}",
                join_values(values),
                verdict_mark(is_uniform(values))
            )
        }
        Finding::BitRateGroup {
            strategy,
            bit_rate,
            measured,
            containers,
        } => {
            writeln!(out, "  {} @ {} b/s, any quality", strategy, bit_rate)?;
            if measured.is_empty() {
                return writeln!(out, "    {}", style("no trials").dim());
            }
            writeln!(
                out,
                "    measured bit rates: {}  {}",
                join_values(measured),
                verdict_mark(is_uniform(measured))
            )?;
            for verdict in containers {
                write_container(out, verdict)?;
            }
            Ok(())
        }
    }
}

/// Full sweep report: run statistics followed by every finding in order.
pub fn write_report<W: Write>(
    out: &mut W,
    summary: &RunSummary,
    findings: &[Finding],
) -> io::Result<()> {
    write_header(out, "🎧 AAC Encoder Sweep Report")?;
    writeln!(
        out,
        "  📁 Source:      {} ({} Hz, {} ch)",
        summary.source_name, summary.source.sample_rate, summary.source.channels
    )?;
    writeln!(out, "  🔬 Trials:      {}", summary.trials)?;
    writeln!(
        out,
        "  ❌ Rejected:    {}",
        if summary.failures > 0 {
            style(summary.failures).red().to_string()
        } else {
            summary.failures.to_string()
        }
    )?;
    writeln!(out, "  ⏱️  Total Time:  {}", format_duration(summary.duration))?;

    let (measured, groups): (Vec<&Finding>, Vec<&Finding>) = findings
        .iter()
        .partition(|f| matches!(f, Finding::MeasuredBitRates { .. }));

    if !measured.is_empty() {
        write_section(out, "Measured bit rates")?;
        for finding in measured {
            write_finding(out, finding)?;
        }
    }

    if !groups.is_empty() {
        write_section(out, "Explicit bit rates")?;
        for finding in groups {
            write_finding(out, finding)?;
        }
    }

    writeln!(out)?;
    out.flush()
}

/// One line per planned trial, in enumeration order.
pub fn write_plan<W: Write>(out: &mut W, plan: &[PlannedTrial]) -> io::Result<()> {
    for (index, trial) in plan.iter().enumerate() {
        writeln!(
            out,
            "{:>5}  {:<56} {}",
            index + 1,
            trial.file_name,
            trial.configuration
        )?;
    }
    writeln!(out, "{} trials", plan.len())?;
    out.flush()
}
