//! aac-sweep - AAC Encoder Configuration Sweep
//!
//! Encodes one reference waveform under every combination of bit-rate
//! strategy, quality, VBR quality and bit rate the platform AAC encoder
//! accepts, measures what it actually produced, and reports which settings
//! make an observable difference.
//!
//! ## Pipeline
//! ```rust,ignore
//! use aac_sweep::{run_sweep, SweepConfig};
//!
//! let outcome = run_sweep(&SweepConfig::default())?;
//! for finding in &outcome.findings {
//!     println!("{:?}", finding);
//! }
//! ```

pub mod aggregate;
pub mod audiotoolbox;
pub mod codec;
pub mod config;
pub mod enumerator;
pub mod error;
pub mod inspector;
pub mod report;
pub mod source;
pub mod sweep;
pub mod trial;

#[cfg(test)]
mod testing;

// Re-exports
pub use aggregate::{analyze, ContainerVerdict, Finding};
pub use config::{AudioQuality, BitRate, BitRateStrategy, Configuration, Container};
pub use enumerator::{enumerate, PlannedTrial};
pub use error::{Result, SweepError};
pub use inspector::InspectorKind;
pub use report::{write_plan, write_report, RunSummary};
pub use source::SourceAudio;
pub use sweep::{run_sweep, SweepConfig, SweepOutcome};
pub use trial::{TrialResult, TrialRunner};
