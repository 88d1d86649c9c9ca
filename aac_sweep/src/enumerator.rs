//! Configuration Enumerator
//!
//! Builds the ordered trial plan. Order, per container and per strategy:
//!
//! 1. default quality, default bit rate
//! 2. quality only (each level)
//! 3. VBR quality only (each level), skipped for strategies that cannot take it
//! 4. each bit rate, as total and per channel: alone, then with each quality
//!    (total, per-channel), then with each VBR quality (same skip as 3)
//!
//! The plan is not deduplicated.

use crate::config::{AudioQuality, BitRate, BitRateStrategy, Configuration, Container};
use crate::source::SourceFormat;

/// Bit rates swept, in bits per second.
pub const BIT_RATES: [u32; 6] = [32000, 64000, 96000, 128000, 192000, 320000];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTrial {
    pub configuration: Configuration,
    pub container: Container,
    pub file_name: String,
}

impl PlannedTrial {
    fn new(stem: &str, container: Container, configuration: Configuration) -> Self {
        let file_name = format!(
            "{}_{}.{}",
            stem,
            configuration.file_tag(),
            container.extension()
        );
        Self {
            configuration,
            container,
            file_name,
        }
    }
}

/// Full trial plan for a source named `stem` with format `source`.
pub fn enumerate(stem: &str, source: SourceFormat, containers: &[Container]) -> Vec<PlannedTrial> {
    let mut plan = Vec::new();

    for &container in containers {
        for strategy in BitRateStrategy::ALL {
            let base =
                Configuration::aac(source.sample_rate, source.channels).with_strategy(strategy);
            let mut push = |configuration: Configuration| {
                debug_assert!(!configuration.is_excluded());
                plan.push(PlannedTrial::new(stem, container, configuration));
            };

            push(base.clone());

            for quality in AudioQuality::ALL {
                push(base.clone().with_quality(quality));
            }

            // Variable + VBR quality kills the process inside AudioToolbox.
            if strategy.accepts_vbr_quality() {
                for vbr_quality in AudioQuality::ALL {
                    push(base.clone().with_vbr_quality(vbr_quality));
                }
            }

            for bit_rate in BIT_RATES {
                let total = base.clone().with_bit_rate(BitRate::Total(bit_rate));
                let per_channel = base.clone().with_bit_rate(BitRate::PerChannel(bit_rate));

                push(total.clone());
                push(per_channel.clone());

                for quality in AudioQuality::ALL {
                    push(total.clone().with_quality(quality));
                    push(per_channel.clone().with_quality(quality));
                }

                if strategy.accepts_vbr_quality() {
                    for vbr_quality in AudioQuality::ALL {
                        push(total.clone().with_vbr_quality(vbr_quality));
                        push(per_channel.clone().with_vbr_quality(vbr_quality));
                    }
                }
            }
        }
    }

    plan
}
