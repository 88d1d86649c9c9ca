//! Result Aggregator
//!
//! Read-only reductions over the trial results. Each question filters the
//! results down to one group and reduces a field to its distinct values; a
//! group where the set has exactly one element is one where the varied axis
//! made no observable difference. Groups are never compared with each other.

use crate::config::{BitRate, BitRateStrategy, Container};
use crate::trial::TrialResult;
use std::collections::HashSet;
use std::hash::Hash;

/// Bit rates with a detailed per-strategy breakdown.
pub const DETAILED_BIT_RATES: [u32; 5] = [64000, 96000, 128000, 192000, 320000];

/// Bit rate whose group is expected to collapse to a single measured value.
pub const PINNED_BIT_RATE: u32 = 32000;

/// Distinct values in first-seen order.
pub fn distinct<T, I>(values: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// True when a reduced group holds exactly one distinct value.
pub fn is_uniform<T>(distinct_values: &[T]) -> bool {
    distinct_values.len() == 1
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerVerdict {
    pub container: Container,
    pub trials: usize,
    /// Encoded files byte-identical across the group
    pub files_identical: bool,
    /// Decoded references identical across the group
    pub audio_identical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// Distinct measured bit rates of one filtered group
    MeasuredBitRates {
        description: String,
        trials: usize,
        values: Vec<i64>,
    },
    /// One strategy at one explicit bit rate, any quality
    BitRateGroup {
        strategy: BitRateStrategy,
        bit_rate: u32,
        measured: Vec<i64>,
        containers: Vec<ContainerVerdict>,
    },
}

fn measured_bit_rates<'a>(
    description: String,
    group: impl Iterator<Item = &'a TrialResult>,
) -> Finding {
    let group: Vec<&TrialResult> = group.collect();
    Finding::MeasuredBitRates {
        description,
        trials: group.len(),
        values: distinct(group.iter().map(|r| r.measured_bit_rate)),
    }
}

fn fixed_strategies() -> impl Iterator<Item = BitRateStrategy> {
    BitRateStrategy::ALL
        .into_iter()
        .filter(|s| *s != BitRateStrategy::Variable)
}

/// `Variable` strategy, any bit rate, any quality.
pub fn variable_strategy(results: &[TrialResult]) -> Finding {
    measured_bit_rates(
        "Variable strategy, any bit rate, any quality".to_string(),
        results
            .iter()
            .filter(|r| r.configuration.strategy == Some(BitRateStrategy::Variable)),
    )
}

/// Explicit 32000 b/s under every strategy except `Variable`.
pub fn pinned_bit_rate(results: &[TrialResult]) -> Finding {
    measured_bit_rates(
        format!(
            "BitRate {}, any strategy except Variable, any quality",
            PINNED_BIT_RATE
        ),
        results.iter().filter(|r| {
            r.configuration.bit_rate == Some(BitRate::Total(PINNED_BIT_RATE))
                && r.configuration.strategy != Some(BitRateStrategy::Variable)
        }),
    )
}

/// Per-channel bit rate of any value, one group per non-`Variable` strategy.
pub fn per_channel(results: &[TrialResult]) -> Vec<Finding> {
    fixed_strategies()
        .map(|strategy| {
            measured_bit_rates(
                format!("BitRatePerChannel with any value, {}, any quality", strategy),
                results.iter().filter(|r| {
                    matches!(r.configuration.bit_rate, Some(BitRate::PerChannel(_)))
                        && r.configuration.strategy == Some(strategy)
                }),
            )
        })
        .collect()
}

/// One group per non-`Variable` strategy and detailed bit rate.
pub fn bit_rate_groups(results: &[TrialResult]) -> Vec<Finding> {
    let mut findings = Vec::new();

    for strategy in fixed_strategies() {
        for bit_rate in DETAILED_BIT_RATES {
            let group: Vec<&TrialResult> = results
                .iter()
                .filter(|r| {
                    r.configuration.bit_rate == Some(BitRate::Total(bit_rate))
                        && r.configuration.strategy == Some(strategy)
                })
                .collect();

            // every container gets a verdict; an empty one is never identical
            let containers = Container::ALL
                .into_iter()
                .map(|container| {
                    let members: Vec<&&TrialResult> = group
                        .iter()
                        .filter(|r| Container::from_extension(&r.file_format) == Some(container))
                        .collect();
                    let files = distinct(members.iter().map(|r| r.checksum.as_str()));
                    let audio = distinct(members.iter().map(|r| r.reference_checksum.as_str()));
                    ContainerVerdict {
                        container,
                        trials: members.len(),
                        files_identical: is_uniform(&files),
                        audio_identical: is_uniform(&audio),
                    }
                })
                .collect();

            findings.push(Finding::BitRateGroup {
                strategy,
                bit_rate,
                measured: distinct(group.iter().map(|r| r.measured_bit_rate)),
                containers,
            });
        }
    }

    findings
}

/// Every question, in report order.
pub fn analyze(results: &[TrialResult]) -> Vec<Finding> {
    let mut findings = vec![variable_strategy(results), pinned_bit_rate(results)];
    findings.extend(per_channel(results));
    findings.extend(bit_rate_groups(results));
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioQuality, Configuration};
    use std::time::Duration;

    fn result(
        config: Configuration,
        measured: i64,
        checksum: &str,
        reference: &str,
        ext: &str,
    ) -> TrialResult {
        TrialResult {
            configuration: config,
            measured_bit_rate: measured,
            conversion_time: Duration::from_millis(5),
            checksum: checksum.to_string(),
            reference_checksum: reference.to_string(),
            file_format: ext.to_string(),
        }
    }

    fn base(strategy: BitRateStrategy) -> Configuration {
        Configuration::aac(44100, 2).with_strategy(strategy)
    }

    fn find_group(findings: &[Finding], strategy: BitRateStrategy, bit_rate: u32) -> &Finding {
        findings
            .iter()
            .find(|f| {
                matches!(f, Finding::BitRateGroup { strategy: s, bit_rate: b, .. }
                    if *s == strategy && *b == bit_rate)
            })
            .unwrap()
    }

    #[test]
    fn test_distinct_keeps_first_seen_order() {
        assert_eq!(distinct(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(is_uniform(&distinct(vec!["a", "a"])));
        assert!(!is_uniform::<i64>(&[]));
    }

    #[test]
    fn test_variable_strategy_collects_all_values() {
        let variable = |q| base(BitRateStrategy::Variable).with_quality(q);
        let results = vec![
            result(variable(AudioQuality::Min), 96000, "a", "x", "caf"),
            result(variable(AudioQuality::Max), 160000, "b", "y", "caf"),
            result(base(BitRateStrategy::Constant), 128000, "c", "z", "caf"),
        ];
        match variable_strategy(&results) {
            Finding::MeasuredBitRates { values, trials, .. } => {
                assert_eq!(trials, 2);
                assert_eq!(values, vec![96000, 160000]);
            }
            other => panic!("unexpected finding {:?}", other),
        }
    }

    #[test]
    fn test_pinned_bit_rate_excludes_variable_and_per_channel() {
        let pinned = |strategy| base(strategy).with_bit_rate(BitRate::Total(PINNED_BIT_RATE));
        let results = vec![
            result(pinned(BitRateStrategy::Constant), 32000, "a", "x", "m4a"),
            result(pinned(BitRateStrategy::LongTermAverage), 32000, "b", "y", "m4a"),
            result(pinned(BitRateStrategy::Variable), 41000, "c", "z", "m4a"),
            result(
                base(BitRateStrategy::Constant).with_bit_rate(BitRate::PerChannel(PINNED_BIT_RATE)),
                64000,
                "d",
                "w",
                "m4a",
            ),
        ];
        match pinned_bit_rate(&results) {
            Finding::MeasuredBitRates { values, trials, .. } => {
                assert_eq!(trials, 2);
                assert_eq!(values, vec![32000]);
            }
            other => panic!("unexpected finding {:?}", other),
        }
    }

    #[test]
    fn test_per_channel_groups_by_strategy() {
        let per_channel_64k = |strategy| base(strategy).with_bit_rate(BitRate::PerChannel(64000));
        let results = vec![
            result(per_channel_64k(BitRateStrategy::Constant), 128000, "a", "x", "caf"),
            result(per_channel_64k(BitRateStrategy::VariableConstrained), 127000, "b", "y", "caf"),
        ];
        let findings = per_channel(&results);
        assert_eq!(findings.len(), 3);
        match &findings[0] {
            Finding::MeasuredBitRates { description, values, .. } => {
                assert!(description.contains("Constant"));
                assert_eq!(values, &vec![128000]);
            }
            other => panic!("unexpected finding {:?}", other),
        }
        match &findings[1] {
            Finding::MeasuredBitRates { trials, .. } => assert_eq!(*trials, 0),
            other => panic!("unexpected finding {:?}", other),
        }
    }

    #[test]
    fn test_bit_rate_group_verdicts_per_container() {
        let config = |q| {
            base(BitRateStrategy::Constant)
                .with_bit_rate(BitRate::Total(128000))
                .with_quality(q)
        };
        let results = vec![
            result(config(AudioQuality::Low), 128000, "caf-1", "pcm-1", "caf"),
            result(config(AudioQuality::High), 128000, "caf-1", "pcm-1", "caf"),
            result(config(AudioQuality::Low), 128000, "m4a-1", "pcm-1", "m4a"),
            result(config(AudioQuality::High), 128000, "m4a-2", "pcm-1", "m4a"),
        ];

        let findings = bit_rate_groups(&results);
        assert_eq!(findings.len(), 3 * DETAILED_BIT_RATES.len());

        let group = find_group(&findings, BitRateStrategy::Constant, 128000);
        match group {
            Finding::BitRateGroup { measured, containers, .. } => {
                assert_eq!(measured, &vec![128000]);
                assert_eq!(
                    containers,
                    &vec![
                        ContainerVerdict {
                            container: Container::Caf,
                            trials: 2,
                            files_identical: true,
                            audio_identical: true,
                        },
                        ContainerVerdict {
                            container: Container::M4a,
                            trials: 2,
                            files_identical: false,
                            audio_identical: true,
                        },
                    ]
                );
            }
            other => panic!("unexpected finding {:?}", other),
        }
    }

    #[test]
    fn test_failed_trials_are_still_reported() {
        let config = base(BitRateStrategy::LongTermAverage).with_bit_rate(BitRate::Total(320000));
        let results = vec![
            TrialResult::failed(config.clone().with_quality(AudioQuality::Min), "caf"),
            result(config.with_quality(AudioQuality::Max), 320000, "a", "b", "caf"),
        ];
        let findings = bit_rate_groups(&results);
        match find_group(&findings, BitRateStrategy::LongTermAverage, 320000) {
            Finding::BitRateGroup { measured, containers, .. } => {
                assert_eq!(measured, &vec![-1, 320000]);
                assert!(!containers[0].files_identical);
            }
            other => panic!("unexpected finding {:?}", other),
        }
    }

    #[test]
    fn test_analyze_order() {
        let findings = analyze(&[]);
        assert_eq!(findings.len(), 2 + 3 + 3 * DETAILED_BIT_RATES.len());
        let descriptions: Vec<&str> = findings
            .iter()
            .filter_map(|f| match f {
                Finding::MeasuredBitRates { description, .. } => Some(description.as_str()),
                Finding::BitRateGroup { .. } => None,
            })
            .collect();
        assert!(descriptions[0].starts_with("Variable"));
        assert!(descriptions[1].starts_with("BitRate 32000"));
    }

    #[test]
    fn test_container_without_trials_gets_empty_verdict() {
        let config = base(BitRateStrategy::Constant).with_bit_rate(BitRate::Total(64000));
        let results = vec![
            result(config.clone().with_quality(AudioQuality::Low), 64000, "a", "x", "caf"),
            result(config.with_quality(AudioQuality::High), 64000, "a", "x", "caf"),
        ];
        let findings = bit_rate_groups(&results);
        match find_group(&findings, BitRateStrategy::Constant, 64000) {
            Finding::BitRateGroup { containers, .. } => {
                assert_eq!(containers.len(), Container::ALL.len());
                assert_eq!(
                    containers[1],
                    ContainerVerdict {
                        container: Container::M4a,
                        trials: 0,
                        files_identical: false,
                        audio_identical: false,
                    }
                );
                assert!(containers[0].files_identical);
            }
            other => panic!("unexpected finding {:?}", other),
        }
    }
}
