//! Configuration layer.
//!
//! Mirrors the simulator's `scheduler/open/*`, `scheduler/pinned/*` and
//! `traceinput/*` keys. Policy names and the distribution are kept as raw
//! strings here and parsed by the components that consume them, so every
//! fatal configuration error surfaces before any simulated time passes.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::core::CoreId;

/// Fatal configuration errors. Any of these aborts startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown workload arrival distribution '{0}'")]
    UnknownDistribution(String),
    #[error("unknown queuing policy '{0}'")]
    UnknownQueuePolicy(String),
    #[error("unknown mapping algorithm '{0}'")]
    UnknownMappingPolicy(String),
    #[error("invalid system size {0}, expected rectangular-shaped system")]
    InvalidSystemSize(usize),
    #[error("can't find core requirement of '{0}', please add the profile")]
    ProfileMissing(String),
    #[error("mapping policy 'first_unused' needs a preferred-core list")]
    MissingPreferredCores,
    #[error("preferred core {0} is outside the system")]
    PreferredCoreOutOfRange(i64),
    #[error("expected {expected} explicit arrival times, got {got}")]
    MissingArrivalTimes { expected: usize, got: usize },
    #[error("expected {expected} benchmark descriptors, got {got}")]
    BenchmarkCount { expected: usize, got: usize },
    #[error("arrival rate must be at least 1")]
    InvalidArrivalRate,
    #[error("arrival interval must be at least 1 ns")]
    InvalidArrivalInterval,
    #[error("mapping epoch must be at least 1 ns")]
    InvalidEpoch,
    #[error("interleaving stride must be at least 1")]
    InvalidInterleaving,
    #[error("core mask must cover {expected} cores, got {got}")]
    CoreMaskLength { expected: usize, got: usize },
    #[error("core mask disables every core")]
    EmptyCoreMask,
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Root of the scheduler configuration tree.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scheduler: SchedulerSection,
    pub traceinput: TraceInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    pub open: OpenSection,
    pub pinned: PinnedSection,
}

/// `scheduler/open/*`: the open-system queue, arrivals and mapping logic.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenSection {
    /// Per-core usability bits. Empty means every core is allowed.
    #[serde(default)]
    pub core_mask: Vec<bool>,
    /// Mapping epoch in ns: how often the periodic loop drains the queue.
    pub epoch: u64,
    #[serde(rename = "queuePolicy", default = "default_queue_policy")]
    pub queue_policy: String,
    pub distribution: String,
    #[serde(rename = "arrivalRate")]
    pub arrival_rate: usize,
    /// Expected inter-arrival interval in ns.
    #[serde(rename = "arrivalInterval")]
    pub arrival_interval: u64,
    #[serde(rename = "explicitArrivalTimes", default)]
    pub explicit_arrival_times: Vec<u64>,
    /// 0 means: draw the seed from OS entropy.
    #[serde(rename = "distributionSeed", default)]
    pub distribution_seed: u64,
    /// Mapping policy name.
    pub logic: String,
    /// Ordered core preference list, terminated by -1.
    #[serde(default)]
    pub preferred_core: Vec<i64>,
}

fn default_queue_policy() -> String {
    "FIFO".to_string()
}

/// `scheduler/pinned/*`: knobs shared with the host's pinned time-slicer.
#[derive(Debug, Clone, Deserialize)]
pub struct PinnedSection {
    /// Per-core time quantum in ns.
    pub quantum: u64,
    /// Stride for the host's free-core search.
    pub interleaving: usize,
}

/// `traceinput/*`: the workload itself.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceInput {
    pub num_apps: usize,
    /// `+`-delimited task descriptors, `suite-benchmark-input-parallelism`.
    pub benchmarks: String,
}

impl Config {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// The first `num_apps` benchmark descriptors.
    pub fn benchmark_names(&self) -> Result<Vec<String>, ConfigError> {
        let parts: Vec<&str> = self
            .traceinput
            .benchmarks
            .split('+')
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() < self.traceinput.num_apps {
            return Err(ConfigError::BenchmarkCount {
                expected: self.traceinput.num_apps,
                got: parts.len(),
            });
        }
        Ok(parts[..self.traceinput.num_apps]
            .iter()
            .map(|s| s.to_string())
            .collect())
    }

    /// The preferred-core order, cut at the -1 terminator and range-checked.
    pub fn preferred_cores(&self, num_cores: usize) -> Result<Vec<CoreId>, ConfigError> {
        let mut order = Vec::new();
        for &entry in &self.scheduler.open.preferred_core {
            if entry == -1 {
                break;
            }
            if entry < 0 || entry as usize >= num_cores {
                return Err(ConfigError::PreferredCoreOutOfRange(entry));
            }
            order.push(entry as usize);
        }
        Ok(order)
    }

    /// Per-core mask bits, expanded to the system size.
    pub fn core_mask(&self, num_cores: usize) -> Result<Vec<bool>, ConfigError> {
        let raw = &self.scheduler.open.core_mask;
        if raw.is_empty() {
            return Ok(vec![true; num_cores]);
        }
        if raw.len() != num_cores {
            return Err(ConfigError::CoreMaskLength {
                expected: num_cores,
                got: raw.len(),
            });
        }
        if !raw.iter().any(|&b| b) {
            return Err(ConfigError::EmptyCoreMask);
        }
        Ok(raw.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Config {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_camel_case_keys() {
        let cfg = parse(
            r#"{
                "scheduler": {
                    "open": {
                        "epoch": 100000,
                        "queuePolicy": "FIFO",
                        "distribution": "uniform",
                        "arrivalRate": 1,
                        "arrivalInterval": 1000000,
                        "distributionSeed": 42,
                        "logic": "first_unused",
                        "preferred_core": [0, 1, 2, 3, -1]
                    },
                    "pinned": { "quantum": 1000000, "interleaving": 1 }
                },
                "traceinput": {
                    "num_apps": 2,
                    "benchmarks": "parsec-canneal-simsmall-2+splash2-fft-small-4"
                }
            }"#,
        );
        assert_eq!(cfg.scheduler.open.arrival_rate, 1);
        assert_eq!(cfg.scheduler.open.distribution_seed, 42);
        assert_eq!(cfg.scheduler.pinned.quantum, 1_000_000);
        assert_eq!(
            cfg.benchmark_names().unwrap(),
            vec!["parsec-canneal-simsmall-2", "splash2-fft-small-4"]
        );
    }

    #[test]
    fn preferred_cores_cut_at_terminator() {
        let mut cfg = test_config();
        cfg.scheduler.open.preferred_core = vec![3, 1, 0, -1, 2];
        assert_eq!(cfg.preferred_cores(4).unwrap(), vec![3, 1, 0]);
    }

    #[test]
    fn preferred_core_out_of_range_is_rejected() {
        let mut cfg = test_config();
        cfg.scheduler.open.preferred_core = vec![0, 9, -1];
        assert!(matches!(
            cfg.preferred_cores(4),
            Err(ConfigError::PreferredCoreOutOfRange(9))
        ));
    }

    #[test]
    fn empty_mask_allows_every_core() {
        let cfg = test_config();
        assert_eq!(cfg.core_mask(4).unwrap(), vec![true; 4]);
    }

    #[test]
    fn mask_length_must_match_system() {
        let mut cfg = test_config();
        cfg.scheduler.open.core_mask = vec![true, false];
        assert!(matches!(
            cfg.core_mask(4),
            Err(ConfigError::CoreMaskLength { expected: 4, got: 2 })
        ));
    }

    #[test]
    fn all_false_mask_is_rejected() {
        let mut cfg = test_config();
        cfg.scheduler.open.core_mask = vec![false, false];
        assert!(matches!(cfg.core_mask(2), Err(ConfigError::EmptyCoreMask)));
    }

    #[test]
    fn too_few_benchmarks_is_rejected() {
        let mut cfg = test_config();
        cfg.traceinput.num_apps = 3;
        assert!(matches!(
            cfg.benchmark_names(),
            Err(ConfigError::BenchmarkCount { expected: 3, got: 2 })
        ));
    }

    fn test_config() -> Config {
        parse(
            r#"{
                "scheduler": {
                    "open": {
                        "epoch": 1000,
                        "distribution": "uniform",
                        "arrivalRate": 1,
                        "arrivalInterval": 1000,
                        "logic": "first_unused",
                        "preferred_core": [0, 1, 2, 3, -1]
                    },
                    "pinned": { "quantum": 1000000, "interleaving": 1 }
                },
                "traceinput": {
                    "num_apps": 2,
                    "benchmarks": "splash2-barnes-small-2+splash2-barnes-small-2"
                }
            }"#,
        )
    }
}
