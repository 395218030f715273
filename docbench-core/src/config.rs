//! Run configuration: mix, sizing, bounds and seeds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WorkloadError;
use crate::payload::QueryKind;
use crate::sequence::Mix;

fn default_size() -> usize {
    1024
}

fn default_workers() -> usize {
    4
}

fn default_seed() -> u64 {
    42
}

fn default_report_interval() -> u64 {
    10
}

/// How a run is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fixed operation budget; queues drain fully before the run ends.
    Load { operations: u64 },
    /// Wall-clock deadline; queued payloads are dropped once it passes.
    Run { duration: Duration },
}

/// Everything one benchmark run needs to know.
///
/// Loadable from TOML; every field has a default so partial files work.
/// A set `duration_secs` makes the run time-bound, otherwise `operations`
/// bounds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadConfig {
    /// Operation mix; percentages must add up to 100.
    #[serde(default)]
    pub mix: Mix,

    /// Secondary-index query issued for `mix.query` slots.
    #[serde(default)]
    pub query_kind: Option<QueryKind>,

    /// Target serialized document size in bytes.
    #[serde(default = "default_size")]
    pub size: usize,

    /// Parallel workers driving the store.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Operation budget for count-bound runs.
    #[serde(default)]
    pub operations: u64,

    /// Wall-clock bound in seconds; set for time-bound runs.
    #[serde(default)]
    pub duration_secs: Option<u64>,

    /// Documents assumed present in the store before the run starts.
    #[serde(default)]
    pub initial_documents: i64,

    /// Seed for the sequencer shuffles and key draws.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Seconds between throughput report lines.
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            mix: Mix::default(),
            query_kind: None,
            size: default_size(),
            workers: default_workers(),
            operations: 0,
            duration_secs: None,
            initial_documents: 0,
            seed: default_seed(),
            report_interval_secs: default_report_interval(),
        }
    }
}

impl WorkloadConfig {
    /// Parse a TOML file. Validation is separate so flag overrides can be
    /// applied in between.
    pub fn load_toml(path: &Path) -> Result<Self, WorkloadError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            WorkloadError::InvalidConfig(format!("read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw).map_err(|e| {
            WorkloadError::InvalidConfig(format!("parse {}: {}", path.display(), e))
        })
    }

    pub fn phase(&self) -> Phase {
        match self.duration_secs {
            Some(secs) => Phase::Run {
                duration: Duration::from_secs(secs),
            },
            None => Phase::Load {
                operations: self.operations,
            },
        }
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }

    /// Reject configurations that could never run. Called before any worker
    /// thread starts.
    pub fn validate(&self) -> Result<(), WorkloadError> {
        self.mix.validate()?;

        if self.workers == 0 {
            return Err(WorkloadError::InvalidConfig(
                "workers must be at least 1".into(),
            ));
        }
        if self.mix.query > 0 && self.query_kind.is_none() {
            return Err(WorkloadError::InvalidConfig(
                "mix includes query slots but no query_kind is set".into(),
            ));
        }
        match self.duration_secs {
            Some(0) => {
                return Err(WorkloadError::InvalidConfig(
                    "duration_secs must be positive".into(),
                ));
            }
            None if self.operations == 0 => {
                return Err(WorkloadError::InvalidConfig(
                    "either operations or duration_secs must bound the run".into(),
                ));
            }
            _ => {}
        }
        let needs_existing = self.mix.read > 0 || self.mix.update > 0 || self.mix.delete > 0;
        if needs_existing && self.initial_documents <= 0 && self.mix.create == 0 {
            return Err(WorkloadError::InvalidConfig(
                "read/update/delete slots need initial_documents or create slots".into(),
            ));
        }
        Ok(())
    }
}
