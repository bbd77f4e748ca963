//! Configuration types for archives and benchmark runs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{WorkloadConfig, WorkloadShape};

/// When the hull accelerator rebuilds ranges that were invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HullPolicy {
    /// No accelerator; eviction reads the cached worst pointer.
    #[default]
    Disabled,
    /// Re-cover dead ranges right after every mutation.
    RebuildImmediately,
    /// Re-partition the last layer every `interval` removals. Nodes of dead
    /// ranges are scanned one by one in between.
    RebuildEveryNRemovals { interval: usize },
    /// Re-cover dead ranges lazily, on the next eviction query.
    RebuildWhenRangeInvalid,
}

impl HullPolicy {
    /// Whether the archive maintains a hull accelerator at all.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Archive construction parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Eviction strategy for the last layer.
    #[serde(default)]
    pub hull_policy: HullPolicy,
    /// Seed for heap keys and tie-breaks. `None` draws one from the OS.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl ArchiveConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let HullPolicy::RebuildEveryNRemovals { interval: 0 } = self.hull_policy {
            return Err(ConfigError::ZeroRebuildInterval);
        }
        Ok(())
    }
}

/// Steady-state benchmark run driven by the command-line tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Archive under test.
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Where new points come from.
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Number of insertions per replicate.
    #[serde(default = "default_steps")]
    pub steps: usize,
    /// Archive size kept by evicting the worst point after each insertion.
    #[serde(default = "default_population")]
    pub population: usize,
    /// Independent runs, executed in parallel.
    #[serde(default = "default_replicates")]
    pub replicates: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            archive: ArchiveConfig {
                hull_policy: HullPolicy::Disabled,
                random_seed: Some(42),
            },
            workload: WorkloadConfig::default(),
            steps: default_steps(),
            population: default_population(),
            replicates: default_replicates(),
        }
    }
}

fn default_steps() -> usize {
    100_000
}
fn default_population() -> usize {
    100
}
fn default_replicates() -> usize {
    4
}

impl RunConfig {
    /// Read and validate a JSON run configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.archive.validate()?;
        if self.steps == 0 {
            return Err(ConfigError::ZeroSteps);
        }
        if self.population == 0 {
            return Err(ConfigError::ZeroPopulation);
        }
        if self.replicates == 0 {
            return Err(ConfigError::ZeroReplicates);
        }
        match self.workload.shape {
            WorkloadShape::UniformSquare => {}
            WorkloadShape::DiagonalBand { width } => {
                if !(width.is_finite() && width >= 0.0) {
                    return Err(ConfigError::InvalidWorkload(format!(
                        "band width {width} must be finite and non-negative"
                    )));
                }
            }
            WorkloadShape::ParallelFronts { fronts, noise } => {
                if fronts == 0 {
                    return Err(ConfigError::InvalidWorkload("at least one front is required".into()));
                }
                if !(noise.is_finite() && noise >= 0.0) {
                    return Err(ConfigError::InvalidWorkload(format!(
                        "noise {noise} must be finite and non-negative"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Rebuild interval must be non-zero")]
    ZeroRebuildInterval,
    #[error("Step count must be non-zero")]
    ZeroSteps,
    #[error("Population must be non-zero")]
    ZeroPopulation,
    #[error("Replicate count must be non-zero")]
    ZeroReplicates,
    #[error("Invalid workload: {0}")]
    InvalidWorkload(String),
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
