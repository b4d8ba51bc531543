//! Configuration management for the engine.
//!
//! Configuration is read from a YAML file. Every key is optional and falls
//! back to the defaults below.
//!
//! ```yaml
//! refresh-interval-ms: 300000
//! provider-timeout-ms: 30000
//! shutdown-grace-ms: 5000
//! cycle-visit-budget: 100000
//! critical-path-top-k: 10
//! criticality: direct
//! snapshot-path: .modgraph/snapshot.json
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Default interval between timer-driven rebuilds (5 minutes)
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 300_000;

/// Default bound on one round of signal provider calls
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 30_000;

/// Default grace period for an in-flight rebuild at shutdown
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;

/// Default node-visit budget for the cycle search
pub const DEFAULT_CYCLE_VISIT_BUDGET: usize = 100_000;

/// Default number of entries stored in a snapshot's critical path
pub const DEFAULT_CRITICAL_PATH_TOP_K: usize = 10;

/// How criticality scores are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriticalityPolicy {
    /// Score is the number of direct dependents.
    #[default]
    #[serde(alias = "direct-dependents")]
    Direct,

    /// Score is the size of the impact set (all transitive dependents).
    #[serde(alias = "transitive-dependents")]
    Transitive,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Milliseconds between timer-driven rebuilds
    pub refresh_interval_ms: u64,

    /// Milliseconds allowed for one round of signal provider calls
    pub provider_timeout_ms: u64,

    /// Milliseconds an in-flight rebuild may keep running after shutdown
    pub shutdown_grace_ms: u64,

    /// Maximum node visits spent searching for cycles
    pub cycle_visit_budget: usize,

    /// Number of modules stored in the snapshot's critical path
    pub critical_path_top_k: usize,

    /// Criticality scoring policy
    pub criticality: CriticalityPolicy,

    /// Where published snapshots are persisted, if anywhere
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            cycle_visit_budget: DEFAULT_CYCLE_VISIT_BUDGET,
            critical_path_top_k: DEFAULT_CRITICAL_PATH_TOP_K,
            criticality: CriticalityPolicy::default(),
            snapshot_path: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config` if it
    /// is not valid YAML or fails [`validate`](Self::validate).
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on malformed YAML or invalid values.
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Reject values that would stall the scheduler or the cycle search.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_ms == 0 {
            return Err(Error::Config(
                "refresh-interval-ms must be greater than zero".to_string(),
            ));
        }
        if self.provider_timeout_ms == 0 {
            return Err(Error::Config(
                "provider-timeout-ms must be greater than zero".to_string(),
            ));
        }
        if self.cycle_visit_budget == 0 {
            return Err(Error::Config(
                "cycle-visit-budget must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Interval between timer-driven rebuilds.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Bound on one round of signal provider calls.
    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    /// Grace period for an in-flight rebuild at shutdown.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
