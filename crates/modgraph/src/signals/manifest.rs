//! JSONL manifest signal provider.
//!
//! A manifest holds one module per line:
//!
//! ```text
//! {"module": "music", "depends_on": [{"id": "voice"}, {"id": "queue", "provenance": "inferred", "confidence": 0.7}]}
//! {"module": "voice"}
//! ```
//!
//! Loading is resilient. Malformed and blank lines are skipped and reported as
//! [`ManifestWarning`]s; a module listed on several lines accumulates all of its
//! dependencies. The file is re-read by `list_modules`, and `get_signals`
//! answers from that reading, so one rebuild sees one consistent manifest.

use super::SignalProvider;
use crate::domain::{DependencySignal, ModuleId};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

/// One line of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The module this line describes
    pub module: ModuleId,

    /// Its dependencies
    #[serde(default)]
    pub depends_on: Vec<DependencySignal>,
}

/// Non-fatal problems found while reading a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestWarning {
    /// A line was not a valid manifest entry and was skipped.
    MalformedJson {
        /// 1-based line number
        line_number: usize,
        /// Parser error message
        error: String,
    },

    /// A line was skipped without being parsed.
    SkippedLine {
        /// 1-based line number
        line_number: usize,
        /// Why the line was skipped
        reason: String,
    },
}

impl ManifestWarning {
    /// The line the warning refers to.
    #[must_use]
    pub fn line_number(&self) -> usize {
        match self {
            Self::MalformedJson { line_number, .. } | Self::SkippedLine { line_number, .. } => {
                *line_number
            }
        }
    }
}

#[derive(Debug, Default)]
struct ManifestState {
    modules: BTreeMap<ModuleId, Vec<DependencySignal>>,
    warnings: Vec<ManifestWarning>,
}

/// Signal provider backed by a JSONL manifest file.
#[derive(Debug)]
pub struct ManifestSignalProvider {
    path: PathBuf,
    state: Mutex<Option<ManifestState>>,
}

impl ManifestSignalProvider {
    /// Create a provider for the manifest at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(None),
        }
    }

    /// Path of the manifest file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Warnings from the most recent read.
    pub async fn warnings(&self) -> Vec<ManifestWarning> {
        self.state
            .lock()
            .await
            .as_ref()
            .map(|state| state.warnings.clone())
            .unwrap_or_default()
    }

    async fn reload(&self) -> Result<ManifestState> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::SignalProviderUnavailable(format!(
                "cannot read manifest {}: {e}",
                self.path.display()
            ))
        })?;

        let state = parse_manifest(&content);
        for warning in &state.warnings {
            warn!(path = %self.path.display(), ?warning, "Skipped manifest line");
        }
        Ok(state)
    }
}

/// Parse manifest content, collecting warnings instead of failing.
fn parse_manifest(content: &str) -> ManifestState {
    let mut state = ManifestState::default();

    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            state.warnings.push(ManifestWarning::SkippedLine {
                line_number,
                reason: "blank line".to_string(),
            });
            continue;
        }

        match serde_json::from_str::<ManifestEntry>(trimmed) {
            Ok(entry) => state
                .modules
                .entry(entry.module)
                .or_default()
                .extend(entry.depends_on),
            Err(e) => state.warnings.push(ManifestWarning::MalformedJson {
                line_number,
                error: e.to_string(),
            }),
        }
    }

    state
}

#[async_trait]
impl SignalProvider for ManifestSignalProvider {
    async fn list_modules(&self) -> Result<BTreeSet<ModuleId>> {
        let fresh = self.reload().await?;
        let modules = fresh.modules.keys().cloned().collect();
        *self.state.lock().await = Some(fresh);
        Ok(modules)
    }

    async fn get_signals(&self, module: &ModuleId) -> Result<Vec<DependencySignal>> {
        let mut state = self.state.lock().await;
        if state.is_none() {
            *state = Some(self.reload().await?);
        }
        Ok(state
            .as_ref()
            .and_then(|s| s.modules.get(module).cloned())
            .unwrap_or_default())
    }
}
