//! Dependency signal sources.
//!
//! The engine never guesses at dependencies itself. It asks a
//! [`SignalProvider`] for the current module set and, per module, for the
//! dependencies the host has declared or inferred. Explicit and inferred
//! signals are treated identically when building the graph.
//!
//! Two providers ship with the crate:
//!
//! - [`StaticSignalProvider`]: an in-process registry the host updates directly
//! - [`ManifestSignalProvider`]: reads a JSONL manifest file on every rebuild

mod manifest;

pub use manifest::{ManifestEntry, ManifestSignalProvider, ManifestWarning};

use crate::domain::{DependencySignal, ModuleId, Signal};
use crate::error::{Error, Result};
use crate::graph::{BuildStats, Graph, GraphBuilder};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Source of raw dependency signals.
///
/// Implementations may perform I/O. Failures should be reported as
/// `Error::SignalProviderUnavailable`; any other error is converted to it by
/// [`gather_graph`].
#[async_trait]
pub trait SignalProvider: Send + Sync {
    /// The modules currently loaded by the host.
    async fn list_modules(&self) -> Result<BTreeSet<ModuleId>>;

    /// Dependencies reported for one module.
    async fn get_signals(&self, module: &ModuleId) -> Result<Vec<DependencySignal>>;
}

/// Query a provider and build a fresh graph from its answers.
///
/// Modules are registered in the order `list_modules` returns them, before any
/// signal, so isolated modules keep a stable position.
///
/// # Errors
///
/// Returns `Error::SignalProviderUnavailable` if any provider call fails.
pub async fn gather_graph(provider: &dyn SignalProvider) -> Result<(Graph, BuildStats)> {
    let modules = provider.list_modules().await.map_err(unavailable)?;

    let mut builder = GraphBuilder::new();
    for module in &modules {
        builder.add_module(module.clone());
    }

    for module in &modules {
        let signals = provider.get_signals(module).await.map_err(unavailable)?;
        debug!(module = %module, count = signals.len(), "Collected signals");
        builder.extend(
            signals
                .into_iter()
                .map(|signal| Signal::from_dependency(module.clone(), signal)),
        );
    }

    Ok(builder.finish())
}

fn unavailable(err: Error) -> Error {
    match err {
        Error::SignalProviderUnavailable(_) => err,
        other => Error::SignalProviderUnavailable(other.to_string()),
    }
}

/// In-process signal provider.
///
/// The host registers modules and their dependencies directly and calls
/// `notify_module_set_changed` on the engine afterwards.
#[derive(Debug, Default)]
pub struct StaticSignalProvider {
    modules: RwLock<BTreeMap<ModuleId, Vec<DependencySignal>>>,
}

impl StaticSignalProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider pre-populated with explicit `(dependent, dependency)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut modules: BTreeMap<ModuleId, Vec<DependencySignal>> = BTreeMap::new();
        for (dependent, dependency) in pairs {
            modules
                .entry(ModuleId::from(dependent))
                .or_default()
                .push(DependencySignal::explicit(dependency));
        }
        Self {
            modules: RwLock::new(modules),
        }
    }

    /// Register a module with no dependencies, if not already present.
    pub async fn insert_module(&self, id: impl Into<ModuleId>) {
        self.modules.write().await.entry(id.into()).or_default();
    }

    /// Record a dependency for `dependent`, registering it if needed.
    pub async fn declare(&self, dependent: impl Into<ModuleId>, signal: DependencySignal) {
        self.modules
            .write()
            .await
            .entry(dependent.into())
            .or_default()
            .push(signal);
    }

    /// Forget a module and everything it declared.
    ///
    /// Returns `true` if the module was registered.
    pub async fn remove_module(&self, id: &ModuleId) -> bool {
        self.modules.write().await.remove(id).is_some()
    }
}

#[async_trait]
impl SignalProvider for StaticSignalProvider {
    async fn list_modules(&self) -> Result<BTreeSet<ModuleId>> {
        Ok(self.modules.read().await.keys().cloned().collect())
    }

    async fn get_signals(&self, module: &ModuleId) -> Result<Vec<DependencySignal>> {
        Ok(self
            .modules
            .read()
            .await
            .get(module)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Provenance;

    struct FailingProvider;

    #[async_trait]
    impl SignalProvider for FailingProvider {
        async fn list_modules(&self) -> Result<BTreeSet<ModuleId>> {
            Err(Error::Io(std::io::Error::other("registry offline")))
        }

        async fn get_signals(&self, _module: &ModuleId) -> Result<Vec<DependencySignal>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn gather_builds_graph_from_static_provider() {
        let provider = StaticSignalProvider::from_pairs([("A", "B"), ("B", "C")]);
        let (graph, stats) = gather_graph(&provider).await.unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(stats.signals_seen, 2);
    }

    #[tokio::test]
    async fn isolated_modules_become_nodes() {
        let provider = StaticSignalProvider::new();
        provider.insert_module("lonely").await;
        provider
            .declare("music", DependencySignal::inferred("voice", 0.6))
            .await;

        let (graph, _) = gather_graph(&provider).await.unwrap();
        assert!(graph.contains(&"lonely".into()));
        assert!(graph.contains(&"voice".into()));

        let info = graph.edge_info(&"music".into(), &"voice".into()).unwrap();
        assert_eq!(info.provenance, Provenance::Inferred);
    }

    #[tokio::test]
    async fn removed_module_drops_its_edges() {
        let provider = StaticSignalProvider::from_pairs([("A", "B")]);
        assert!(provider.remove_module(&"A".into()).await);
        assert!(!provider.remove_module(&"A".into()).await);

        let (graph, _) = gather_graph(&provider).await.unwrap();
        assert_eq!(graph.node_count(), 0);
    }

    #[tokio::test]
    async fn provider_errors_become_unavailable() {
        let err = gather_graph(&FailingProvider).await.unwrap_err();
        assert!(matches!(err, Error::SignalProviderUnavailable(ref msg) if msg.contains("registry offline")));
    }
}
