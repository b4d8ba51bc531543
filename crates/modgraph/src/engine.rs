//! Engine facade for host applications.
//!
//! [`DependencyEngine`] wires a [`SignalProvider`], an optional
//! [`SnapshotStore`], and the background [`Scheduler`] together and exposes
//! the read-only query API over the current snapshot.
//!
//! # Example
//!
//! ```no_run
//! use modgraph::config::EngineConfig;
//! use modgraph::engine::DependencyEngine;
//! use modgraph::signals::StaticSignalProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> modgraph::error::Result<()> {
//!     let provider = Arc::new(StaticSignalProvider::from_pairs([("music", "voice")]));
//!     let engine = DependencyEngine::start(provider, None, EngineConfig::default()).await?;
//!
//!     engine.wait_for_generation(1).await?;
//!     println!("{:?}", engine.get_load_order());
//!
//!     engine.shutdown().await
//! }
//! ```
//!
//! Queries never block on a rebuild. They answer from whichever snapshot was
//! published last, so during a provider outage the answers are stale but
//! consistent.

use crate::config::EngineConfig;
use crate::domain::ModuleId;
use crate::error::Result;
use crate::graph::Cycle;
use crate::scheduler::{Scheduler, SchedulerHandle, SchedulerStatus};
use crate::signals::SignalProvider;
use crate::snapshot::{FileSnapshotStore, Snapshot, SnapshotStore};
use arc_swap::ArcSwap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// A running dependency graph engine.
pub struct DependencyEngine {
    current: Arc<ArcSwap<Snapshot>>,
    scheduler: SchedulerHandle,
    config: EngineConfig,
}

impl std::fmt::Debug for DependencyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyEngine")
            .field("generation", &self.current.load().generation())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DependencyEngine {
    /// Validate `config`, warm-start from `store`, and start the scheduler.
    ///
    /// Without an explicit `store`, a [`FileSnapshotStore`] is opened at
    /// `config.snapshot_path` when that is set. The persisted snapshot, if
    /// any, is published as generation 0. The first rebuild starts
    /// immediately afterwards.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub async fn start(
        provider: Arc<dyn SignalProvider>,
        store: Option<Arc<dyn SnapshotStore>>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let store = store.or_else(|| {
            config
                .snapshot_path
                .clone()
                .map(|path| Arc::new(FileSnapshotStore::new(path)) as Arc<dyn SnapshotStore>)
        });
        let initial = match &store {
            Some(store) => warm_start(store.as_ref()).await,
            None => Snapshot::empty(),
        };
        let current = Arc::new(ArcSwap::from_pointee(initial));

        let (scheduler, handle) =
            Scheduler::new(provider, store, config.clone(), Arc::clone(&current));
        scheduler.spawn(&handle).await;

        Ok(Self {
            current,
            scheduler: handle,
            config,
        })
    }

    /// The configuration the engine was started with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The current snapshot.
    ///
    /// Hold on to the returned `Arc` to run several queries against one
    /// consistent view.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Direct dependencies of `id`, sorted. Empty for unknown modules.
    #[must_use]
    pub fn get_dependencies(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.snapshot().dependencies(id).unwrap_or_default()
    }

    /// Direct dependents of `id`, sorted. Empty for unknown modules.
    #[must_use]
    pub fn get_dependents(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.snapshot().dependents(id).unwrap_or_default()
    }

    /// Every cycle found by the last rebuild.
    #[must_use]
    pub fn list_cycles(&self) -> Vec<Cycle> {
        self.snapshot().cycles().to_vec()
    }

    /// Whether the cycle list may be incomplete.
    #[must_use]
    pub fn cycles_truncated(&self) -> bool {
        self.snapshot().cycles_truncated()
    }

    /// Whether `id` lies on any cycle. Exact even when the cycle list is
    /// truncated.
    #[must_use]
    pub fn in_cycle(&self, id: &ModuleId) -> bool {
        self.snapshot().in_cycle(id)
    }

    /// The `k` most critical modules.
    #[must_use]
    pub fn get_critical_path(&self, k: usize) -> Vec<ModuleId> {
        self.snapshot().top_critical(k)
    }

    /// Every module in safe load order.
    #[must_use]
    pub fn get_load_order(&self) -> Vec<ModuleId> {
        self.snapshot().load_order().to_vec()
    }

    /// Every module that transitively depends on `id`.
    #[must_use]
    pub fn analyze_impact(&self, id: &ModuleId) -> BTreeSet<ModuleId> {
        self.snapshot().impact(id)
    }

    /// Request an out-of-band rebuild.
    pub fn notify_module_set_changed(&self) {
        self.scheduler.notify_module_set_changed();
    }

    /// Current scheduler status.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    /// Observe scheduler status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.scheduler.subscribe()
    }

    /// Wait until a snapshot of at least `generation` is current.
    ///
    /// # Errors
    ///
    /// Returns `Error::Shutdown` if the scheduler stops first.
    pub async fn wait_for_generation(&self, generation: u64) -> Result<Arc<Snapshot>> {
        self.scheduler.wait_for_generation(generation).await?;
        Ok(self.snapshot())
    }

    /// Stop the scheduler, letting an in-flight rebuild finish within the
    /// configured grace period.
    ///
    /// # Errors
    ///
    /// Returns `Error::Shutdown` if the engine was already shut down.
    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.shutdown().await?;
        info!(
            generation = self.current.load().generation(),
            "Engine shut down"
        );
        Ok(())
    }
}

async fn warm_start(store: &dyn SnapshotStore) -> Snapshot {
    let record = match store.load().await {
        Ok(Some(record)) => record,
        Ok(None) => return Snapshot::empty(),
        Err(e) => {
            warn!(error = %e, "Cannot load persisted snapshot; starting empty");
            return Snapshot::empty();
        }
    };

    match Snapshot::from_record(record) {
        Ok(snapshot) => {
            info!(
                modules = snapshot.graph().node_count(),
                "Warm start from persisted snapshot"
            );
            snapshot.with_generation(0)
        }
        Err(e) => {
            warn!(error = %e, "Persisted snapshot is inconsistent; starting empty");
            Snapshot::empty()
        }
    }
}
