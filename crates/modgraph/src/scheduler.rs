//! Rebuild scheduling.
//!
//! A single background worker owns every rebuild. It sits `Idle` until either
//! the refresh timer fires or the host reports that its module set changed,
//! then moves to `Rebuilding`: it gathers signals, builds a fresh graph, runs
//! every analysis, and swaps the finished [`Snapshot`] into the shared slot in
//! one atomic store. After publication it reports `Published` and drops back to
//! `Idle`.
//!
//! # Guarantees
//!
//! - Rebuilds are strictly sequential.
//! - Change notifications that arrive during a rebuild collapse into exactly
//!   one follow-up rebuild ([`Notify`] holds at most one permit).
//! - A failed rebuild (provider outage, graph invariant violation) leaves the
//!   previous snapshot current. Failures are reported through
//!   [`SchedulerStatus`] and never reach readers.
//! - On shutdown an in-flight rebuild gets a grace period. If it does not
//!   finish in time it is dropped before publication, so nothing partial is
//!   ever published.
//!
//! # Reading
//!
//! Readers call `load_full()` on the shared `ArcSwap` and keep the returned
//! `Arc<Snapshot>` for as long as they need it. No lock is taken.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::graph::{BuildStats, Graph};
use crate::signals::{SignalProvider, gather_graph};
use crate::snapshot::{AnalysisOptions, Snapshot, SnapshotStore};
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next trigger
    #[default]
    Idle,

    /// A rebuild is in progress
    Rebuilding,

    /// A snapshot was just published
    Published,
}

/// Observable scheduler status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStatus {
    /// Current lifecycle state
    pub state: SchedulerState,

    /// Generation of the current snapshot
    pub generation: u64,

    /// Rebuilds that failed since the last publication
    pub consecutive_failures: u32,

    /// Message of the most recent failure, cleared on publication
    pub last_error: Option<String>,

    /// Whether the worker has exited
    pub stopped: bool,
}

/// The rebuild worker.
///
/// Create with [`Scheduler::new`] and start with [`Scheduler::spawn`].
pub struct Scheduler {
    provider: Arc<dyn SignalProvider>,
    store: Option<Arc<dyn SnapshotStore>>,
    config: EngineConfig,
    options: AnalysisOptions,
    current: Arc<ArcSwap<Snapshot>>,
    trigger: Arc<Notify>,
    status: watch::Sender<SchedulerStatus>,
    shutdown: watch::Receiver<bool>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("provider", &"<dyn SignalProvider>")
            .field("store", &self.store.as_ref().map(|_| "<dyn SnapshotStore>"))
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler that publishes into `current`.
    ///
    /// Returns the scheduler together with the handle used to trigger and
    /// stop it.
    #[must_use]
    pub fn new(
        provider: Arc<dyn SignalProvider>,
        store: Option<Arc<dyn SnapshotStore>>,
        config: EngineConfig,
        current: Arc<ArcSwap<Snapshot>>,
    ) -> (Self, SchedulerHandle) {
        let trigger = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(SchedulerStatus {
            generation: current.load().generation(),
            ..SchedulerStatus::default()
        });

        let scheduler = Self {
            provider,
            store,
            options: AnalysisOptions::from(&config),
            config,
            current,
            trigger: Arc::clone(&trigger),
            status: status_tx,
            shutdown: shutdown_rx,
        };

        let handle = SchedulerHandle {
            trigger,
            shutdown: shutdown_tx,
            status: status_rx,
            task: Mutex::new(None),
        };

        (scheduler, handle)
    }

    /// Start the worker on the current tokio runtime.
    pub async fn spawn(self, handle: &SchedulerHandle) {
        let task = tokio::spawn(self.run());
        *handle.task.lock().await = Some(task);
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            refresh_ms = self.config.refresh_interval_ms,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                () = wait_for_shutdown(&mut self.shutdown) => break,
                _ = ticker.tick() => debug!("Refresh timer fired"),
                () = self.trigger.notified() => debug!("Module set changed"),
            }

            if !self.run_rebuild().await {
                break;
            }
        }

        self.status.send_modify(|status| {
            status.state = SchedulerState::Idle;
            status.stopped = true;
        });
        info!("Scheduler stopped");
    }

    /// Run one rebuild, honouring shutdown. Returns `false` once shutdown
    /// has been requested.
    ///
    /// The grace period bounds only the work before publication. Once a
    /// snapshot is ready it is published and persisted in full, so memory and
    /// the store never disagree about which generation is current.
    async fn run_rebuild(&self) -> bool {
        self.set_state(SchedulerState::Rebuilding);

        let mut shutdown = self.shutdown.clone();
        let prepare = self.prepare();
        tokio::pin!(prepare);

        let (prepared, keep_running) = tokio::select! {
            prepared = &mut prepare => (Some(prepared), true),
            () = wait_for_shutdown(&mut shutdown) => {
                let grace = self.config.shutdown_grace();
                info!(grace_ms = self.config.shutdown_grace_ms, "Shutdown requested during rebuild");
                match tokio::time::timeout(grace, &mut prepare).await {
                    Ok(prepared) => (Some(prepared), false),
                    Err(_) => (None, false),
                }
            }
        };

        match prepared {
            Some(prepared) => {
                let outcome = match prepared {
                    Ok(snapshot) => Ok(self.commit(snapshot).await),
                    Err(e) => Err(e),
                };
                self.record_outcome(&outcome);
            }
            None => {
                warn!("Rebuild cancelled at shutdown; previous snapshot remains current");
                self.set_state(SchedulerState::Idle);
            }
        }

        keep_running
    }

    #[cfg(test)]
    async fn rebuild_once(&self) -> Result<u64> {
        let snapshot = self.prepare().await?;
        Ok(self.commit(snapshot).await)
    }

    /// Gather signals and analyse them into the next generation, without
    /// publishing anything.
    async fn prepare(&self) -> Result<Arc<Snapshot>> {
        let started = Instant::now();

        let (graph, stats) = tokio::time::timeout(
            self.config.provider_timeout(),
            gather_graph(self.provider.as_ref()),
        )
        .await
        .map_err(|_| {
            Error::SignalProviderUnavailable(format!(
                "no answer within {}ms",
                self.config.provider_timeout_ms
            ))
        })??;

        let snapshot = self.analyze(graph, stats)?;
        debug!(
            generation = snapshot.generation(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Rebuild analysed"
        );
        Ok(snapshot)
    }

    fn analyze(&self, graph: Graph, stats: BuildStats) -> Result<Arc<Snapshot>> {
        let snapshot = Snapshot::compute(graph, stats, &self.options)?;
        let generation = self.current.load().generation() + 1;
        Ok(Arc::new(snapshot.with_generation(generation)))
    }

    /// Publish `snapshot`, then persist it.
    ///
    /// The swap into the shared slot is the only step readers can observe. A
    /// persistence failure is logged and does not undo publication.
    async fn commit(&self, snapshot: Arc<Snapshot>) -> u64 {
        let generation = snapshot.generation();
        let record = self.store.as_ref().map(|_| snapshot.to_record());

        info!(
            generation,
            modules = snapshot.graph().node_count(),
            edges = snapshot.graph().edge_count(),
            cycles = snapshot.cycles().len(),
            cycles_truncated = snapshot.cycles_truncated(),
            "Publishing snapshot"
        );
        self.current.store(snapshot);
        self.status.send_modify(|status| {
            status.state = SchedulerState::Published;
            status.generation = generation;
            status.consecutive_failures = 0;
            status.last_error = None;
        });

        if let (Some(store), Some(record)) = (&self.store, record) {
            if let Err(e) = store.save(&record).await {
                warn!(generation, error = %e, "Failed to persist snapshot");
            }
        }

        generation
    }

    fn record_outcome(&self, outcome: &Result<u64>) {
        match outcome {
            Ok(_) => self.set_state(SchedulerState::Idle),
            Err(e) => {
                if e.is_invariant_violation() {
                    error!(error = %e, "Fatal rebuild error; keeping previous snapshot");
                } else {
                    warn!(error = %e, "Rebuild abandoned; keeping previous snapshot");
                }
                self.status.send_modify(|status| {
                    status.state = SchedulerState::Idle;
                    status.consecutive_failures = status.consecutive_failures.saturating_add(1);
                    status.last_error = Some(e.to_string());
                });
            }
        }
    }

    fn set_state(&self, state: SchedulerState) {
        self.status.send_modify(|status| status.state = state);
    }
}

/// Resolves once shutdown is requested or the handle is dropped.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // A closed channel means the handle is gone, which also means stop.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Control handle for a running [`Scheduler`].
#[derive(Debug)]
pub struct SchedulerHandle {
    trigger: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<SchedulerStatus>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulerHandle {
    /// Request a rebuild outside the timer.
    ///
    /// Requests made while a rebuild is running collapse into one follow-up.
    pub fn notify_module_set_changed(&self) {
        self.trigger.notify_one();
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    /// A receiver that observes every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    /// Wait until a snapshot of at least `generation` has been published.
    ///
    /// # Errors
    ///
    /// Returns `Error::Shutdown` if the worker stops first.
    pub async fn wait_for_generation(&self, generation: u64) -> Result<SchedulerStatus> {
        let mut status = self.status.clone();
        let reached = status
            .wait_for(|s| s.generation >= generation || s.stopped)
            .await
            .map_err(|_| Error::Shutdown)?
            .clone();

        if reached.generation >= generation {
            Ok(reached)
        } else {
            Err(Error::Shutdown)
        }
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// An in-flight rebuild may finish within the configured grace period;
    /// otherwise it is cancelled before publication.
    ///
    /// # Errors
    ///
    /// Returns `Error::Shutdown` if the scheduler was already stopped and
    /// `Error::Internal` if the worker panicked.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.send_replace(true);

        let task = self.task.lock().await.take().ok_or(Error::Shutdown)?;
        task.await
            .map_err(|e| Error::Internal(format!("scheduler task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModuleId;
    use crate::graph::test_support::ids;
    use crate::signals::StaticSignalProvider;
    use crate::snapshot::MemorySnapshotStore;
    use std::collections::{BTreeMap, BTreeSet};

    fn scheduler_with(
        provider: StaticSignalProvider,
        store: Arc<MemorySnapshotStore>,
    ) -> (Scheduler, SchedulerHandle, Arc<ArcSwap<Snapshot>>) {
        let current = Arc::new(ArcSwap::from_pointee(Snapshot::empty()));
        let (scheduler, handle) = Scheduler::new(
            Arc::new(provider),
            Some(store),
            EngineConfig::default(),
            Arc::clone(&current),
        );
        (scheduler, handle, current)
    }

    fn broken_graph() -> Graph {
        let mut forward = BTreeMap::new();
        forward.insert(ModuleId::from("a"), BTreeSet::from([ModuleId::from("b")]));
        forward.insert(ModuleId::from("b"), BTreeSet::new());
        Graph::from_raw_parts(ids(&["a", "b"]), forward, BTreeMap::new())
    }

    #[tokio::test]
    async fn rebuild_publishes_and_persists() {
        let store = Arc::new(MemorySnapshotStore::new());
        let provider = StaticSignalProvider::from_pairs([("A", "B")]);
        let (scheduler, handle, current) = scheduler_with(provider, Arc::clone(&store));

        let outcome = scheduler.rebuild_once().await;
        scheduler.record_outcome(&outcome);

        assert_eq!(outcome.unwrap(), 1);
        assert_eq!(current.load().generation(), 1);
        assert_eq!(current.load().load_order(), ids(&["B", "A"]).as_slice());
        assert_eq!(store.save_count(), 1);

        let status = handle.status();
        assert_eq!(status.state, SchedulerState::Idle);
        assert_eq!(status.generation, 1);
    }

    #[tokio::test]
    async fn invariant_violation_keeps_previous_snapshot() {
        let store = Arc::new(MemorySnapshotStore::new());
        let provider = StaticSignalProvider::from_pairs([("A", "B")]);
        let (scheduler, handle, current) = scheduler_with(provider, Arc::clone(&store));

        let first = scheduler.rebuild_once().await;
        scheduler.record_outcome(&first);
        let before = current.load_full();

        let outcome = scheduler
            .analyze(broken_graph(), BuildStats::default())
            .map(|_| 0);
        scheduler.record_outcome(&outcome);

        assert!(outcome.unwrap_err().is_invariant_violation());
        assert!(Arc::ptr_eq(&before, &current.load_full()));
        assert_eq!(store.save_count(), 1);

        let status = handle.status();
        assert_eq!(status.state, SchedulerState::Idle);
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.last_error.unwrap().contains("invariant"));
    }

    #[tokio::test]
    async fn shutdown_twice_reports_shutdown() {
        let store = Arc::new(MemorySnapshotStore::new());
        let (scheduler, handle, _current) =
            scheduler_with(StaticSignalProvider::new(), store);

        scheduler.spawn(&handle).await;
        handle.shutdown().await.unwrap();
        assert!(handle.status().stopped);
        assert!(matches!(handle.shutdown().await, Err(Error::Shutdown)));
    }
}
