//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use modgraph::config::EngineConfig;
use modgraph::graph::{Graph, GraphBuilder};
use modgraph::signals::{SignalProvider, StaticSignalProvider};
use modgraph::snapshot::{AnalysisOptions, MemorySnapshotStore, Snapshot, SnapshotRecord, SnapshotStore};
use modgraph::{DependencySignal, Error, ModuleId, Result, Signal};
use std::collections::BTreeSet;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// Upper bound for any single wait in async tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a graph from `(dependent, dependency)` pairs.
pub fn graph_of(pairs: &[(&str, &str)]) -> Graph {
    Graph::build(pairs.iter().map(|(a, b)| Signal::new(*a, *b)))
}

/// Analyse `(dependent, dependency)` pairs with default options.
pub fn snapshot_of(pairs: &[(&str, &str)]) -> Snapshot {
    let mut builder = GraphBuilder::new();
    builder.extend(pairs.iter().map(|(a, b)| Signal::new(*a, *b)));
    let (graph, stats) = builder.finish();
    Snapshot::compute(graph, stats, &AnalysisOptions::default()).expect("consistent graph")
}

/// Module ids from names.
pub fn ids(names: &[&str]) -> Vec<ModuleId> {
    names.iter().map(|n| ModuleId::from(*n)).collect()
}

/// Configuration whose timer never fires during a test.
pub fn quiet_config() -> EngineConfig {
    EngineConfig {
        refresh_interval_ms: 3_600_000,
        ..EngineConfig::default()
    }
}

/// Await `future`, failing the test if it takes longer than [`TEST_TIMEOUT`].
pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(TEST_TIMEOUT, future)
        .await
        .expect("test step timed out")
}

/// Provider that blocks every round until the test releases it.
#[derive(Debug)]
pub struct GatedProvider {
    pub inner: StaticSignalProvider,
    pub gate: Semaphore,
    pub entered: Notify,
    calls: AtomicUsize,
}

impl GatedProvider {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            inner: StaticSignalProvider::from_pairs(pairs.iter().copied()),
            gate: Semaphore::new(0),
            entered: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Let one blocked round proceed.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Number of rounds started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalProvider for GatedProvider {
    async fn list_modules(&self) -> Result<BTreeSet<ModuleId>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.gate
            .acquire()
            .await
            .map_err(|e| Error::SignalProviderUnavailable(e.to_string()))?
            .forget();
        self.inner.list_modules().await
    }

    async fn get_signals(&self, module: &ModuleId) -> Result<Vec<DependencySignal>> {
        self.inner.get_signals(module).await
    }
}

/// Provider that can be switched off to simulate an outage.
#[derive(Debug, Default)]
pub struct FlakyProvider {
    pub inner: StaticSignalProvider,
    down: AtomicBool,
}

impl FlakyProvider {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            inner: StaticSignalProvider::from_pairs(pairs.iter().copied()),
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl SignalProvider for FlakyProvider {
    async fn list_modules(&self) -> Result<BTreeSet<ModuleId>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::SignalProviderUnavailable("host is restarting".into()));
        }
        self.inner.list_modules().await
    }

    async fn get_signals(&self, module: &ModuleId) -> Result<Vec<DependencySignal>> {
        self.inner.get_signals(module).await
    }
}

/// Provider that never answers.
#[derive(Debug, Default)]
pub struct HangingProvider {
    pub entered: Notify,
}

#[async_trait]
impl SignalProvider for HangingProvider {
    async fn list_modules(&self) -> Result<BTreeSet<ModuleId>> {
        self.entered.notify_one();
        std::future::pending().await
    }

    async fn get_signals(&self, _module: &ModuleId) -> Result<Vec<DependencySignal>> {
        std::future::pending().await
    }
}

/// Store whose saves take `delay` before reaching the wrapped memory store.
#[derive(Debug)]
pub struct SlowStore {
    pub inner: MemorySnapshotStore,
    pub delay: Duration,
}

impl SlowStore {
    pub fn new(inner: MemorySnapshotStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl SnapshotStore for SlowStore {
    async fn load(&self) -> Result<Option<SnapshotRecord>> {
        self.inner.load().await
    }

    async fn save(&self, record: &SnapshotRecord) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.save(record).await
    }
}

/// Run the modgraph binary in `dir` with colors disabled.
pub fn run_modgraph_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_modgraph"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute modgraph binary")
}
