//! Immutable analysis snapshots.
//!
//! A [`Snapshot`] bundles a graph with everything derived from it: cycles,
//! cycle membership, criticality ranking and load order. Snapshots are built
//! in one piece by [`Snapshot::compute`] and never mutated afterwards, so any
//! number of readers can share one through an `Arc`.
//!
//! [`SnapshotRecord`] is the persisted form. Maps are ordered and adjacency is
//! stored as sorted lists, so two snapshots of the same graph serialize to the
//! same bytes apart from `generated_at`.

pub mod store;

pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};

use crate::config::{CriticalityPolicy, EngineConfig};
use crate::domain::ModuleId;
use crate::error::{Error, Result};
use crate::graph::{
    self, BuildStats, Cycle, Graph, cyclic_members, find_cycles, impact_of, load_order,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Settings that shape the derived artifacts of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Node-visit budget for the cycle search
    pub cycle_visit_budget: usize,

    /// Entries kept in the critical path
    pub critical_path_top_k: usize,

    /// Criticality scoring policy
    pub criticality: CriticalityPolicy,
}

impl From<&EngineConfig> for AnalysisOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            cycle_visit_budget: config.cycle_visit_budget,
            critical_path_top_k: config.critical_path_top_k,
            criticality: config.criticality,
        }
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// An immutable bundle of a graph and its derived artifacts.
#[derive(Debug, Clone)]
pub struct Snapshot {
    graph: Graph,
    cycles: Vec<Cycle>,
    cycles_truncated: bool,
    cyclic_members: BTreeSet<ModuleId>,
    critical_path: Vec<ModuleId>,
    criticality: CriticalityPolicy,
    load_order: Vec<ModuleId>,
    build_stats: BuildStats,
    generated_at: DateTime<Utc>,
    generation: u64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl Snapshot {
    /// A snapshot of the empty graph.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            graph: Graph::new(),
            cycles: Vec::new(),
            cycles_truncated: false,
            cyclic_members: BTreeSet::new(),
            critical_path: Vec::new(),
            criticality: CriticalityPolicy::default(),
            load_order: Vec::new(),
            build_stats: BuildStats::default(),
            generated_at: Utc::now(),
            generation: 0,
        }
    }

    /// Run every analysis over `graph` and bundle the results.
    ///
    /// # Errors
    ///
    /// Returns `Error::GraphInvariantViolation` if the graph's adjacency maps
    /// disagree. A truncated cycle search is not an error; it sets
    /// [`cycles_truncated`](Self::cycles_truncated).
    pub fn compute(graph: Graph, build_stats: BuildStats, options: &AnalysisOptions) -> Result<Self> {
        let report = find_cycles(&graph, options.cycle_visit_budget)?;
        let cyclic = cyclic_members(&graph);
        let critical_path =
            graph::rank_with(&graph, options.critical_path_top_k, options.criticality);
        let order = load_order(&graph);

        Ok(Self {
            graph,
            cycles: report.cycles,
            cycles_truncated: report.truncated,
            cyclic_members: cyclic,
            critical_path,
            criticality: options.criticality,
            load_order: order,
            build_stats,
            generated_at: Utc::now(),
            generation: 0,
        })
    }

    /// Stamp the publication sequence number.
    #[must_use]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// The analysed graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Cycles found by the search, each a closed walk.
    #[must_use]
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Whether the cycle list may be incomplete.
    #[must_use]
    pub fn cycles_truncated(&self) -> bool {
        self.cycles_truncated
    }

    /// Every module on at least one cycle (exact).
    #[must_use]
    pub fn cyclic_members(&self) -> &BTreeSet<ModuleId> {
        &self.cyclic_members
    }

    /// Whether `id` sits on a cycle.
    #[must_use]
    pub fn in_cycle(&self, id: &ModuleId) -> bool {
        self.cyclic_members.contains(id)
    }

    /// The stored critical path (top-K at build time).
    #[must_use]
    pub fn critical_path(&self) -> &[ModuleId] {
        &self.critical_path
    }

    /// The `k` most critical modules.
    ///
    /// Served from the stored ranking when it is long enough, otherwise
    /// recomputed from the graph.
    #[must_use]
    pub fn top_critical(&self, k: usize) -> Vec<ModuleId> {
        if k <= self.critical_path.len() || self.critical_path.len() == self.graph.node_count() {
            self.critical_path.iter().take(k).cloned().collect()
        } else {
            graph::rank_with(&self.graph, k, self.criticality)
        }
    }

    /// Policy the critical path was ranked by.
    #[must_use]
    pub fn criticality(&self) -> CriticalityPolicy {
        self.criticality
    }

    /// Score of `id` under [`criticality`](Self::criticality). Zero for
    /// unknown modules.
    #[must_use]
    pub fn criticality_score(&self, id: &ModuleId) -> usize {
        match self.criticality {
            CriticalityPolicy::Direct => self.graph.dependents(id).map_or(0, BTreeSet::len),
            CriticalityPolicy::Transitive => self.impact(id).len(),
        }
    }

    /// A load order covering every module.
    #[must_use]
    pub fn load_order(&self) -> &[ModuleId] {
        &self.load_order
    }

    /// Counters from building the graph.
    #[must_use]
    pub fn build_stats(&self) -> BuildStats {
        self.build_stats
    }

    /// When the snapshot was produced.
    #[must_use]
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Publication sequence number (0 for the startup snapshot).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Direct dependencies of `id`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `id` is not in the graph.
    pub fn dependencies(&self, id: &ModuleId) -> Result<Vec<ModuleId>> {
        self.graph
            .dependencies(id)
            .map(|deps| deps.iter().cloned().collect())
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Direct dependents of `id`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `id` is not in the graph.
    pub fn dependents(&self, id: &ModuleId) -> Result<Vec<ModuleId>> {
        self.graph
            .dependents(id)
            .map(|deps| deps.iter().cloned().collect())
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Everything that would be affected if `id` changed or failed.
    #[must_use]
    pub fn impact(&self, id: &ModuleId) -> BTreeSet<ModuleId> {
        impact_of(&self.graph, id)
    }

    /// Convert to the persisted form.
    #[must_use]
    pub fn to_record(&self) -> SnapshotRecord {
        SnapshotRecord {
            graph: self
                .graph
                .forward()
                .iter()
                .map(|(id, deps)| (id.clone(), deps.iter().cloned().collect()))
                .collect(),
            cycles: self.cycles.clone(),
            critical_path: self.critical_path.clone(),
            load_order: self.load_order.clone(),
            generated_at: self.generated_at,
            nodes: self.graph.nodes().to_vec(),
            metadata: SnapshotMetadata {
                cycles_truncated: self.cycles_truncated,
                cyclic_members: self.cyclic_members.iter().cloned().collect(),
                node_count: self.graph.node_count(),
                edge_count: self.graph.edge_count(),
                self_loops_dropped: self.build_stats.self_loops_dropped,
                duplicate_signals: self.build_stats.duplicate_signals,
                criticality: self.criticality,
            },
        }
    }

    /// Restore a snapshot from its persisted form.
    ///
    /// Derived artifacts are taken from the record as stored. Cycle membership
    /// is recomputed from the graph so it stays exact for older records.
    ///
    /// # Errors
    ///
    /// Returns `Error::GraphInvariantViolation` if the restored graph is
    /// inconsistent.
    pub fn from_record(record: SnapshotRecord) -> Result<Self> {
        let nodes = if record.nodes.is_empty() {
            record.graph.keys().cloned().collect()
        } else {
            record.nodes
        };
        let graph = Graph::from_adjacency(&nodes, &record.graph);
        graph.check_mirrors()?;
        let cyclic = cyclic_members(&graph);

        Ok(Self {
            build_stats: BuildStats {
                signals_seen: graph.edge_count(),
                self_loops_dropped: record.metadata.self_loops_dropped,
                duplicate_signals: record.metadata.duplicate_signals,
            },
            graph,
            cycles: record.cycles,
            cycles_truncated: record.metadata.cycles_truncated,
            cyclic_members: cyclic,
            critical_path: record.critical_path,
            criticality: record.metadata.criticality,
            load_order: record.load_order,
            generated_at: record.generated_at,
            generation: 0,
        })
    }
}

/// Persisted snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Module -> sorted list of its dependencies
    pub graph: BTreeMap<ModuleId, Vec<ModuleId>>,

    /// Cycles, each a closed walk
    pub cycles: Vec<Cycle>,

    /// Top-K most critical modules
    pub critical_path: Vec<ModuleId>,

    /// Load order covering every module
    pub load_order: Vec<ModuleId>,

    /// When the snapshot was produced
    pub generated_at: DateTime<Utc>,

    /// Modules in discovery order
    #[serde(default)]
    pub nodes: Vec<ModuleId>,

    /// Diagnostics
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

/// Diagnostic metadata stored alongside a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotMetadata {
    /// The cycle list may be incomplete
    pub cycles_truncated: bool,

    /// Modules on at least one cycle
    pub cyclic_members: Vec<ModuleId>,

    /// Number of modules
    pub node_count: usize,

    /// Number of edges
    pub edge_count: usize,

    /// Self-loop signals dropped during the build
    pub self_loops_dropped: usize,

    /// Duplicate signals merged during the build
    pub duplicate_signals: usize,

    /// Policy used for the critical path
    pub criticality: CriticalityPolicy,
}
