//! Dependency graph construction and analysis.
//!
//! ## Edge Direction Convention
//!
//! Edges point from **dependent -> dependency**: `a -> b` means `a` requires `b`
//! to be loaded first.
//!
//! - `forward[a]` holds the modules `a` depends on
//! - `reverse[b]` holds the modules that depend on `b`
//!
//! The two maps are mirror images (`b ∈ forward[a]` iff `a ∈ reverse[b]`). They
//! are only ever populated together by [`GraphBuilder`]; a graph is rebuilt
//! from scratch on every refresh rather than patched in place.
//!
//! ## Algorithms
//!
//! - [`cycles`]: DFS cycle search with a node-visit budget, plus exact cycle
//!   membership from strongly connected components
//! - [`rank`]: criticality ranking by dependent count
//! - [`order`]: load order via Kahn's algorithm
//! - [`impact`]: blast radius via BFS over reverse edges
//!
//! Every algorithm is a pure function over `&Graph`.

pub mod cycles;
pub mod impact;
pub mod order;
pub mod rank;

pub use cycles::{Cycle, CycleReport, cyclic_members, find_cycles};
pub use impact::impact_of;
pub use order::load_order;
pub use rank::{criticality_scores, rank, rank_with};

use crate::domain::{ModuleId, Provenance, Signal};
use crate::error::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Diagnostic information attached to an edge.
///
/// Edge info never influences graph algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeInfo {
    /// Strongest provenance seen for this edge
    pub provenance: Provenance,

    /// Highest confidence seen for this edge
    pub confidence: Option<f32>,
}

impl EdgeInfo {
    /// Fold a duplicate signal into this edge: explicit wins over inferred and
    /// the highest confidence is kept.
    fn merge(&mut self, provenance: Provenance, confidence: Option<f32>) {
        if provenance == Provenance::Explicit {
            self.provenance = Provenance::Explicit;
        }
        self.confidence = match (self.confidence, confidence) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Counters collected while building a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Total signals handed to the builder
    pub signals_seen: usize,

    /// Signals dropped because dependent and dependency were the same module
    pub self_loops_dropped: usize,

    /// Signals that repeated an existing edge
    pub duplicate_signals: usize,
}

/// Directed dependency graph with mirrored forward and reverse adjacency.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Nodes in discovery order
    nodes: Vec<ModuleId>,

    /// dependent -> dependencies
    forward: BTreeMap<ModuleId, BTreeSet<ModuleId>>,

    /// dependency -> dependents
    reverse: BTreeMap<ModuleId, BTreeSet<ModuleId>>,

    /// Per-edge diagnostics, keyed by (dependent, dependency)
    edges: BTreeMap<(ModuleId, ModuleId), EdgeInfo>,
}

impl PartialEq for Graph {
    /// Graphs are equal when they have the same nodes in the same discovery
    /// order and the same edges. Edge diagnostics are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.forward == other.forward && self.reverse == other.reverse
    }
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from dependency signals.
    ///
    /// Shorthand for [`GraphBuilder`] when the build statistics are not needed.
    pub fn build(signals: impl IntoIterator<Item = Signal>) -> Self {
        let mut builder = GraphBuilder::new();
        builder.extend(signals);
        builder.finish().0
    }

    /// Rebuild a graph from a `node -> dependencies` mapping.
    ///
    /// `nodes` fixes the discovery order; identifiers that only appear in the
    /// mapping are appended after it in map order.
    pub fn from_adjacency<'a>(
        nodes: impl IntoIterator<Item = &'a ModuleId>,
        adjacency: &BTreeMap<ModuleId, Vec<ModuleId>>,
    ) -> Self {
        let mut builder = GraphBuilder::new();
        for node in nodes {
            builder.add_module(node.clone());
        }
        for (dependent, dependencies) in adjacency {
            builder.add_module(dependent.clone());
            for dependency in dependencies {
                builder.add_signal(Signal::new(dependent.clone(), dependency.clone()));
            }
        }
        builder.finish().0
    }

    /// Nodes in discovery order.
    #[must_use]
    pub fn nodes(&self) -> &[ModuleId] {
        &self.nodes
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    /// Whether the graph has a node with this identifier.
    #[must_use]
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.forward.contains_key(id)
    }

    /// Modules `id` depends on, or `None` if `id` is unknown.
    #[must_use]
    pub fn dependencies(&self, id: &ModuleId) -> Option<&BTreeSet<ModuleId>> {
        self.forward.get(id)
    }

    /// Modules that depend on `id`, or `None` if `id` is unknown.
    #[must_use]
    pub fn dependents(&self, id: &ModuleId) -> Option<&BTreeSet<ModuleId>> {
        self.reverse.get(id)
    }

    /// Forward adjacency (`dependent -> dependencies`).
    #[must_use]
    pub fn forward(&self) -> &BTreeMap<ModuleId, BTreeSet<ModuleId>> {
        &self.forward
    }

    /// Reverse adjacency (`dependency -> dependents`).
    #[must_use]
    pub fn reverse(&self) -> &BTreeMap<ModuleId, BTreeSet<ModuleId>> {
        &self.reverse
    }

    /// Diagnostics for the edge `dependent -> dependency`.
    #[must_use]
    pub fn edge_info(&self, dependent: &ModuleId, dependency: &ModuleId) -> Option<&EdgeInfo> {
        self.edges.get(&(dependent.clone(), dependency.clone()))
    }

    /// Iterate over all edges as `(dependent, dependency)`, sorted.
    pub fn edges(&self) -> impl Iterator<Item = (&ModuleId, &ModuleId)> {
        self.forward
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from, to)))
    }

    /// Verify that forward and reverse adjacency are exact mirrors.
    ///
    /// # Errors
    ///
    /// Returns `Error::GraphInvariantViolation` naming the first node whose
    /// entries disagree.
    pub fn check_mirrors(&self) -> Result<()> {
        for (dependent, dependencies) in &self.forward {
            for dependency in dependencies {
                let mirrored = self
                    .reverse
                    .get(dependency)
                    .is_some_and(|dependents| dependents.contains(dependent));
                if !mirrored {
                    return Err(Error::GraphInvariantViolation {
                        node: dependency.clone(),
                        detail: format!("reverse entry missing for edge {dependent} -> {dependency}"),
                    });
                }
            }
        }

        for (dependency, dependents) in &self.reverse {
            for dependent in dependents {
                let mirrored = self
                    .forward
                    .get(dependent)
                    .is_some_and(|dependencies| dependencies.contains(dependency));
                if !mirrored {
                    return Err(Error::GraphInvariantViolation {
                        node: dependent.clone(),
                        detail: format!("forward entry missing for edge {dependent} -> {dependency}"),
                    });
                }
            }
        }

        Ok(())
    }

    /// Convert to a petgraph `DiGraph` with nodes in discovery order.
    ///
    /// Edges that point at identifiers without a node entry are skipped.
    #[must_use]
    pub fn to_digraph(&self) -> DiGraph<ModuleId, ()> {
        let mut digraph = DiGraph::with_capacity(self.nodes.len(), self.edge_count());
        let mut node_map: HashMap<&ModuleId, NodeIndex> = HashMap::with_capacity(self.nodes.len());

        for id in &self.nodes {
            node_map.insert(id, digraph.add_node(id.clone()));
        }

        for (from, to) in self.edges() {
            if let (Some(&from_node), Some(&to_node)) = (node_map.get(from), node_map.get(to)) {
                digraph.add_edge(from_node, to_node, ());
            }
        }

        digraph
    }

    /// Assemble a graph from raw parts without enforcing the mirror invariant.
    #[cfg(test)]
    pub(crate) fn from_raw_parts(
        nodes: Vec<ModuleId>,
        forward: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
        reverse: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
    ) -> Self {
        Self {
            nodes,
            forward,
            reverse,
            edges: BTreeMap::new(),
        }
    }
}

/// Builds a [`Graph`] from signals, keeping both adjacency maps in step.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: Graph,
    stats: BuildStats,
}

impl GraphBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module, creating an isolated node if it is new.
    pub fn add_module(&mut self, id: ModuleId) -> &mut Self {
        self.ensure_node(&id);
        self
    }

    /// Add one dependency signal.
    ///
    /// Both endpoints become nodes. Self-loops are counted and dropped;
    /// repeated edges are counted and merged.
    pub fn add_signal(&mut self, signal: Signal) -> &mut Self {
        self.stats.signals_seen += 1;
        self.ensure_node(&signal.dependent);
        self.ensure_node(&signal.dependency);

        if signal.dependent == signal.dependency {
            self.stats.self_loops_dropped += 1;
            debug!(module = %signal.dependent, "Dropping self-loop signal");
            return self;
        }

        let key = (signal.dependent, signal.dependency);
        if let Some(info) = self.graph.edges.get_mut(&key) {
            self.stats.duplicate_signals += 1;
            info.merge(signal.provenance, signal.confidence);
            return self;
        }

        let (dependent, dependency) = &key;
        self.graph
            .forward
            .entry(dependent.clone())
            .or_default()
            .insert(dependency.clone());
        self.graph
            .reverse
            .entry(dependency.clone())
            .or_default()
            .insert(dependent.clone());
        self.graph.edges.insert(
            key,
            EdgeInfo {
                provenance: signal.provenance,
                confidence: signal.confidence,
            },
        );
        self
    }

    /// Add every signal from an iterator.
    pub fn extend(&mut self, signals: impl IntoIterator<Item = Signal>) -> &mut Self {
        for signal in signals {
            self.add_signal(signal);
        }
        self
    }

    /// Finish building, returning the graph and its build statistics.
    #[must_use]
    pub fn finish(self) -> (Graph, BuildStats) {
        debug!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            self_loops = self.stats.self_loops_dropped,
            duplicates = self.stats.duplicate_signals,
            "Graph built"
        );
        (self.graph, self.stats)
    }

    fn ensure_node(&mut self, id: &ModuleId) {
        if !self.graph.forward.contains_key(id) {
            self.graph.nodes.push(id.clone());
            self.graph.forward.insert(id.clone(), BTreeSet::new());
            self.graph.reverse.insert(id.clone(), BTreeSet::new());
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{graph_of, ids};
    use super::*;

    #[test]
    fn builder_creates_nodes_for_both_endpoints() {
        let graph = graph_of(&[("a", "b")]);
        assert_eq!(graph.nodes(), ids(&["a", "b"]).as_slice());
        assert!(graph.contains(&"b".into()));
        assert!(graph.dependencies(&"b".into()).unwrap().is_empty());
    }

    #[test]
    fn mirrors_hold_after_build() {
        let graph = graph_of(&[("a", "b"), ("b", "c"), ("a", "c"), ("d", "a")]);
        graph.check_mirrors().unwrap();
        assert_eq!(graph.edge_count(), 4);

        let dependents: Vec<_> = graph.dependents(&"c".into()).unwrap().iter().cloned().collect();
        assert_eq!(dependents, ids(&["a", "b"]));
    }

    #[test]
    fn self_loops_are_dropped_and_counted() {
        let mut builder = GraphBuilder::new();
        builder.add_signal(Signal::new("a", "a"));
        builder.add_signal(Signal::new("a", "b"));
        let (graph, stats) = builder.finish();

        assert_eq!(stats.self_loops_dropped, 1);
        assert_eq!(stats.signals_seen, 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.dependencies(&"a".into()).unwrap().contains(&"a".into()));
    }

    #[test]
    fn duplicate_signals_are_idempotent() {
        let mut builder = GraphBuilder::new();
        builder.add_signal(Signal::new("a", "b").with_provenance(Provenance::Inferred).with_confidence(0.3));
        builder.add_signal(Signal::new("a", "b").with_provenance(Provenance::Inferred).with_confidence(0.7));
        builder.add_signal(Signal::new("a", "b"));
        let (graph, stats) = builder.finish();

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(stats.duplicate_signals, 2);

        let info = graph.edge_info(&"a".into(), &"b".into()).unwrap();
        assert_eq!(info.provenance, Provenance::Explicit);
        assert_eq!(info.confidence, Some(0.7));
    }

    #[test]
    fn isolated_modules_keep_discovery_order() {
        let mut builder = GraphBuilder::new();
        builder.add_module("z".into());
        builder.add_module("y".into());
        builder.add_signal(Signal::new("x", "z"));
        let (graph, _) = builder.finish();

        assert_eq!(graph.nodes(), ids(&["z", "y", "x"]).as_slice());
    }

    #[test]
    fn check_mirrors_reports_missing_reverse_entry() {
        let mut forward = BTreeMap::new();
        forward.insert(ModuleId::from("a"), BTreeSet::from([ModuleId::from("b")]));
        forward.insert(ModuleId::from("b"), BTreeSet::new());
        let mut reverse = BTreeMap::new();
        reverse.insert(ModuleId::from("a"), BTreeSet::new());
        reverse.insert(ModuleId::from("b"), BTreeSet::new());

        let graph = Graph::from_raw_parts(ids(&["a", "b"]), forward, reverse);
        let err = graph.check_mirrors().unwrap_err();
        assert!(matches!(err, Error::GraphInvariantViolation { ref node, .. } if node.as_str() == "b"));
    }

    #[test]
    fn check_mirrors_reports_missing_forward_entry() {
        let mut forward = BTreeMap::new();
        forward.insert(ModuleId::from("a"), BTreeSet::new());
        let mut reverse = BTreeMap::new();
        reverse.insert(ModuleId::from("b"), BTreeSet::from([ModuleId::from("a")]));

        let graph = Graph::from_raw_parts(ids(&["a"]), forward, reverse);
        assert!(graph.check_mirrors().unwrap_err().is_invariant_violation());
    }

    #[test]
    fn from_adjacency_round_trips() {
        let graph = graph_of(&[("a", "b"), ("b", "c"), ("d", "c")]);
        let adjacency: BTreeMap<ModuleId, Vec<ModuleId>> = graph
            .forward()
            .iter()
            .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
            .collect();

        let rebuilt = Graph::from_adjacency(graph.nodes(), &adjacency);
        assert_eq!(rebuilt, graph);
    }

    #[test]
    fn to_digraph_preserves_counts() {
        let graph = graph_of(&[("a", "b"), ("b", "c")]);
        let digraph = graph.to_digraph();
        assert_eq!(digraph.node_count(), 3);
        assert_eq!(digraph.edge_count(), 2);
    }
}
