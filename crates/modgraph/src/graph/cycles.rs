//! Cycle detection.
//!
//! [`find_cycles`] runs a three-colour depth-first search and records a cycle
//! whenever it meets a back edge (an edge into a node still on the DFS path).
//! Cycles are deduplicated by their sorted node set, so the same loop reached
//! from different entry points is reported once.
//!
//! The search is bounded by a node-visit budget. When the budget runs out the
//! report is marked `truncated` and the cycles found so far are returned.
//!
//! The elementary-cycle list depends on traversal order. For an exact answer
//! to "is this module part of any cycle", use [`cyclic_members`], which is
//! derived from strongly connected components.

use super::Graph;
use crate::domain::ModuleId;
use crate::error::Result;
use petgraph::algo::tarjan_scc;
use serde::{Deserialize, Serialize};
use std::collections::btree_set;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

static NO_NEIGHBORS: BTreeSet<ModuleId> = BTreeSet::new();

/// A closed walk `[n0, n1, ..., nk, n0]` where each consecutive pair is an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cycle(Vec<ModuleId>);

impl Cycle {
    /// Build a cycle from its members in walk order, closing the loop.
    ///
    /// Returns `None` for an empty member list.
    #[must_use]
    pub fn from_members(members: Vec<ModuleId>) -> Option<Self> {
        let first = members.first()?.clone();
        let mut walk = members;
        walk.push(first);
        Some(Self(walk))
    }

    /// The closed walk, with the first node repeated at the end.
    #[must_use]
    pub fn walk(&self) -> &[ModuleId] {
        &self.0
    }

    /// The distinct members of the cycle in walk order.
    #[must_use]
    pub fn members(&self) -> &[ModuleId] {
        &self.0[..self.0.len().saturating_sub(1)]
    }

    /// Number of distinct members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members().len()
    }

    /// Whether the cycle has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members().is_empty()
    }

    /// Whether `id` is a member of this cycle.
    #[must_use]
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.members().contains(id)
    }

    /// Canonical form used for deduplication: the sorted members.
    fn canonical_key(&self) -> Vec<ModuleId> {
        let mut key = self.members().to_vec();
        key.sort();
        key
    }
}

/// Result of a cycle search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Unique cycles in discovery order
    pub cycles: Vec<Cycle>,

    /// Whether the search stopped early because the visit budget ran out
    pub truncated: bool,

    /// Node visits spent
    pub visits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current DFS path
    Gray,
    /// Fully explored
    Black,
}

/// Find cycles with a budgeted depth-first search.
///
/// Start nodes are taken in discovery order and neighbours in sorted order, so
/// the result is deterministic for a given graph. Edges to identifiers without
/// a node entry are followed to a dead end.
///
/// # Errors
///
/// Returns `Error::GraphInvariantViolation` if the forward and reverse maps
/// disagree. No other input is rejected.
pub fn find_cycles(graph: &Graph, visit_budget: usize) -> Result<CycleReport> {
    graph.check_mirrors()?;

    let mut colors: HashMap<&ModuleId, Color> = HashMap::with_capacity(graph.node_count());
    let mut seen: HashSet<Vec<ModuleId>> = HashSet::new();
    let mut report = CycleReport::default();

    'search: for start in graph.nodes() {
        if colors.contains_key(start) {
            continue;
        }
        if report.visits >= visit_budget {
            report.truncated = true;
            break;
        }

        report.visits += 1;
        colors.insert(start, Color::Gray);
        let mut path: Vec<&ModuleId> = vec![start];
        let mut stack = vec![neighbors(graph, start)];

        while let Some(frontier) = stack.last_mut() {
            let Some(next) = frontier.next() else {
                if let Some(done) = path.pop() {
                    colors.insert(done, Color::Black);
                }
                stack.pop();
                continue;
            };

            match colors.get(next) {
                None => {
                    if report.visits >= visit_budget {
                        report.truncated = true;
                        break 'search;
                    }
                    report.visits += 1;
                    colors.insert(next, Color::Gray);
                    path.push(next);
                    stack.push(neighbors(graph, next));
                }
                Some(Color::Gray) => {
                    // Back edge: the cycle is the path from `next` to the top.
                    if let Some(start_idx) = path.iter().position(|id| *id == next) {
                        let members: Vec<ModuleId> =
                            path[start_idx..].iter().map(|id| (*id).clone()).collect();
                        if let Some(cycle) = Cycle::from_members(members) {
                            if seen.insert(cycle.canonical_key()) {
                                report.cycles.push(cycle);
                            }
                        }
                    }
                }
                Some(Color::Black) => {}
            }
        }
    }

    if report.truncated {
        warn!(
            visits = report.visits,
            budget = visit_budget,
            cycles_found = report.cycles.len(),
            "Cycle search truncated; cycle list may be incomplete"
        );
    } else {
        debug!(
            visits = report.visits,
            cycles = report.cycles.len(),
            "Cycle search complete"
        );
    }

    Ok(report)
}

fn neighbors<'g>(graph: &'g Graph, id: &ModuleId) -> btree_set::Iter<'g, ModuleId> {
    graph.dependencies(id).unwrap_or(&NO_NEIGHBORS).iter()
}

/// All modules that sit on at least one cycle.
///
/// Computed from strongly connected components, so the answer is exact
/// regardless of the cycle search budget.
#[must_use]
pub fn cyclic_members(graph: &Graph) -> BTreeSet<ModuleId> {
    let digraph = graph.to_digraph();

    tarjan_scc(&digraph)
        .into_iter()
        .filter(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|&node| digraph.contains_edge(node, node))
        })
        .flatten()
        .map(|node| digraph[node].clone())
        .collect()
}
