//! Load order via Kahn's algorithm.
//!
//! A module's in-degree is the number of modules it depends on. Modules with
//! nothing left to wait for are emitted first; emitting a module releases its
//! dependents. Nodes that are never released (they sit on a cycle, or depend
//! transitively on one) are appended afterwards in discovery order, so the
//! result always covers every node exactly once.

use super::Graph;
use crate::domain::ModuleId;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Compute a total load order.
///
/// For every edge `a -> b` outside any cycle, `b` precedes `a`. Modules that
/// could not be ordered are placed after all orderable ones, deterministically.
#[must_use]
pub fn load_order(graph: &Graph) -> Vec<ModuleId> {
    let mut in_degree: HashMap<&ModuleId, usize> = graph
        .nodes()
        .iter()
        .map(|id| (id, graph.dependencies(id).map_or(0, |deps| deps.len())))
        .collect();

    let mut queue: VecDeque<&ModuleId> = graph
        .nodes()
        .iter()
        .filter(|id| in_degree.get(id).copied() == Some(0))
        .collect();

    let mut order: Vec<ModuleId> = Vec::with_capacity(graph.node_count());
    let mut placed: HashSet<&ModuleId> = HashSet::with_capacity(graph.node_count());

    while let Some(id) = queue.pop_front() {
        order.push(id.clone());
        placed.insert(id);

        let Some(dependents) = graph.dependents(id) else {
            continue;
        };
        for dependent in dependents {
            // Only a transition from one to zero releases a node, so a reverse
            // entry without a forward mirror cannot queue it twice.
            if let Some(degree) = in_degree.get_mut(dependent).filter(|d| **d > 0) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    let leftover = graph.node_count().saturating_sub(order.len());
    if leftover > 0 {
        debug!(
            leftover,
            "Appending modules blocked by cycles in discovery order"
        );
        order.extend(
            graph
                .nodes()
                .iter()
                .filter(|id| !placed.contains(id))
                .cloned(),
        );
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Signal;
    use crate::graph::GraphBuilder;
    use crate::graph::test_support::{graph_of, ids};
    use std::collections::{BTreeMap, BTreeSet};

    fn position(order: &[ModuleId], id: &str) -> usize {
        order.iter().position(|m| m.as_str() == id).unwrap()
    }

    #[test]
    fn chain_loads_dependencies_first() {
        let graph = graph_of(&[("A", "B"), ("B", "C")]);
        assert_eq!(load_order(&graph), ids(&["C", "B", "A"]));
    }

    #[test]
    fn no_edges_keeps_discovery_order() {
        let mut builder = GraphBuilder::new();
        for id in ["q", "a", "m"] {
            builder.add_module(id.into());
        }
        let (graph, _) = builder.finish();
        assert_eq!(load_order(&graph), ids(&["q", "a", "m"]));
    }

    #[test]
    fn diamond_respects_every_edge() {
        let graph = graph_of(&[("app", "ui"), ("app", "net"), ("ui", "core"), ("net", "core")]);
        let order = load_order(&graph);
        assert_eq!(order.len(), 4);
        for (from, to) in graph.edges() {
            assert!(position(&order, to.as_str()) < position(&order, from.as_str()));
        }
    }

    #[test]
    fn cyclic_nodes_follow_acyclic_nodes() {
        let graph = graph_of(&[("A", "B"), ("B", "A"), ("C", "D")]);
        let order = load_order(&graph);
        assert_eq!(order, ids(&["D", "C", "A", "B"]));
    }

    #[test]
    fn dependents_of_cycles_are_appended_in_discovery_order() {
        let graph = Graph::build([
            Signal::new("plugin", "x"),
            Signal::new("x", "y"),
            Signal::new("y", "x"),
            Signal::new("solo", "base"),
        ]);
        let order = load_order(&graph);
        assert_eq!(order, ids(&["base", "solo", "plugin", "x", "y"]));
    }

    #[test]
    fn output_is_stable_across_runs() {
        let graph = graph_of(&[("a", "b"), ("b", "c"), ("c", "a"), ("d", "e")]);
        assert_eq!(load_order(&graph), load_order(&graph));
    }

    #[test]
    fn unmirrored_reverse_entry_does_not_repeat_a_node() {
        let mut forward = BTreeMap::new();
        forward.insert(ModuleId::from("a"), BTreeSet::new());
        forward.insert(ModuleId::from("b"), BTreeSet::new());
        let mut reverse = BTreeMap::new();
        reverse.insert(ModuleId::from("a"), BTreeSet::from([ModuleId::from("b")]));
        reverse.insert(ModuleId::from("b"), BTreeSet::new());

        let graph = Graph::from_raw_parts(ids(&["a", "b"]), forward, reverse);
        assert_eq!(load_order(&graph), ids(&["a", "b"]));
    }
}
