//! Impact analysis.
//!
//! The impact set of a module is every module that would directly or
//! indirectly stop working if it were removed or broke: everything reachable
//! by following reverse (dependent) edges.

use super::Graph;
use crate::domain::ModuleId;
use std::collections::{BTreeSet, VecDeque};

/// Compute the impact set of `id` with a breadth-first traversal over
/// reverse edges.
///
/// The query node itself is never part of the result, even when it sits on a
/// cycle. An unknown module has no known dependents, so the result is empty.
#[must_use]
pub fn impact_of(graph: &Graph, id: &ModuleId) -> BTreeSet<ModuleId> {
    let mut impacted: BTreeSet<ModuleId> = BTreeSet::new();
    let Some(direct) = graph.dependents(id) else {
        return impacted;
    };

    let mut queue: VecDeque<&ModuleId> = VecDeque::new();
    for dependent in direct {
        if dependent != id && impacted.insert(dependent.clone()) {
            queue.push_back(dependent);
        }
    }

    while let Some(current) = queue.pop_front() {
        let Some(dependents) = graph.dependents(current) else {
            continue;
        };
        for dependent in dependents {
            if dependent != id && impacted.insert(dependent.clone()) {
                queue.push_back(dependent);
            }
        }
    }

    impacted
}
