//! Criticality ranking.
//!
//! A module's criticality score answers "how many modules break if this one is
//! removed". Under [`CriticalityPolicy::Direct`] that is the number of direct
//! dependents; under [`CriticalityPolicy::Transitive`] it is the size of the
//! full impact set.
//!
//! Modules are ordered by descending score with ascending identifier as the
//! tiebreaker, so the ranking is deterministic.

use super::{Graph, impact_of};
use crate::config::CriticalityPolicy;
use crate::domain::ModuleId;

/// Score every node and sort by criticality.
#[must_use]
pub fn criticality_scores(graph: &Graph, policy: CriticalityPolicy) -> Vec<(ModuleId, usize)> {
    let mut scores: Vec<(ModuleId, usize)> = graph
        .nodes()
        .iter()
        .map(|id| {
            let score = match policy {
                CriticalityPolicy::Direct => graph.dependents(id).map_or(0, |d| d.len()),
                CriticalityPolicy::Transitive => impact_of(graph, id).len(),
            };
            (id.clone(), score)
        })
        .collect();

    scores.sort_by(|(a_id, a_score), (b_id, b_score)| b_score.cmp(a_score).then(a_id.cmp(b_id)));
    scores
}

/// The `top_k` most critical modules by direct-dependent count.
///
/// Returns every node when `top_k` exceeds the node count.
#[must_use]
pub fn rank(graph: &Graph, top_k: usize) -> Vec<ModuleId> {
    rank_with(graph, top_k, CriticalityPolicy::Direct)
}

/// The `top_k` most critical modules under the given policy.
#[must_use]
pub fn rank_with(graph: &Graph, top_k: usize, policy: CriticalityPolicy) -> Vec<ModuleId> {
    criticality_scores(graph, policy)
        .into_iter()
        .take(top_k)
        .map(|(id, _)| id)
        .collect()
}
