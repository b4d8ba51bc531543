//! Concrete dependency scenarios, checked through the snapshot and through a
//! running engine.

use modgraph::ModuleId;
use modgraph::engine::DependencyEngine;
use modgraph::graph::{Cycle, find_cycles};
use modgraph::signals::StaticSignalProvider;
use rstest::rstest;
use std::collections::BTreeSet;
use std::sync::Arc;

mod common;
use common::{ids, quiet_config, snapshot_of, within};

#[test]
fn chain_loads_leaves_first() {
    let snapshot = snapshot_of(&[("A", "B"), ("B", "C")]);

    assert_eq!(snapshot.load_order(), ids(&["C", "B", "A"]).as_slice());
    assert!(snapshot.cycles().is_empty());
    assert!(!snapshot.cycles_truncated());
    assert_eq!(
        snapshot.impact(&"C".into()),
        ids(&["A", "B"]).into_iter().collect::<BTreeSet<_>>()
    );
}

#[test]
fn mutual_dependency_reported_once() {
    let snapshot = snapshot_of(&[("A", "B"), ("B", "A")]);

    let expected = Cycle::from_members(ids(&["A", "B"])).unwrap();
    assert_eq!(snapshot.cycles(), &[expected]);
    assert_eq!(snapshot.cycles()[0].walk(), ids(&["A", "B", "A"]).as_slice());
    assert_eq!(snapshot.load_order(), ids(&["A", "B"]).as_slice());
    assert!(snapshot.in_cycle(&"A".into()));
}

#[test]
fn cyclic_modules_load_after_acyclic_ones() {
    // C and D form a loop that also needs E; F is independent.
    let snapshot = snapshot_of(&[("C", "D"), ("D", "C"), ("D", "E"), ("F", "E")]);

    let order = snapshot.load_order();
    assert_eq!(order.len(), 4);
    assert_eq!(&order[..2], ids(&["E", "F"]).as_slice());
    assert_eq!(&order[2..], ids(&["C", "D"]).as_slice());
}

#[rstest]
#[case::shared_parent(&[("A", "B"), ("A", "C"), ("D", "A")], "A")]
#[case::b_gains_a_second_dependent(&[("A", "B"), ("A", "C"), ("D", "A"), ("D", "B")], "B")]
fn most_critical_module(#[case] pairs: &[(&str, &str)], #[case] expected: &str) {
    let snapshot = snapshot_of(pairs);
    assert_eq!(snapshot.top_critical(1), vec![ModuleId::from(expected)]);
}

#[test]
fn impact_of_unknown_module_is_empty() {
    let snapshot = snapshot_of(&[("A", "B")]);
    assert!(snapshot.impact(&"ghost".into()).is_empty());
    assert!(snapshot.dependencies(&"ghost".into()).is_err());
}

#[test]
fn three_module_loop_is_a_closed_walk() {
    let snapshot = snapshot_of(&[("A", "B"), ("B", "C"), ("C", "A")]);
    let report = find_cycles(snapshot.graph(), 1_000).unwrap();

    assert_eq!(report.cycles.len(), 1);
    assert_eq!(report.cycles[0].walk(), ids(&["A", "B", "C", "A"]).as_slice());
}

#[tokio::test]
async fn engine_answers_every_query() {
    let provider = Arc::new(StaticSignalProvider::from_pairs([
        ("A", "B"),
        ("A", "C"),
        ("D", "A"),
    ]));
    let engine = DependencyEngine::start(provider, None, quiet_config())
        .await
        .unwrap();
    within(engine.wait_for_generation(1)).await.unwrap();

    let a = ModuleId::from("A");
    assert_eq!(engine.get_dependencies(&a), ids(&["B", "C"]));
    assert_eq!(engine.get_dependents(&a), ids(&["D"]));
    assert_eq!(engine.get_critical_path(1), ids(&["A"]));
    assert_eq!(engine.get_load_order(), ids(&["B", "C", "A", "D"]));
    assert_eq!(
        engine.analyze_impact(&"B".into()),
        ids(&["A", "D"]).into_iter().collect::<BTreeSet<_>>()
    );
    assert!(engine.list_cycles().is_empty());
    assert!(!engine.in_cycle(&a));
    assert!(engine.analyze_impact(&"ghost".into()).is_empty());
    assert!(engine.get_dependents(&"ghost".into()).is_empty());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn module_set_change_is_picked_up() {
    let provider = Arc::new(StaticSignalProvider::from_pairs([("music", "voice")]));
    let engine = DependencyEngine::start(Arc::clone(&provider) as _, None, quiet_config())
        .await
        .unwrap();
    within(engine.wait_for_generation(1)).await.unwrap();
    assert!(engine.list_cycles().is_empty());

    provider
        .declare("voice", modgraph::DependencySignal::explicit("music"))
        .await;
    engine.notify_module_set_changed();
    within(engine.wait_for_generation(2)).await.unwrap();

    assert_eq!(engine.list_cycles().len(), 1);
    assert!(engine.in_cycle(&"voice".into()));

    engine.shutdown().await.unwrap();
}
