mod common;

use common::{edge, engine, faulty_engine, mesh, scenario_a, supplier, FaultyGraph};
use riskchain::{CancelSignal, EngineSettings, MemoryGraph, ReasoningQuery, Relation};
use std::sync::Arc;
use std::time::Duration;

fn branching_graph() -> MemoryGraph {
    let entities = ["s", "a", "b", "x", "y"].iter().map(|id| supplier(id)).collect();
    let relations: Vec<Relation> = vec![
        edge("r1", "s", "a", 0.9),
        edge("r2", "s", "b", 0.8),
        edge("r3", "a", "x", 0.9),
        edge("r4", "b", "y", 0.9),
    ];
    MemoryGraph::new(entities, relations).unwrap()
}

fn short_timeout() -> EngineSettings {
    EngineSettings {
        backend_timeout: Duration::from_millis(50),
        ..EngineSettings::default()
    }
}

fn terminals(report: &riskchain::ReasoningReport) -> Vec<&str> {
    report.chains.iter().map(|c| c.terminal.as_str()).collect()
}

#[tokio::test]
async fn timed_out_expansion_is_skipped() {
    let graph = FaultyGraph::new(branching_graph()).slow("b", Duration::from_millis(400));
    let engine = faulty_engine(graph, short_timeout());

    let report = engine.reason(ReasoningQuery::new("s").with_max_hops(2)).await.unwrap();

    assert_eq!(report.stats.failed_expansions, 1);
    assert_eq!(report.stats.hops_completed, 2);
    let found = terminals(&report);
    assert!(found.contains(&"x"));
    assert!(found.contains(&"b"));
    assert!(!found.contains(&"y"));
}

#[tokio::test]
async fn failed_expansion_does_not_change_other_scores() {
    let healthy = faulty_engine(FaultyGraph::new(branching_graph()), EngineSettings::default());
    let degraded = faulty_engine(FaultyGraph::new(branching_graph()).failing("b"), EngineSettings::default());

    let query = ReasoningQuery::new("s").with_max_hops(2);
    let full = healthy.reason(query.clone()).await.unwrap();
    let partial = degraded.reason(query).await.unwrap();

    assert_eq!(full.stats.failed_expansions, 0);
    assert_eq!(partial.stats.failed_expansions, 1);
    let score = |report: &riskchain::ReasoningReport| {
        report.chains.iter().find(|c| c.terminal == "x").map(|c| c.aggregate_score).unwrap()
    };
    assert_eq!(score(&full), score(&partial));
    assert!((score(&full) - 0.9 * 0.85 * 0.9 * 0.85).abs() < 1e-9);
}

#[tokio::test]
async fn failing_seed_expansion_yields_empty_ranking() {
    let graph = FaultyGraph::new(branching_graph()).failing("s");
    let engine = faulty_engine(graph, EngineSettings::default());

    let report = engine.reason(ReasoningQuery::new("s")).await.unwrap();
    assert!(report.chains.is_empty());
    assert_eq!(report.stats.failed_expansions, 1);
}

#[tokio::test]
async fn cancellation_between_hops_returns_completed_hops() {
    let (entities, relations) = scenario_a();
    let graph = FaultyGraph::new(MemoryGraph::new(entities, relations).unwrap())
        .with_base_delay(Duration::from_millis(200));
    let engine = faulty_engine(graph, EngineSettings::default());

    let cancel = CancelSignal::new();
    let trigger = cancel.clone();
    let (report, _) = tokio::join!(
        engine.reason_with_cancel(ReasoningQuery::new("supplier_1").with_max_hops(3), cancel),
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        }
    );
    let report = report.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.stats.hops_completed, 1);
    assert_eq!(terminals(&report), vec!["facility_A"]);
}

#[tokio::test]
async fn cancelled_before_start_returns_nothing() {
    let (entities, relations) = scenario_a();
    let engine = engine(entities, relations, EngineSettings::default());
    let cancel = CancelSignal::new();
    cancel.cancel();

    let report = engine
        .reason_with_cancel(ReasoningQuery::new("supplier_1"), cancel)
        .await
        .unwrap();
    assert!(report.cancelled);
    assert!(report.chains.is_empty());
    assert_eq!(report.stats.hops_completed, 0);
}

#[tokio::test]
async fn concurrent_queries_share_backends_safely() {
    let (entities, relations) = mesh(24);
    let engine = Arc::new(engine(entities, relations, EngineSettings::default()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .reason(ReasoningQuery::new("e03").with_max_hops(3))
                .await
                .map(|r| r.digest)
        }));
    }

    let mut digests = Vec::new();
    for handle in handles {
        digests.push(handle.await.unwrap().unwrap());
    }
    assert!(digests.windows(2).all(|w| w[0] == w[1]));
}
