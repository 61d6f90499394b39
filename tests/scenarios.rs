mod common;

use common::{edge, engine, scenario_a, supplier};
use riskchain::model::Origin;
use riskchain::{EngineSettings, Entity, EntityKind, ReasoningQuery, RiskchainError};

#[tokio::test]
async fn two_hop_chain_scores_with_decay() {
    let (entities, relations) = scenario_a();
    let engine = engine(entities, relations, EngineSettings::default());

    let report = engine
        .reason(ReasoningQuery::new("supplier_1").with_max_hops(2).with_score_threshold(0.05))
        .await
        .unwrap();

    let top = &report.chains[0];
    assert_eq!(top.terminal, "transport_B");
    assert_eq!(top.entity_path, vec!["supplier_1", "facility_A", "transport_B"]);
    // 0.9 * 0.85 * 0.8 * 0.85
    assert!((top.aggregate_score - 0.5202).abs() < 1e-3, "got {}", top.aggregate_score);
    assert_eq!(report.stats.hops_completed, 2);
    assert_eq!(report.stats.failed_expansions, 0);
}

#[tokio::test]
async fn absent_seed_returns_no_partial_results() {
    let (entities, relations) = scenario_a();
    let engine = engine(entities, relations, EngineSettings::default());

    let err = engine.reason(ReasoningQuery::new("unknown_supplier")).await.unwrap_err();
    assert!(matches!(err, RiskchainError::SeedNotFound(id) if id == "unknown_supplier"));
}

#[tokio::test]
async fn converging_paths_combine_with_noisy_or() {
    let entities = vec![supplier("s"), supplier("a"), supplier("b"), supplier("t")];
    let relations = vec![
        edge("r1", "s", "a", 1.0),
        edge("r2", "a", "t", 0.5),
        edge("r3", "s", "b", 1.0),
        edge("r4", "b", "t", 0.4),
    ];
    let engine = engine(entities, relations, EngineSettings::default());

    let mut query = ReasoningQuery::new("s").with_max_hops(2);
    query.decay_factor = Some(1.0);
    let report = engine.reason(query).await.unwrap();

    assert_eq!(report.chains.len(), 1);
    let chain = &report.chains[0];
    assert_eq!(chain.terminal, "t");
    assert_eq!(chain.paths.len(), 2);
    assert!((chain.aggregate_score - 0.70).abs() < 1e-9);
    assert!(chain.aggregate_score > chain.paths[0].score);
    assert!((chain.confidence.lower - 0.5).abs() < 1e-9);
    assert!((chain.confidence.upper - 0.70).abs() < 1e-9);
    // the unit-weight prefixes outscore their extensions
    assert_eq!(chain.alternatives.len(), 2);
}

#[tokio::test]
async fn beam_width_one_keeps_only_the_best_branch() {
    let entities = ["s", "a", "b", "c", "x", "y", "z"].iter().map(|id| supplier(id)).collect();
    let relations = vec![
        edge("r1", "s", "a", 0.9),
        edge("r2", "s", "b", 0.5),
        edge("r3", "s", "c", 0.3),
        edge("r4", "a", "x", 0.8),
        edge("r5", "b", "y", 0.8),
        edge("r6", "c", "z", 0.8),
    ];
    let engine = engine(entities, relations, EngineSettings::default());

    let report = engine
        .reason(ReasoningQuery::new("s").with_max_hops(2).with_beam_width(1))
        .await
        .unwrap();

    let terminals: Vec<&str> = report.chains.iter().map(|c| c.terminal.as_str()).collect();
    assert_eq!(terminals, vec!["x"]);
    assert_eq!(report.chains[0].entity_path, vec!["s", "a", "x"]);
    assert_eq!(report.stats.pruned_by_width, 2);
    // hop 1 expands s, hop 2 expands a only
    assert_eq!(report.stats.expansions, 2);
}

#[tokio::test]
async fn vector_candidates_reach_unconnected_entities() {
    let entities = vec![
        Entity::new("s", EntityKind::Supplier).with_embedding(vec![1.0, 0.0]),
        Entity::new("a", EntityKind::Facility).with_embedding(vec![0.0, 1.0]),
        Entity::new("v", EntityKind::Facility).with_embedding(vec![1.0, 0.0]),
    ];
    let relations = vec![edge("r1", "s", "a", 0.9)];
    let engine = engine(entities, relations, EngineSettings::default());

    let report = engine
        .reason(ReasoningQuery::new("s").with_max_hops(1).with_query_vector(vec![1.0, 0.0]))
        .await
        .unwrap();

    let top = &report.chains[0];
    assert_eq!(top.terminal, "v");
    assert_eq!(top.paths[0].steps[0].origin, Origin::Vector);
    assert!((top.aggregate_score - 0.85).abs() < 1e-6);

    // graph edge blended with zero similarity: (0.6 * 0.9 + 0.4 * 0.0) * 0.85
    let linked = report.chains.iter().find(|c| c.terminal == "a").unwrap();
    assert_eq!(linked.paths[0].steps[0].origin, Origin::Both);
    assert!((linked.aggregate_score - 0.459).abs() < 1e-6);
}

#[tokio::test]
async fn seed_alias_and_target_filter() {
    let (entities, relations) = scenario_a();
    let engine = engine(entities, relations, EngineSettings::default());

    let mut query = ReasoningQuery::new("Supplier 1 Inc.").with_max_hops(2);
    query.target_entity_id = Some("facility_A".to_string());
    let report = engine.reason(query).await.unwrap();

    assert_eq!(report.seed_entity_id, "supplier_1");
    assert_eq!(report.chains.len(), 1);
    assert_eq!(report.chains[0].terminal, "facility_A");
    assert!((report.chains[0].aggregate_score - 0.765).abs() < 1e-9);
}
