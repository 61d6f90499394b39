//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use riskchain::error::{Result, RiskchainError};
use riskchain::{
    Backends, Direction, Engine, EngineSettings, Entity, EntityKind, FlatIndex, GraphBackend, MemoryGraph, Metric,
    Relation, RelationKind,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

pub fn supplier(id: &str) -> Entity {
    Entity::new(id, EntityKind::Supplier)
}

pub fn edge(id: &str, source: &str, target: &str, weight: f64) -> Relation {
    Relation::new(id, source, target, RelationKind::Supplies, weight)
}

/// Engine over an in-memory graph; the index holds every embedded entity.
pub fn engine(entities: Vec<Entity>, relations: Vec<Relation>, settings: EngineSettings) -> Engine {
    let index = FlatIndex::from_entities(Metric::Cosine, &entities).unwrap();
    let graph = MemoryGraph::new(entities, relations).unwrap();
    Engine::new(Backends::new(Arc::new(graph), Arc::new(index)), settings)
}

/// `supplier_1 -> facility_A (0.9) -> transport_B (0.8)`
pub fn scenario_a() -> (Vec<Entity>, Vec<Relation>) {
    let entities = vec![
        supplier("supplier_1"),
        Entity::new("facility_A", EntityKind::Facility),
        Entity::new("transport_B", EntityKind::TransportRoute),
    ];
    let relations = vec![
        edge("r1", "supplier_1", "facility_A", 0.9),
        Relation::new("r2", "facility_A", "transport_B", RelationKind::Transports, 0.8),
    ];
    (entities, relations)
}

/// Deterministic pseudo-random graph with cycles and 4-d embeddings.
pub fn mesh(n: usize) -> (Vec<Entity>, Vec<Relation>) {
    let entities: Vec<Entity> = (0..n)
        .map(|i| {
            let kind = match i % 4 {
                0 => EntityKind::Supplier,
                1 => EntityKind::Facility,
                2 => EntityKind::Product,
                _ => EntityKind::TransportRoute,
            };
            Entity::new(format!("e{:02}", i), kind).with_embedding(vec![
                (i % 5) as f32 + 0.5,
                ((i * 3) % 7) as f32,
                1.0,
                (i % 2) as f32,
            ])
        })
        .collect();

    let mut relations = Vec::new();
    for i in 0..n {
        let mut targets = HashSet::new();
        for step in [1, 3, 7] {
            let j = (i * step + 5) % n;
            if j == i || !targets.insert(j) {
                continue;
            }
            let weight = ((i * 37 + j * 11) % 90 + 10) as f64 / 100.0;
            relations.push(edge(&format!("r{:02}_{:02}", i, j), &format!("e{:02}", i), &format!("e{:02}", j), weight));
        }
    }
    (entities, relations)
}

/// Graph wrapper that stalls or fails on chosen entities.
pub struct FaultyGraph {
    inner: MemoryGraph,
    slow: HashMap<String, Duration>,
    failing: HashSet<String>,
    /// Delay applied to every neighbor lookup.
    pub base_delay: Duration,
}

impl FaultyGraph {
    pub fn new(inner: MemoryGraph) -> Self {
        Self {
            inner,
            slow: HashMap::new(),
            failing: HashSet::new(),
            base_delay: Duration::ZERO,
        }
    }

    pub fn slow(mut self, entity_id: &str, delay: Duration) -> Self {
        self.slow.insert(entity_id.to_string(), delay);
        self
    }

    pub fn failing(mut self, entity_id: &str) -> Self {
        self.failing.insert(entity_id.to_string());
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }
}

impl GraphBackend for FaultyGraph {
    fn neighbors(&self, entity_id: &str, kinds: Option<&[RelationKind]>, direction: Direction) -> Result<Vec<Relation>> {
        std::thread::sleep(self.base_delay);
        if let Some(delay) = self.slow.get(entity_id) {
            std::thread::sleep(*delay);
        }
        if self.failing.contains(entity_id) {
            return Err(RiskchainError::Backend(format!("replica unavailable for {}", entity_id)));
        }
        self.inner.neighbors(entity_id, kinds, direction)
    }

    fn exists(&self, entity_id: &str) -> Result<bool> {
        self.inner.exists(entity_id)
    }

    fn entity(&self, entity_id: &str) -> Result<Option<Entity>> {
        self.inner.entity(entity_id)
    }

    fn find_ignore_case(&self, entity_id: &str) -> Result<Option<String>> {
        self.inner.find_ignore_case(entity_id)
    }
}

pub fn faulty_engine(graph: FaultyGraph, settings: EngineSettings) -> Engine {
    Engine::new(
        Backends::new(Arc::new(graph), Arc::new(FlatIndex::new(4, Metric::Cosine))),
        settings,
    )
}
