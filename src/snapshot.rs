//! JSON graph snapshots: `{ "entities": [...], "relations": [...] }`.
//!
//! A snapshot is loaded once into a [`MemoryGraph`] and a [`FlatIndex`]
//! (built from the entities that carry an embedding).

use crate::engine::Backends;
use crate::error::{Result, RiskchainError};
use crate::graph::MemoryGraph;
use crate::model::{Entity, Relation};
use crate::vector::{FlatIndex, Metric, VectorIndex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Snapshot {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Build both in-memory backends. Mixed embedding dimensions are rejected.
    pub fn build(self, metric: Metric) -> Result<(MemoryGraph, FlatIndex)> {
        let index = FlatIndex::from_entities(metric, &self.entities).map_err(|e| match e {
            RiskchainError::DimensionMismatch { expected, got } => RiskchainError::InvalidInput(format!(
                "Snapshot embeddings have mixed dimensions ({} and {})",
                expected, got
            )),
            other => other,
        })?;
        let graph = MemoryGraph::new(self.entities, self.relations)?;
        Ok((graph, index))
    }
}

/// Load a snapshot file into shareable backends.
pub fn load_backends(path: &Path, metric: Metric) -> Result<Backends> {
    let start = std::time::Instant::now();
    let (graph, index) = Snapshot::load(path)?.build(metric)?;
    log::info!(
        "Snapshot {} loaded: {} entities, {} relations, {} embeddings in {:?}",
        path.display(),
        graph.entity_count(),
        graph.relation_count(),
        index.len(),
        start.elapsed()
    );
    Ok(Backends::new(Arc::new(graph), Arc::new(index)))
}
