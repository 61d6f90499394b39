//! Exact (brute-force) index over an id-ordered embedding map.

use super::{Metric, VectorIndex, MAX_K};
use crate::error::{Result, RiskchainError};
use crate::model::Entity;
use std::collections::BTreeMap;

/// In-memory exact-scan index. Scores every vector per query, which keeps
/// results exact and tie-breaking trivially deterministic.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    vectors: BTreeMap<String, Vec<f32>>,
}

impl FlatIndex {
    /// Create an empty index of the given dimension.
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            vectors: BTreeMap::new(),
        }
    }

    /// Build from `(entity_id, vector)` pairs. Dimension comes from the first
    /// pair; an empty input yields an empty index of dimension 0.
    pub fn from_entries<I>(metric: Metric, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<f32>)>,
    {
        let mut entries = entries.into_iter().peekable();
        let dimension = entries.peek().map(|(_, v)| v.len()).unwrap_or(0);
        let mut index = Self::new(dimension, metric);
        for (id, vector) in entries {
            index.insert(id, vector)?;
        }
        Ok(index)
    }

    /// Build from every embedded entity.
    pub fn from_entities(metric: Metric, entities: &[Entity]) -> Result<Self> {
        Self::from_entries(
            metric,
            entities
                .iter()
                .filter_map(|e| e.embedding.clone().map(|v| (e.id.clone(), v))),
        )
    }

    /// Add one vector. Rejects wrong dimensions and non-finite components.
    pub fn insert(&mut self, entity_id: String, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RiskchainError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RiskchainError::InvalidInput(format!(
                "Embedding for {} contains non-finite values",
                entity_id
            )));
        }
        self.vectors.insert(entity_id, vector);
        Ok(())
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if self.vectors.is_empty() {
            return Err(RiskchainError::IndexEmpty);
        }
        if query.len() != self.dimension {
            return Err(RiskchainError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        self.check_query(query)?;
        if k == 0 || k > MAX_K {
            return Err(RiskchainError::InvalidInput(format!(
                "k must be between 1 and {}, got {}",
                MAX_K, k
            )));
        }

        let mut scored: Vec<(String, f32)> = self
            .vectors
            .iter()
            .map(|(id, v)| (id.clone(), self.metric.similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    fn similarity(&self, query: &[f32], entity_id: &str) -> Result<Option<f32>> {
        self.check_query(query)?;
        Ok(self
            .vectors
            .get(entity_id)
            .map(|v| self.metric.similarity(query, v)))
    }

    fn embedding(&self, entity_id: &str) -> Option<Vec<f32>> {
        self.vectors.get(entity_id).cloned()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}
