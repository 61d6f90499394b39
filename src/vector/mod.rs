//! Vector index: nearest-neighbor lookup over entity embeddings.
//!
//! The index is built once (from a snapshot or the SQLite `entities` table)
//! and is read-only afterwards, so one instance can be shared by every
//! concurrent reasoning session.

mod flat;
pub mod store;

pub use flat::FlatIndex;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Largest `k` accepted by [`VectorIndex::search`].
pub const MAX_K: usize = 100;

/// Similarity function, fixed at index construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    #[default]
    Cosine,
    InnerProduct,
}

impl Metric {
    /// Similarity between two equal-length vectors, clamped into [0,1].
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        let raw = match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::InnerProduct => inner_product(a, b),
        };
        clamp_unit(raw)
    }
}

/// Read interface over an embedding index.
pub trait VectorIndex: Send + Sync {
    /// Top-`k` entities by similarity, strictly descending, ties by entity id ascending.
    ///
    /// Fails with `IndexEmpty` when nothing is loaded and `DimensionMismatch`
    /// when `query` has the wrong length.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>>;

    /// Similarity of `query` to one entity, `None` if the entity has no embedding.
    fn similarity(&self, query: &[f32], entity_id: &str) -> Result<Option<f32>>;

    /// Stored embedding of an entity.
    fn embedding(&self, entity_id: &str) -> Option<Vec<f32>>;

    /// Embedding dimension D.
    fn dimension(&self) -> usize;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Compute cosine similarity between two vectors
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Clamp into [0,1]; NaN becomes 0.
pub fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
