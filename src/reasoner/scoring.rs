//! Path scoring policies: per-hop decay and graph/vector edge combination.

use crate::error::{Result, RiskchainError};
use crate::model::{Candidate, Origin};
use serde::{Deserialize, Serialize};

/// Per-hop multiplicative penalty, non-increasing in hop depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DecayPolicy {
    /// Same factor at every hop, so an h-hop path carries `factor^h`.
    Geometric { factor: f64 },
    /// `max(floor, 1 - rate * hop)`
    Linear { rate: f64, floor: f64 },
}

impl Default for DecayPolicy {
    fn default() -> Self {
        DecayPolicy::Geometric { factor: 0.85 }
    }
}

impl DecayPolicy {
    /// Multiplier applied when extending a path to `hop` (1-based).
    pub fn at(&self, hop: usize) -> f64 {
        match *self {
            DecayPolicy::Geometric { factor } => factor,
            DecayPolicy::Linear { rate, floor } => (1.0 - rate * hop as f64).max(floor),
        }
    }

    /// Same policy with a different geometric factor (per-query override).
    ///
    /// A linear policy has no single factor to replace, so the override is
    /// rejected instead of being dropped.
    pub fn with_factor(self, factor: f64) -> Result<Self> {
        match self {
            DecayPolicy::Geometric { .. } => Ok(DecayPolicy::Geometric { factor }),
            DecayPolicy::Linear { .. } => Err(RiskchainError::InvalidInput(
                "decay_factor applies only to geometric decay; the configured decay is linear".to_string(),
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            DecayPolicy::Geometric { factor } => factor > 0.0 && factor <= 1.0,
            DecayPolicy::Linear { rate, floor } => {
                (0.0..=1.0).contains(&rate) && floor > 0.0 && floor <= 1.0
            }
        };
        if ok {
            Ok(())
        } else {
            Err(RiskchainError::InvalidInput(format!("Invalid decay policy: {:?}", self)))
        }
    }
}

/// Weights used when a candidate was reached by both graph and vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinationPolicy {
    pub graph_weight: f64,
    pub vector_weight: f64,
}

impl Default for CombinationPolicy {
    fn default() -> Self {
        Self {
            graph_weight: 0.6,
            vector_weight: 0.4,
        }
    }
}

impl CombinationPolicy {
    pub fn validate(&self) -> Result<()> {
        let in_range = |w: f64| (0.0..=1.0).contains(&w);
        if !in_range(self.graph_weight) || !in_range(self.vector_weight) {
            return Err(RiskchainError::InvalidInput(format!(
                "Combination weights must be in [0,1], got graph={} vector={}",
                self.graph_weight, self.vector_weight
            )));
        }
        if self.graph_weight + self.vector_weight <= 0.0 {
            return Err(RiskchainError::InvalidInput(
                "Combination weights must not both be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Edge contribution of a candidate, in [0,1].
    pub fn edge_score(&self, candidate: &Candidate) -> f64 {
        let weight = candidate.relation.as_ref().map(|r| r.weight).unwrap_or(0.0);
        let score = match candidate.origin {
            Origin::Graph => weight,
            Origin::Vector => candidate.similarity,
            Origin::Both => {
                let total = self.graph_weight + self.vector_weight;
                (self.graph_weight * weight + self.vector_weight * candidate.similarity) / total
            }
        };
        score.clamp(0.0, 1.0)
    }
}
