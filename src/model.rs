//! Shared data model: entities, relations, candidates and paths.
//!
//! Entities and relations are produced by external ingestion and are
//! immutable for the lifetime of a reasoning session.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Entity type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Supplier,
    Product,
    Facility,
    TransportRoute,
    Other,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Supplier => "supplier",
            EntityKind::Product => "product",
            EntityKind::Facility => "facility",
            EntityKind::TransportRoute => "transport-route",
            EntityKind::Other => "other",
        }
    }
}

impl FromStr for EntityKind {
    type Err = std::convert::Infallible;

    /// Unknown labels map to `Other`; graph stores often use `Company`/`Route` style labels.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Ok(match normalized.as_str() {
            "supplier" | "company" => EntityKind::Supplier,
            "product" => EntityKind::Product,
            "facility" | "plant" | "warehouse" => EntityKind::Facility,
            "transport-route" | "route" => EntityKind::TransportRoute,
            _ => EntityKind::Other,
        })
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    Supplies,
    Transports,
    DependsOn,
    Owns,
    Other,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Supplies => "supplies",
            RelationKind::Transports => "transports",
            RelationKind::DependsOn => "depends-on",
            RelationKind::Owns => "owns",
            RelationKind::Other => "other",
        }
    }
}

impl FromStr for RelationKind {
    type Err = std::convert::Infallible;

    /// Accepts `depends-on`, `depends_on` and `DEPENDS_ON`; unknown labels map to `Other`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Ok(match normalized.as_str() {
            "supplies" => RelationKind::Supplies,
            "transports" => RelationKind::Transports,
            "depends-on" => RelationKind::DependsOn,
            "owns" => RelationKind::Owns,
            _ => RelationKind::Other,
        })
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Attribute map; ordered so serialized output is stable.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A node of the supply-chain graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes: Attributes::new(),
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// A directed edge (source --kind--> target) with a confidence weight in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub relation_id: String,
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

impl Relation {
    pub fn new(
        relation_id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        kind: RelationKind,
        weight: f64,
    ) -> Self {
        Self {
            relation_id: relation_id.into(),
            source: source.into(),
            target: target.into(),
            kind,
            weight,
            attributes: Attributes::new(),
        }
    }

    /// The endpoint that is not `from`. For a self-loop both ends are `from`.
    pub fn other_end(&self, from: &str) -> &str {
        if self.source == from {
            &self.target
        } else {
            &self.source
        }
    }
}

/// Traversal direction for neighbor lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
    Both,
}

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Vector,
    Graph,
    Both,
}

/// An entity reached from a frontier terminal during one expansion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub entity_id: String,
    pub origin: Origin,
    /// Similarity to the query vector in [0,1]; 0 when not embedded.
    pub similarity: f64,
    /// Strongest relation linking the terminal to this entity (graph / both origin).
    pub relation: Option<Relation>,
    /// Hop depth at which the graph reached this entity.
    pub depth: Option<usize>,
}

/// One hop of a path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathStep {
    pub entity_id: String,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
    pub similarity: f64,
    pub edge_score: f64,
}

/// A simple path from the seed; `score` accumulates multiplicatively.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    pub seed: String,
    pub steps: Vec<PathStep>,
    pub score: f64,
}

impl Path {
    /// Length-0 path at the seed.
    pub fn seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            steps: Vec::new(),
            score: 1.0,
        }
    }

    pub fn hops(&self) -> usize {
        self.steps.len()
    }

    pub fn terminal(&self) -> &str {
        self.steps
            .last()
            .map(|s| s.entity_id.as_str())
            .unwrap_or(self.seed.as_str())
    }

    /// Seed followed by every step entity.
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.seed.as_str()).chain(self.steps.iter().map(|s| s.entity_id.as_str()))
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.entity_ids().any(|id| id == entity_id)
    }

    /// Extend by one hop, returning a new path.
    pub fn extend(&self, step: PathStep, score: f64) -> Path {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend(self.steps.iter().cloned());
        steps.push(step);
        Path {
            seed: self.seed.clone(),
            steps,
            score,
        }
    }

    /// True when `self` is a strict prefix of `other` (same seed, fewer hops).
    pub fn is_proper_prefix_of(&self, other: &Path) -> bool {
        self.seed == other.seed
            && self.steps.len() < other.steps.len()
            && self
                .steps
                .iter()
                .zip(other.steps.iter())
                .all(|(a, b)| a.entity_id == b.entity_id)
    }

    /// Ranking order: score descending, then entity id sequence ascending.
    pub fn rank_cmp(&self, other: &Path) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.terminal().cmp(other.terminal()))
            .then_with(|| self.entity_ids().cmp(other.entity_ids()))
    }
}
