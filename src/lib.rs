pub mod aggregate;
pub mod cache;
pub mod candidates;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod eval;
pub mod graph;
pub mod http;
pub mod model;
pub mod reasoner;
pub mod snapshot;
pub mod vector;

pub use aggregate::{aggregate, aggregate_score, RiskChain};
pub use config::Config;
pub use engine::{Backends, Engine, EngineSettings, ReasoningQuery, ReasoningReport};
pub use error::{Result, RiskchainError};
pub use graph::{GraphBackend, MemoryGraph, SqliteGraph};
pub use model::{Direction, Entity, EntityKind, Path, Relation, RelationKind};
pub use reasoner::CancelSignal;
pub use vector::{FlatIndex, Metric, VectorIndex};
