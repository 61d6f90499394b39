//! Graph adapter: typed read interface over the supply-chain multigraph.
//!
//! Backends are external stores viewed read-only. Neighbor lists come back
//! ordered by relation id so every consumer sees the same order.

mod memory;
mod normalize;
mod sqlite;

pub use memory::MemoryGraph;
pub use normalize::normalize_entity_id;
pub use sqlite::SqliteGraph;

use crate::error::Result;
use crate::model::{Direction, Entity, Relation, RelationKind};

/// Read-only view over an externally managed graph.
pub trait GraphBackend: Send + Sync {
    /// Relations touching `entity_id` in `direction`, optionally restricted to `kinds`.
    ///
    /// Fails with `EntityNotFound` when the entity is absent.
    fn neighbors(
        &self,
        entity_id: &str,
        kinds: Option<&[RelationKind]>,
        direction: Direction,
    ) -> Result<Vec<Relation>>;

    fn exists(&self, entity_id: &str) -> Result<bool>;

    fn entity(&self, entity_id: &str) -> Result<Option<Entity>>;

    /// Stored id equal to `entity_id` ignoring ASCII case. When several
    /// match, the smallest id wins.
    fn find_ignore_case(&self, entity_id: &str) -> Result<Option<String>>;

    fn is_healthy(&self) -> bool {
        true
    }
}

/// True when `kind` passes an optional kind filter (empty filter = all kinds).
pub(crate) fn kind_allowed(kind: RelationKind, kinds: Option<&[RelationKind]>) -> bool {
    match kinds {
        Some(list) if !list.is_empty() => list.contains(&kind),
        _ => true,
    }
}
