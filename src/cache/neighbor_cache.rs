//! Session-scoped memo of backend lookups.
//!
//! One cache is created per reasoning session and dropped with it; it is
//! never shared between sessions, so a session only ever sees the backend
//! state it read itself.

use crate::model::Relation;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Vector hits for one anchor: `(entity_id, similarity)` in index order.
pub type VectorHits = Arc<Vec<(String, f32)>>;

/// Bounded LRU over neighbor lists (keyed by entity id) and vector hits
/// (keyed by anchor: an entity id, or the session query itself).
pub struct NeighborCache {
    neighbors: Mutex<LruCache<String, Arc<Vec<Relation>>>>,
    vector_hits: Mutex<LruCache<String, VectorHits>>,
}

impl NeighborCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            neighbors: Mutex::new(LruCache::new(cap)),
            vector_hits: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn neighbors(&self, entity_id: &str) -> Option<Arc<Vec<Relation>>> {
        self.neighbors.lock().unwrap().get(entity_id).cloned()
    }

    pub fn put_neighbors(&self, entity_id: &str, relations: Arc<Vec<Relation>>) {
        self.neighbors
            .lock()
            .unwrap()
            .put(entity_id.to_string(), relations);
    }

    pub fn vector_hits(&self, anchor: &str) -> Option<VectorHits> {
        self.vector_hits.lock().unwrap().get(anchor).cloned()
    }

    pub fn put_vector_hits(&self, anchor: &str, hits: VectorHits) {
        self.vector_hits.lock().unwrap().put(anchor.to_string(), hits);
    }

    /// (neighbor entries, vector-hit entries)
    pub fn len(&self) -> (usize, usize) {
        (
            self.neighbors.lock().unwrap().len(),
            self.vector_hits.lock().unwrap().len(),
        )
    }
}
