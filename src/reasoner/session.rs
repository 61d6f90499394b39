//! Per-query session state: id, cancellation flag and lookup memo.

use crate::cache::NeighborCache;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// External cancellation flag, checked by the reasoner between hops.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One reasoning session. The cache lives and dies with the session.
pub struct Session {
    id: Uuid,
    cancel: CancelSignal,
    cache: Arc<NeighborCache>,
}

impl Session {
    pub fn new(cache_capacity: usize, cancel: CancelSignal) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel,
            cache: Arc::new(NeighborCache::new(cache_capacity)),
        }
    }

    /// Log correlation id; never part of query output.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn cache(&self) -> Arc<NeighborCache> {
        Arc::clone(&self.cache)
    }
}
