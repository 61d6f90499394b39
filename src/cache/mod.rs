pub mod embedding_cache;
pub mod neighbor_cache;

pub use embedding_cache::EmbeddingCache;
pub use neighbor_cache::NeighborCache;
