//! Hybrid candidate generation: vector hits + graph neighbors, merged by entity id.

use crate::cache::neighbor_cache::VectorHits;
use crate::cache::NeighborCache;
use crate::error::{Result, RiskchainError};
use crate::graph::GraphBackend;
use crate::model::{Candidate, Direction, Origin, Relation, RelationKind};
use crate::vector::VectorIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cache key for vector hits anchored on the session query vector.
const QUERY_ANCHOR: &str = "\u{0}query";

/// Which vector anchors the similarity search at each hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorAnchor {
    /// Always the session query vector.
    #[default]
    Query,
    /// The terminal entity's own embedding, falling back to the query vector.
    Terminal,
}

/// Per-session generator knobs.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub vector_top_k: usize,
    pub direction: Direction,
    /// Empty = every relation kind.
    pub relation_kinds: Vec<RelationKind>,
    pub anchor: VectorAnchor,
    pub backend_timeout: Duration,
}

/// Merge graph neighbors and vector hits of `terminal` into one candidate set.
///
/// - Parallel relations to the same neighbor collapse to the strongest one
///   (weight descending, relation id ascending).
/// - An entity found by both sources becomes `Origin::Both` and keeps its similarity.
/// - `terminal` itself never becomes a candidate.
///
/// Output is ordered by entity id.
pub fn merge_candidates(
    terminal: &str,
    relations: &[Relation],
    vector_hits: &[(String, f32)],
    depth: usize,
) -> Vec<Candidate> {
    let mut merged: HashMap<String, Candidate> = HashMap::new();

    for rel in relations {
        let neighbor = rel.other_end(terminal);
        if neighbor == terminal {
            continue;
        }
        merged
            .entry(neighbor.to_string())
            .and_modify(|existing| {
                let stronger = match &existing.relation {
                    Some(current) => {
                        rel.weight > current.weight
                            || (rel.weight == current.weight && rel.relation_id < current.relation_id)
                    }
                    None => true,
                };
                if stronger {
                    existing.relation = Some(rel.clone());
                }
            })
            .or_insert_with(|| Candidate {
                entity_id: neighbor.to_string(),
                origin: Origin::Graph,
                similarity: 0.0,
                relation: Some(rel.clone()),
                depth: Some(depth),
            });
    }

    for (entity_id, similarity) in vector_hits {
        if entity_id == terminal {
            continue;
        }
        let similarity = f64::from(*similarity);
        merged
            .entry(entity_id.clone())
            .and_modify(|existing| {
                existing.origin = Origin::Both;
                existing.similarity = similarity;
            })
            .or_insert_with(|| Candidate {
                entity_id: entity_id.clone(),
                origin: Origin::Vector,
                similarity,
                relation: None,
                depth: None,
            });
    }

    let mut candidates: Vec<Candidate> = merged.into_values().collect();
    candidates.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
    candidates
}

/// Session-bound generator. Backend calls run on the blocking pool under
/// a per-call timeout; lookups are memoized in the session's [`NeighborCache`].
pub struct CandidateGenerator {
    graph: Arc<dyn GraphBackend>,
    index: Arc<dyn VectorIndex>,
    settings: GeneratorSettings,
    cache: Arc<NeighborCache>,
}

impl CandidateGenerator {
    pub fn new(
        graph: Arc<dyn GraphBackend>,
        index: Arc<dyn VectorIndex>,
        settings: GeneratorSettings,
        cache: Arc<NeighborCache>,
    ) -> Self {
        Self {
            graph,
            index,
            settings,
            cache,
        }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Run a blocking backend call with the configured timeout.
    async fn call_blocking<T, F>(&self, operation: &'static str, entity_id: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.settings.backend_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(RiskchainError::Backend(format!("{} task failed: {}", operation, e))),
            Err(_) => Err(RiskchainError::BackendTimeout {
                operation: operation.to_string(),
                entity_id: entity_id.to_string(),
            }),
        }
    }

    pub async fn exists(&self, entity_id: &str) -> Result<bool> {
        let graph = Arc::clone(&self.graph);
        let id = entity_id.to_string();
        self.call_blocking("exists", entity_id, move || graph.exists(&id))
            .await
    }

    pub async fn find_ignore_case(&self, entity_id: &str) -> Result<Option<String>> {
        let graph = Arc::clone(&self.graph);
        let id = entity_id.to_string();
        self.call_blocking("find_ignore_case", entity_id, move || graph.find_ignore_case(&id))
            .await
    }

    async fn neighbors(&self, entity_id: &str) -> Result<Arc<Vec<Relation>>> {
        if let Some(hit) = self.cache.neighbors(entity_id) {
            return Ok(hit);
        }
        let graph = Arc::clone(&self.graph);
        let id = entity_id.to_string();
        let kinds = self.settings.relation_kinds.clone();
        let direction = self.settings.direction;
        let relations = self
            .call_blocking("neighbors", entity_id, move || {
                let filter = if kinds.is_empty() { None } else { Some(kinds.as_slice()) };
                graph.neighbors(&id, filter, direction)
            })
            .await?;
        let relations = Arc::new(relations);
        self.cache.put_neighbors(entity_id, Arc::clone(&relations));
        Ok(relations)
    }

    /// Resolve the anchor vector for `terminal` and its cache key.
    fn anchor(&self, terminal: &str, query: &Arc<Vec<f32>>) -> (String, Arc<Vec<f32>>) {
        if self.settings.anchor == VectorAnchor::Terminal {
            if let Some(own) = self.index.embedding(terminal) {
                return (terminal.to_string(), Arc::new(own));
            }
        }
        (QUERY_ANCHOR.to_string(), Arc::clone(query))
    }

    async fn vector_hits(&self, terminal: &str, key: &str, anchor: Arc<Vec<f32>>) -> Result<VectorHits> {
        if let Some(hit) = self.cache.vector_hits(key) {
            return Ok(hit);
        }
        let index = Arc::clone(&self.index);
        let k = self.settings.vector_top_k;
        let hits = self
            .call_blocking("vector_search", terminal, move || index.search(&anchor, k))
            .await?;
        let hits = Arc::new(hits);
        self.cache.put_vector_hits(key, Arc::clone(&hits));
        Ok(hits)
    }

    /// Candidates reachable from `terminal` at hop `depth`.
    ///
    /// Without a query vector only graph neighbors are produced.
    pub async fn generate(&self, terminal: &str, depth: usize, query: Option<&Arc<Vec<f32>>>) -> Result<Vec<Candidate>> {
        let start = Instant::now();

        let Some(query) = query else {
            let relations = self.neighbors(terminal).await?;
            return Ok(merge_candidates(terminal, &relations, &[], depth));
        };

        let (key, anchor) = self.anchor(terminal, query);
        let (relations, hits) = tokio::join!(
            self.neighbors(terminal),
            self.vector_hits(terminal, &key, Arc::clone(&anchor))
        );
        let relations = relations?;
        let hits = hits?;

        let mut candidates = merge_candidates(terminal, &relations, &hits, depth);

        // Graph-only entities that are independently embedded get their real similarity
        let graph_only: Vec<String> = candidates
            .iter()
            .filter(|c| c.origin == Origin::Graph)
            .map(|c| c.entity_id.clone())
            .collect();
        if !graph_only.is_empty() {
            let index = Arc::clone(&self.index);
            let similarities = self
                .call_blocking("similarity", terminal, move || {
                    graph_only
                        .into_iter()
                        .map(|id| Ok((index.similarity(&anchor, &id)?, id)))
                        .collect::<Result<Vec<_>>>()
                })
                .await?;
            let by_id: HashMap<String, f32> = similarities
                .into_iter()
                .filter_map(|(sim, id)| sim.map(|s| (id, s)))
                .collect();
            for candidate in candidates.iter_mut() {
                if let Some(sim) = by_id.get(&candidate.entity_id) {
                    candidate.similarity = f64::from(*sim);
                }
            }
        }

        log::debug!(
            "Candidates for {} at hop {}: {} ({} graph relations, {} vector hits) in {:?}",
            terminal,
            depth,
            candidates.len(),
            relations.len(),
            hits.len(),
            start.elapsed()
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use crate::model::{Entity, EntityKind};
    use crate::vector::{FlatIndex, Metric};

    fn rel(id: &str, src: &str, dst: &str, weight: f64) -> Relation {
        Relation::new(id, src, dst, RelationKind::Supplies, weight)
    }

    #[test]
    fn test_merge_both_origin_keeps_similarity() {
        let relations = vec![rel("r1", "s", "a", 0.7), rel("r2", "s", "b", 0.4)];
        let hits = vec![("a".to_string(), 0.8f32), ("c".to_string(), 0.6f32)];
        let merged = merge_candidates("s", &relations, &hits, 1);

        let ids: Vec<_> = merged.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(merged[0].origin, Origin::Both);
        assert!((merged[0].similarity - 0.8).abs() < 1e-6);
        assert_eq!(merged[0].relation.as_ref().unwrap().relation_id, "r1");
        assert_eq!(merged[1].origin, Origin::Graph);
        assert_eq!(merged[1].similarity, 0.0);
        assert_eq!(merged[1].depth, Some(1));
        assert_eq!(merged[2].origin, Origin::Vector);
        assert!(merged[2].relation.is_none());
        assert!(merged[2].depth.is_none());
    }

    #[test]
    fn test_merge_keeps_strongest_parallel_relation() {
        let relations = vec![
            rel("r3", "s", "a", 0.5),
            rel("r2", "s", "a", 0.9),
            rel("r1", "s", "a", 0.9),
        ];
        let merged = merge_candidates("s", &relations, &[], 1);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].relation.as_ref().unwrap().relation_id, "r1");
    }

    #[test]
    fn test_merge_excludes_terminal() {
        let relations = vec![rel("loop", "s", "s", 0.9)];
        let hits = vec![("s".to_string(), 1.0f32)];
        assert!(merge_candidates("s", &relations, &hits, 1).is_empty());
    }

    #[test]
    fn test_merge_incoming_uses_other_end() {
        let relations = vec![rel("r1", "upstream", "s", 0.6)];
        let merged = merge_candidates("s", &relations, &[], 2);
        assert_eq!(merged[0].entity_id, "upstream");
    }

    fn generator(anchor: VectorAnchor) -> CandidateGenerator {
        let entities = vec![
            Entity::new("s", EntityKind::Supplier).with_embedding(vec![1.0, 0.0]),
            Entity::new("a", EntityKind::Facility).with_embedding(vec![0.0, 1.0]),
            Entity::new("b", EntityKind::Product),
            Entity::new("v", EntityKind::TransportRoute).with_embedding(vec![0.6, 0.8]),
        ];
        let index = FlatIndex::from_entities(Metric::Cosine, &entities).unwrap();
        let graph = MemoryGraph::new(
            entities,
            vec![rel("r1", "s", "a", 0.9), rel("r2", "s", "b", 0.5)],
        )
        .unwrap();
        CandidateGenerator::new(
            Arc::new(graph),
            Arc::new(index),
            GeneratorSettings {
                vector_top_k: 2,
                direction: Direction::Outgoing,
                relation_kinds: Vec::new(),
                anchor,
                backend_timeout: Duration::from_secs(2),
            },
            Arc::new(NeighborCache::new(16)),
        )
    }

    #[tokio::test]
    async fn test_generate_graph_only_without_query() {
        let gen = generator(VectorAnchor::Query);
        let candidates = gen.generate("s", 1, None).await.unwrap();
        let ids: Vec<_> = candidates.iter().map(|c| c.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(candidates.iter().all(|c| c.origin == Origin::Graph));
    }

    #[tokio::test]
    async fn test_generate_hybrid_with_query() {
        let gen = generator(VectorAnchor::Query);
        let query = Arc::new(vec![0.0, 1.0]);
        let candidates = gen.generate("s", 1, Some(&query)).await.unwrap();

        // top-2 for [0,1]: a (1.0), v (0.8)
        let a = candidates.iter().find(|c| c.entity_id == "a").unwrap();
        assert_eq!(a.origin, Origin::Both);
        let v = candidates.iter().find(|c| c.entity_id == "v").unwrap();
        assert_eq!(v.origin, Origin::Vector);
        assert!((v.similarity - 0.8).abs() < 1e-6);
        // b is graph-only and not embedded
        let b = candidates.iter().find(|c| c.entity_id == "b").unwrap();
        assert_eq!(b.origin, Origin::Graph);
        assert_eq!(b.similarity, 0.0);
    }

    #[tokio::test]
    async fn test_generate_terminal_anchor() {
        let gen = generator(VectorAnchor::Terminal);
        let query = Arc::new(vec![0.0, 1.0]);
        let candidates = gen.generate("s", 1, Some(&query)).await.unwrap();
        // anchored on s = [1,0]: top-2 is s (dropped) and v (0.6)
        let v = candidates.iter().find(|c| c.entity_id == "v").unwrap();
        assert!((v.similarity - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_generate_missing_entity() {
        let gen = generator(VectorAnchor::Query);
        let err = gen.generate("ghost", 1, None).await.unwrap_err();
        assert!(matches!(err, RiskchainError::EntityNotFound(_)));
        assert!(!gen.exists("ghost").await.unwrap());
    }
}
