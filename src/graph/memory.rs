//! In-memory graph backend built from entity and relation lists.

use super::{kind_allowed, GraphBackend};
use crate::error::{Result, RiskchainError};
use crate::model::{Direction, Entity, Relation, RelationKind};
use std::collections::{HashMap, HashSet};

/// Immutable adjacency-list graph. Relations are stored sorted by id, so
/// adjacency lists (which hold indexes into `relations`) are sorted too.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    entities: HashMap<String, Entity>,
    relations: Vec<Relation>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl MemoryGraph {
    /// Build and validate. Every relation endpoint must be a known entity,
    /// weights must lie in [0,1] and relation ids must be unique.
    pub fn new(entities: Vec<Entity>, mut relations: Vec<Relation>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(entities.len());
        for entity in entities {
            if by_id.contains_key(&entity.id) {
                return Err(RiskchainError::InvalidInput(format!(
                    "Duplicate entity id: {}",
                    entity.id
                )));
            }
            by_id.insert(entity.id.clone(), entity);
        }

        relations.sort_by(|a, b| a.relation_id.cmp(&b.relation_id));
        let mut seen = HashSet::with_capacity(relations.len());
        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, rel) in relations.iter().enumerate() {
            if !seen.insert(rel.relation_id.clone()) {
                return Err(RiskchainError::InvalidInput(format!(
                    "Duplicate relation id: {}",
                    rel.relation_id
                )));
            }
            if !(0.0..=1.0).contains(&rel.weight) {
                return Err(RiskchainError::InvalidInput(format!(
                    "Relation {} weight {} outside [0,1]",
                    rel.relation_id, rel.weight
                )));
            }
            for endpoint in [&rel.source, &rel.target] {
                if !by_id.contains_key(endpoint) {
                    return Err(RiskchainError::InvalidInput(format!(
                        "Relation {} references unknown entity {}",
                        rel.relation_id, endpoint
                    )));
                }
            }
            outgoing.entry(rel.source.clone()).or_default().push(idx);
            incoming.entry(rel.target.clone()).or_default().push(idx);
        }

        Ok(Self {
            entities: by_id,
            relations,
            outgoing,
            incoming,
        })
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// All entities, id-ordered.
    pub fn entities(&self) -> Vec<&Entity> {
        let mut all: Vec<&Entity> = self.entities.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl GraphBackend for MemoryGraph {
    fn neighbors(
        &self,
        entity_id: &str,
        kinds: Option<&[RelationKind]>,
        direction: Direction,
    ) -> Result<Vec<Relation>> {
        if !self.entities.contains_key(entity_id) {
            return Err(RiskchainError::EntityNotFound(entity_id.to_string()));
        }

        let empty = Vec::new();
        let out = self.outgoing.get(entity_id).unwrap_or(&empty);
        let inc = self.incoming.get(entity_id).unwrap_or(&empty);

        let mut indexes: Vec<usize> = match direction {
            Direction::Outgoing => out.clone(),
            Direction::Incoming => inc.clone(),
            Direction::Both => out.iter().chain(inc.iter()).copied().collect(),
        };
        // Self-loops appear in both lists
        indexes.sort_unstable();
        indexes.dedup();

        Ok(indexes
            .into_iter()
            .map(|idx| &self.relations[idx])
            .filter(|rel| kind_allowed(rel.kind, kinds))
            .cloned()
            .collect())
    }

    fn exists(&self, entity_id: &str) -> Result<bool> {
        Ok(self.entities.contains_key(entity_id))
    }

    fn entity(&self, entity_id: &str) -> Result<Option<Entity>> {
        Ok(self.entities.get(entity_id).cloned())
    }

    fn find_ignore_case(&self, entity_id: &str) -> Result<Option<String>> {
        Ok(self
            .entities
            .keys()
            .filter(|id| id.eq_ignore_ascii_case(entity_id))
            .min()
            .cloned())
    }
}
