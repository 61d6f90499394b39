//! SQLite graph backend over the `entities` / `relations` tables.

use super::{kind_allowed, GraphBackend};
use crate::db::Db;
use crate::error::{Result, RiskchainError};
use crate::model::{Attributes, Direction, Entity, EntityKind, Relation, RelationKind};
use crate::vector::store::parse_embedding;
use rusqlite::{Connection, OptionalExtension, Row};

/// Read-only adapter. Each call opens a `query_only` connection, so calls are
/// blocking; the reasoner runs them on the blocking pool under a timeout.
#[derive(Debug, Clone)]
pub struct SqliteGraph {
    db: Db,
}

fn parse_attributes(json: Option<String>) -> Result<Attributes> {
    match json {
        Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(Attributes::new()),
    }
}

fn relation_from_row(row: &Row<'_>) -> rusqlite::Result<(Relation, Option<String>)> {
    let relation_type: String = row.get(2)?;
    let kind = relation_type.parse::<RelationKind>().unwrap_or(RelationKind::Other);
    Ok((
        Relation {
            relation_id: row.get(0)?,
            source: row.get(1)?,
            kind,
            target: row.get(3)?,
            weight: row.get(4)?,
            attributes: Attributes::new(),
        },
        row.get(5)?,
    ))
}

impl SqliteGraph {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn entity_exists(conn: &Connection, entity_id: &str) -> Result<bool> {
        let mut stmt = conn.prepare_cached("SELECT 1 FROM entities WHERE entity_id = ?1")?;
        Ok(stmt.exists([entity_id])?)
    }
}

impl GraphBackend for SqliteGraph {
    fn neighbors(
        &self,
        entity_id: &str,
        kinds: Option<&[RelationKind]>,
        direction: Direction,
    ) -> Result<Vec<Relation>> {
        let conn = self.db.open_read_only()?;
        if !Self::entity_exists(&conn, entity_id)? {
            return Err(RiskchainError::EntityNotFound(entity_id.to_string()));
        }

        let predicate = match direction {
            Direction::Outgoing => "source_entity = ?1",
            Direction::Incoming => "target_entity = ?1",
            Direction::Both => "(source_entity = ?1 OR target_entity = ?1)",
        };
        // Kind filtering happens after parsing: stored labels vary in case and separators.
        let query = format!(
            "SELECT relation_id, source_entity, relation_type, target_entity, weight, attributes_json \
             FROM relations WHERE {} ORDER BY relation_id",
            predicate
        );

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([entity_id], relation_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            let (mut relation, attributes_json) = row?;
            if !kind_allowed(relation.kind, kinds) {
                continue;
            }
            if !(0.0..=1.0).contains(&relation.weight) {
                return Err(RiskchainError::Backend(format!(
                    "Relation {} weight {} outside [0,1]",
                    relation.relation_id, relation.weight
                )));
            }
            relation.attributes = parse_attributes(attributes_json)?;
            out.push(relation);
        }
        Ok(out)
    }

    fn exists(&self, entity_id: &str) -> Result<bool> {
        let conn = self.db.open_read_only()?;
        Self::entity_exists(&conn, entity_id)
    }

    fn entity(&self, entity_id: &str) -> Result<Option<Entity>> {
        let conn = self.db.open_read_only()?;
        let row = conn
            .query_row(
                "SELECT entity_id, kind, attributes_json, embedding FROM entities WHERE entity_id = ?1",
                [entity_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<Vec<u8>>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, kind, attributes_json, embedding)) = row else {
            return Ok(None);
        };
        Ok(Some(Entity {
            id,
            kind: kind.parse::<EntityKind>().unwrap_or(EntityKind::Other),
            attributes: parse_attributes(attributes_json)?,
            embedding: embedding.as_deref().and_then(parse_embedding),
        }))
    }

    fn find_ignore_case(&self, entity_id: &str) -> Result<Option<String>> {
        let conn = self.db.open_read_only()?;
        let found = conn
            .query_row(
                "SELECT entity_id FROM entities WHERE entity_id = ?1 COLLATE NOCASE \
                 ORDER BY entity_id LIMIT 1",
                [entity_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found)
    }

    fn is_healthy(&self) -> bool {
        match self.db.open_read_only() {
            Ok(conn) => conn
                .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get::<_, i64>(0))
                .is_ok(),
            Err(e) => {
                log::warn!("Graph database unavailable: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::vector::store::embedding_to_blob;
    use rusqlite::params;
    use tempfile::TempDir;

    async fn setup_test_db_with_relations() -> (SqliteGraph, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Db::new(&db_path);
        db.with_connection(|conn| schema::ensure_schema(conn)).await.unwrap();
        // a -> b -> c, a -> d, d -> a
        db.with_connection(|conn| {
            for (id, kind) in [("a", "supplier"), ("b", "facility"), ("c", "TRANSPORT_ROUTE"), ("d", "product")] {
                conn.execute(
                    "INSERT INTO entities (entity_id, kind, attributes_json, embedding) VALUES (?1, ?2, ?3, ?4)",
                    params![id, kind, r#"{"region":"apac","tier":1}"#, embedding_to_blob(&[1.0, 0.5])],
                )?;
            }
            let relations = [
                ("r1", "a", "SUPPLIES", "b", 0.9),
                ("r2", "b", "transports", "c", 0.8),
                ("r3", "a", "depends_on", "d", 0.5),
                ("r4", "d", "owns", "a", 0.4),
            ];
            for (rid, src, kind, dst, weight) in relations {
                conn.execute(
                    "INSERT INTO relations (relation_id, source_entity, relation_type, target_entity, weight, attributes_json) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![rid, src, kind, dst, weight, None::<String>],
                )?;
            }
            Ok::<(), RiskchainError>(())
        })
        .await
        .unwrap();
        (SqliteGraph::new(db), temp_dir)
    }

    #[tokio::test]
    async fn test_outgoing_neighbors() {
        let (graph, _temp) = setup_test_db_with_relations().await;
        let relations = graph.neighbors("a", None, Direction::Outgoing).unwrap();
        assert_eq!(relations.len(), 2);
        let targets: Vec<_> = relations.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["b", "d"]);
        assert_eq!(relations[0].kind, RelationKind::Supplies);
        assert_eq!(relations[1].kind, RelationKind::DependsOn);
    }

    #[tokio::test]
    async fn test_incoming_and_both() {
        let (graph, _temp) = setup_test_db_with_relations().await;
        let incoming = graph.neighbors("a", None, Direction::Incoming).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source, "d");

        let both = graph.neighbors("a", None, Direction::Both).unwrap();
        let ids: Vec<_> = both.iter().map(|r| r.relation_id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3", "r4"]);
    }

    #[tokio::test]
    async fn test_relation_kind_filter() {
        let (graph, _temp) = setup_test_db_with_relations().await;
        let relations = graph
            .neighbors("a", Some(&[RelationKind::DependsOn]), Direction::Outgoing)
            .unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].target, "d");
    }

    #[tokio::test]
    async fn test_missing_entity() {
        let (graph, _temp) = setup_test_db_with_relations().await;
        assert!(!graph.exists("nonexistent").unwrap());
        let err = graph.neighbors("nonexistent", None, Direction::Outgoing).unwrap_err();
        assert!(matches!(err, RiskchainError::EntityNotFound(_)));
    }

    #[tokio::test]
    async fn test_entity_lookup() {
        let (graph, _temp) = setup_test_db_with_relations().await;
        let entity = graph.entity("c").unwrap().unwrap();
        assert_eq!(entity.kind, EntityKind::TransportRoute);
        assert_eq!(entity.embedding, Some(vec![1.0, 0.5]));
        assert!(entity.attributes.contains_key("region"));
        assert!(graph.entity("zzz").unwrap().is_none());
        assert!(graph.is_healthy());
    }

    #[tokio::test]
    async fn test_find_ignore_case() {
        let (graph, _temp) = setup_test_db_with_relations().await;
        assert_eq!(graph.find_ignore_case("B").unwrap().as_deref(), Some("b"));
        assert!(graph.find_ignore_case("e").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unhealthy_without_schema() {
        let temp_dir = TempDir::new().unwrap();
        let graph = SqliteGraph::new(Db::new(temp_dir.path().join("missing.db")));
        assert!(!graph.is_healthy());
    }
}
