//! Load entity embeddings from the SQLite graph database into a [`FlatIndex`].
//!
//! Embeddings are stored in `entities.embedding` as little-endian f32 BLOBs.
//! Rows whose BLOB is malformed, holds NaN or infinite components, or whose
//! dimension disagrees with the first valid row are skipped with a warning
//! rather than failing the load.

use super::{FlatIndex, Metric};
use crate::db::Db;
use crate::error::{Result, RiskchainError};

/// Parse embedding BLOB to Vec<f32>
///
/// Returns None if the length is not a multiple of 4.
pub fn parse_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }

    blob.chunks(4)
        .map(|bytes| {
            let arr: [u8; 4] = bytes.try_into().ok()?;
            Some(f32::from_le_bytes(arr))
        })
        .collect()
}

/// Convert an embedding to its BLOB form (raw bytes, little-endian)
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Build an index from every embedded entity in the database.
///
/// `expected_dimension`, when set, rejects a database whose embeddings were
/// produced by a different model.
pub async fn load_index(db: &Db, metric: Metric, expected_dimension: Option<usize>) -> Result<FlatIndex> {
    let start = std::time::Instant::now();

    let rows = db
        .with_read_only(|conn| {
            let mut stmt = conn.prepare(
                "SELECT entity_id, embedding FROM entities \
                 WHERE embedding IS NOT NULL ORDER BY entity_id",
            )?;
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let entity_id: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                out.push((entity_id, blob));
            }
            Ok::<Vec<(String, Vec<u8>)>, RiskchainError>(out)
        })
        .await?;

    let mut dimension = expected_dimension;
    let mut entries = Vec::with_capacity(rows.len());
    for (entity_id, blob) in rows {
        let embedding = match parse_embedding(&blob) {
            Some(e) if !e.is_empty() => e,
            _ => {
                log::warn!("Skipping malformed embedding for {}", entity_id);
                continue;
            }
        };
        if embedding.iter().any(|x| !x.is_finite()) {
            log::warn!("Skipping non-finite embedding for {}", entity_id);
            continue;
        }
        match dimension {
            Some(d) if d != embedding.len() => {
                log::warn!(
                    "Skipping embedding for {}: dimension {} != {}",
                    entity_id,
                    embedding.len(),
                    d
                );
                continue;
            }
            Some(_) => {}
            None => dimension = Some(embedding.len()),
        }
        entries.push((entity_id, embedding));
    }

    let index = match dimension {
        Some(d) if entries.is_empty() => FlatIndex::new(d, metric),
        _ => FlatIndex::from_entries(metric, entries)?,
    };
    log::info!(
        "Vector index loaded: {} embeddings (dim {}) in {:?}",
        super::VectorIndex::len(&index),
        super::VectorIndex::dimension(&index),
        start.elapsed()
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::vector::VectorIndex;
    use rusqlite::params;
    use tempfile::TempDir;

    #[test]
    fn test_parse_embedding_valid() {
        let test_floats = vec![1.0f32, 2.0f32, 3.0f32, 4.0f32];
        let blob = embedding_to_blob(&test_floats);

        let parsed = parse_embedding(&blob).unwrap();
        assert_eq!(parsed.len(), 4);
        for (original, parsed) in test_floats.iter().zip(parsed.iter()) {
            assert!((original - parsed).abs() < 1e-6);
        }
    }

    #[test]
    fn test_parse_embedding_invalid_length() {
        let blob = vec![0u8, 1, 2, 3, 4];
        assert!(parse_embedding(&blob).is_none());
    }

    #[test]
    fn test_parse_embedding_empty() {
        let parsed = parse_embedding(&[]);
        assert_eq!(parsed.unwrap().len(), 0);
    }

    async fn setup_db() -> (Db, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("graph.db"));
        db.with_connection(|conn| schema::ensure_schema(conn)).await.unwrap();
        db.with_connection(|conn| {
            let rows: Vec<(&str, Option<Vec<u8>>)> = vec![
                ("a", Some(embedding_to_blob(&[1.0, 0.0]))),
                ("b", Some(embedding_to_blob(&[0.0, 1.0]))),
                ("bad", Some(vec![1u8, 2, 3])),
                ("inf", Some(embedding_to_blob(&[f32::INFINITY, 0.0, 0.0]))),
                ("nan", Some(embedding_to_blob(&[f32::NAN, 1.0]))),
                ("wide", Some(embedding_to_blob(&[1.0, 0.0, 0.0]))),
                ("plain", None),
            ];
            for (id, blob) in rows {
                conn.execute(
                    "INSERT INTO entities (entity_id, kind, embedding) VALUES (?1, 'supplier', ?2)",
                    params![id, blob],
                )?;
            }
            Ok(())
        })
        .await
        .unwrap();
        (db, temp_dir)
    }

    #[tokio::test]
    async fn test_load_index_skips_invalid_rows() {
        let (db, _temp) = setup_db().await;
        let index = load_index(&db, Metric::Cosine, None).await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), 2);
        let hits = index.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(hits[0].0, "a");
    }

    #[tokio::test]
    async fn test_load_index_expected_dimension() {
        let (db, _temp) = setup_db().await;
        let index = load_index(&db, Metric::Cosine, Some(3)).await.unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.embedding("wide").is_some());
        assert!(index.embedding("inf").is_none());
    }

    #[tokio::test]
    async fn test_load_index_skips_non_finite_rows() {
        let (db, _temp) = setup_db().await;
        let index = load_index(&db, Metric::Cosine, None).await.unwrap();
        assert!(index.embedding("nan").is_none());
        assert!(index.embedding("inf").is_none());
        let hits = index.search(&[0.0, 1.0], 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|(_, score)| score.is_finite()));
    }
}
