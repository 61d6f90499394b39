//! Graph database schema.
//!
//! The DDL is compiled into the binary and versioned through SQLite's
//! `user_version` pragma, so `riskchain migrate` works from any directory and
//! the loader can tell a half-built database from a current one.

use rusqlite::Connection;
use crate::error::{Result, RiskchainError};

/// Tables the graph adapter and vector loader read.
pub const REQUIRED_TABLES: [&str; 2] = ["entities", "relations"];

struct SchemaStep {
    version: u32,
    label: &'static str,
    ddl: &'static str,
}

/// Ordered by version; each step moves `user_version` from `version - 1`.
const STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    label: "supply_graph",
    ddl: include_str!("../../migrations/001_supply_graph.sql"),
}];

/// What a database file currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStatus {
    pub version: u32,
    pub missing_tables: Vec<String>,
}

impl SchemaStatus {
    pub fn is_ready(&self) -> bool {
        self.version >= latest_version() && self.missing_tables.is_empty()
    }
}

pub fn latest_version() -> u32 {
    STEPS.last().map(|s| s.version).unwrap_or(0)
}

fn user_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version.max(0) as u32)
}

fn missing_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let tables: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(REQUIRED_TABLES
        .iter()
        .filter(|t| !tables.iter().any(|name| name == *t))
        .map(|t| t.to_string())
        .collect())
}

/// Read-only check used before loading a database.
pub fn inspect(conn: &Connection) -> Result<SchemaStatus> {
    Ok(SchemaStatus {
        version: user_version(conn)?,
        missing_tables: missing_tables(conn)?,
    })
}

/// Bring the database up to the latest schema version.
///
/// Each pending step runs in its own transaction together with the version
/// bump. A database stamped with a newer version than this build knows is
/// rejected rather than touched.
pub fn ensure_schema(conn: &mut Connection) -> Result<SchemaStatus> {
    let current = user_version(conn)?;
    if current > latest_version() {
        return Err(RiskchainError::Config(format!(
            "Graph database schema version {} is newer than supported version {}",
            current,
            latest_version()
        )));
    }

    for step in STEPS.iter().filter(|s| s.version > current) {
        log::info!("Applying graph schema v{} ({})", step.version, step.label);
        let tx = conn.transaction()?;
        tx.execute_batch(step.ddl).map_err(|e| {
            RiskchainError::Config(format!("Graph schema v{} ({}) failed: {}", step.version, step.label, e))
        })?;
        // PRAGMA does not accept bound parameters
        tx.execute_batch(&format!("PRAGMA user_version = {}", step.version))?;
        tx.commit()?;
    }

    let status = inspect(conn)?;
    if !status.missing_tables.is_empty() {
        return Err(RiskchainError::Config(format!(
            "Graph schema v{} is missing tables: {}",
            status.version,
            status.missing_tables.join(", ")
        )));
    }
    log::debug!("Graph schema at v{}", status.version);
    Ok(status)
}
