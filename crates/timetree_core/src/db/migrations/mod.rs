//! Graph schema migrations.
//!
//! Versions are mirrored to `PRAGMA user_version`. Pending steps run in one
//! transaction, so a database is either at its old version or fully
//! upgraded. Steps only add tables and indexes; tree data is never rewritten.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

/// Tables every graph store reads and writes.
const GRAPH_TABLES: [&str; 2] = ["graph_nodes", "graph_edges"];

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "graph_store",
        sql: include_str!("0001_graph_store.sql"),
    },
    Migration {
        version: 2,
        name: "root_marker",
        sql: include_str!("0002_root_marker.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings `conn` up to `latest_version()` and verifies the result.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = schema_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from_version)
        .collect();
    if !pending.is_empty() {
        let tx = conn.transaction()?;
        for migration in &pending {
            tx.execute_batch(migration.sql)?;
            tx.pragma_update(None, "user_version", migration.version)?;
            debug!(
                "event=db_migrate module=db status=ok version={} name={}",
                migration.version, migration.name
            );
        }
        tx.commit()?;
        info!("event=db_migrate module=db status=done from={from_version} to={latest}");
    }

    ensure_schema_ready(conn)
}

/// Fails unless `conn` is at the latest version with every graph table.
pub fn ensure_schema_ready(conn: &Connection) -> DbResult<()> {
    let actual_version = schema_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(DbError::SchemaNotReady {
            expected_version,
            actual_version,
        });
    }
    for table in GRAPH_TABLES {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(DbError::MissingTable(table));
        }
    }
    Ok(())
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}
