#![allow(clippy::result_large_err)]

use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use crate::migrations::embedded::{Migration, MIGRATIONS};
use rusqlite::{params, Connection};
use stateboard_core::digest::hash_string;
use std::collections::HashMap;

const BOOKKEEPING_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY,
    migration_id TEXT NOT NULL UNIQUE,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL
)";

/// A row of `schema_version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub migration_id: String,
    pub applied_at: i64,
    pub checksum: String,
}

/// Bring the schema up to date
///
/// Recorded migrations are only verified; the rest run one transaction each.
///
/// # Errors
///
/// `Persistence` when a migration fails or its recorded checksum differs from
/// the embedded text.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute(BOOKKEEPING_DDL, []).map_err(from_rusqlite)?;

    let recorded: HashMap<String, String> = applied_migrations(conn)?
        .into_iter()
        .map(|row| (row.migration_id, row.checksum))
        .collect();

    for migration in MIGRATIONS {
        let checksum = hash_string(migration.sql);
        match recorded.get(migration.id) {
            Some(previous) if *previous == checksum => continue,
            Some(previous) => return Err(checksum_mismatch(migration.id, previous, &checksum)),
            None => run_one(conn, migration, &checksum)?,
        }
    }
    Ok(())
}

/// Applied migrations in application order
///
/// # Errors
///
/// `Persistence` when `schema_version` cannot be read.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<AppliedMigration>> {
    let mut stmt = conn
        .prepare("SELECT migration_id, applied_at, checksum FROM schema_version ORDER BY id")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AppliedMigration {
                migration_id: row.get(0)?,
                applied_at: row.get(1)?,
                checksum: row.get(2)?,
            })
        })
        .map_err(from_rusqlite)?;
    let applied = rows
        .map(|row| row.map_err(from_rusqlite))
        .collect::<Result<Vec<_>>>();
    applied
}

fn run_one(conn: &mut Connection, migration: &Migration, checksum: &str) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
        params![migration.id, chrono::Utc::now().timestamp(), checksum],
    )
    .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(migration_id = migration.id, "schema migration applied");
    Ok(())
}
