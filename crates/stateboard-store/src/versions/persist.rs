//! Version ledger writes.
//!
//! A version row and its resource index rows are written in one
//! transaction, after a `(lineage, serial)` compare inside that same
//! transaction.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use crate::versions::query::{find_by_serial, to_i64};
use chrono::{TimeZone, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use stateboard_core::errors::{ExError, ExErrorKind};
use stateboard_core::lineage::{NewVersion, VersionSummary};
use stateboard_core::tree::AttributeTree;

#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// Row written
    Inserted(VersionSummary),
    /// Same `(lineage, serial)` and content hash already present
    Existing(VersionSummary),
    /// Same `(lineage, serial)` recorded with a different content hash
    Conflict { existing: VersionSummary },
}

/// Compare-and-insert a version with its resource index
///
/// `tree` must be the tree built from `version.payload`. The stored
/// `created_at` is truncated to milliseconds; the returned summary reflects
/// the stored value.
///
/// # Errors
///
/// `Persistence` on SQLite failure, including a duplicate version id.
pub fn insert_version(
    conn: &mut Connection,
    version: &NewVersion,
    tree: &AttributeTree,
) -> Result<InsertOutcome> {
    let serial = to_i64("serial", version.serial)?;
    let created_at_ms = version.created_at.timestamp_millis();

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(from_rusqlite)?;

    if let Some(existing) = find_by_serial(&tx, &version.lineage, version.serial)? {
        if existing.content_hash == version.content_hash {
            return Ok(InsertOutcome::Existing(existing));
        }
        return Ok(InsertOutcome::Conflict { existing });
    }

    tx.execute(
        r#"
        INSERT INTO versions (
            lineage,
            version_id,
            serial,
            created_at,
            content_hash,
            tool_version,
            resource_count,
            payload
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        rusqlite::params![
            version.lineage.as_str(),
            version.version_id.as_str(),
            serial,
            created_at_ms,
            version.content_hash,
            version.tool_version,
            to_i64("resource_count", version.resource_count as u64)?,
            version.payload,
        ],
    )
    .map_err(from_rusqlite)?;
    let version_row = tx.last_insert_rowid();

    write_resource_index(&tx, version_row, tree)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(
        lineage = %version.lineage,
        version_id = %version.version_id,
        serial = version.serial,
        resources = tree.resource_count(),
        "Inserted version"
    );

    let mut summary = version.summary();
    summary.created_at = Utc
        .timestamp_millis_opt(created_at_ms)
        .single()
        .unwrap_or(version.created_at);
    Ok(InsertOutcome::Inserted(summary))
}

fn write_resource_index(tx: &Transaction<'_>, version_row: i64, tree: &AttributeTree) -> Result<()> {
    let mut resource_stmt = tx
        .prepare(
            "INSERT INTO resources (version_row, module, mode, resource_type, name, index_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(from_rusqlite)?;
    let mut attribute_stmt = tx
        .prepare(
            "INSERT INTO resource_attributes (resource_row, attribute_path, value_text, sensitive)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(from_rusqlite)?;

    for (id, state) in tree.resources() {
        let index_key = id
            .index
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| {
                ExError::new(ExErrorKind::Serialization)
                    .with_op("write_resource_index")
                    .with_message(format!("Failed to encode index of {}: {}", id, e))
            })?;
        let resource_row = resource_stmt
            .insert(rusqlite::params![
                version_row,
                id.module,
                id.mode.as_str(),
                id.resource_type,
                id.name,
                index_key,
            ])
            .map_err(from_rusqlite)?;

        for (path, value) in state.attributes() {
            let sensitive = state.is_sensitive(path);
            let value_text = (!sensitive).then(|| value.to_string());
            attribute_stmt
                .execute(rusqlite::params![
                    resource_row,
                    path.as_str(),
                    value_text,
                    sensitive
                ])
                .map_err(from_rusqlite)?;
        }
    }

    Ok(())
}
