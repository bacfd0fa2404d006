//! Read-only version ledger queries.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, out_of_range, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use stateboard_core::lineage::{
    LineageKey, LineageSummary, VersionId, VersionRecord, VersionSummary,
};

const SUMMARY_COLUMNS: &str =
    "lineage, version_id, serial, created_at, content_hash, tool_version, resource_count";

pub(crate) fn to_i64(column: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| out_of_range(column, value))
}

pub(crate) fn millis_to_datetime(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

fn column_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

/// Map a row selected with [`SUMMARY_COLUMNS`] starting at column 0
fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<VersionSummary> {
    let lineage: String = row.get(0)?;
    let version_id: String = row.get(1)?;
    let resource_count = column_u64(row, 6)?;
    Ok(VersionSummary {
        lineage: LineageKey::new(lineage),
        version_id: VersionId::new(version_id),
        serial: column_u64(row, 2)?,
        created_at: millis_to_datetime(3, row.get(3)?)?,
        content_hash: row.get(4)?,
        tool_version: row.get(5)?,
        resource_count: usize::try_from(resource_count)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(6, resource_count as i64))?,
    })
}

/// Fetch one version with its payload
///
/// # Errors
///
/// `Persistence` if the query fails.
pub fn fetch_version(
    conn: &Connection,
    lineage: &LineageKey,
    version_id: &VersionId,
) -> Result<Option<VersionRecord>> {
    conn.query_row(
        &format!(
            "SELECT {}, payload FROM versions WHERE lineage = ?1 AND version_id = ?2",
            SUMMARY_COLUMNS
        ),
        [lineage.as_str(), version_id.as_str()],
        |row| {
            Ok(VersionRecord {
                summary: summary_from_row(row)?,
                payload: row.get(7)?,
            })
        },
    )
    .optional()
    .map_err(from_rusqlite)
}

/// All versions of a lineage, highest serial first
///
/// # Errors
///
/// `Persistence` if the query fails.
pub fn list_version_summaries(conn: &Connection, lineage: &LineageKey) -> Result<Vec<VersionSummary>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM versions WHERE lineage = ?1 ORDER BY serial DESC, created_at DESC",
            SUMMARY_COLUMNS
        ))
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([lineage.as_str()], summary_from_row)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

/// # Errors
///
/// `Persistence` if the query fails or `serial` exceeds the column range.
pub fn find_by_serial(
    conn: &Connection,
    lineage: &LineageKey,
    serial: u64,
) -> Result<Option<VersionSummary>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM versions WHERE lineage = ?1 AND serial = ?2",
            SUMMARY_COLUMNS
        ),
        rusqlite::params![lineage.as_str(), to_i64("serial", serial)?],
        summary_from_row,
    )
    .optional()
    .map_err(from_rusqlite)
}

/// Lineages with version counts, most recently updated first
///
/// # Errors
///
/// `Persistence` if the query fails.
pub fn list_lineages(conn: &Connection, limit: Option<usize>) -> Result<Vec<LineageSummary>> {
    // SQLite treats a negative LIMIT as unbounded
    let limit = match limit {
        Some(n) => to_i64("limit", n as u64)?,
        None => -1,
    };
    let mut stmt = conn
        .prepare(
            "SELECT lineage, COUNT(*), MAX(serial), MAX(created_at)
             FROM versions
             GROUP BY lineage
             ORDER BY MAX(created_at) DESC, lineage
             LIMIT ?1",
        )
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([limit], |row| {
            let lineage: String = row.get(0)?;
            Ok(LineageSummary {
                lineage: LineageKey::new(lineage),
                version_count: column_u64(row, 1)?,
                latest_serial: column_u64(row, 2)?,
                last_updated: millis_to_datetime(3, row.get(3)?)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}
