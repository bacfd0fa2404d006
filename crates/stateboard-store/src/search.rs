//! Browsing queries over the resource index.
//!
//! Every query looks at the latest version (highest serial) of each lineage
//! only.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use crate::versions::query::to_i64;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use stateboard_core::lineage::{LineageKey, VersionId};
use stateboard_core::tree::{AttributePath, ResourceId, ResourceIndex, ResourceMode};

const LATEST_VERSIONS: &str = "
    WITH latest AS (
        SELECT v.id, v.lineage, v.version_id, v.serial, v.tool_version
        FROM versions v
        WHERE v.serial = (SELECT MAX(w.serial) FROM versions w WHERE w.lineage = v.lineage)
    )";

const SEARCH_FROM: &str = "
    FROM latest l
    JOIN resources r ON r.version_row = l.id
    JOIN resource_attributes a ON a.resource_row = r.id
    WHERE (?1 IS NULL OR l.lineage = ?1)
      AND (?2 IS NULL OR r.resource_type = ?2)
      AND (?3 IS NULL OR r.name = ?3)
      AND (?4 IS NULL OR a.attribute_path = ?4)
      AND (?5 IS NULL OR a.value_text LIKE '%' || ?5 || '%' ESCAPE '\\')";

pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Attribute search filters; `None` matches everything
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeQuery {
    pub lineage: Option<String>,
    pub resource_type: Option<String>,
    pub resource_name: Option<String>,
    pub attribute_key: Option<String>,
    /// Substring of the rendered value; sensitive values never match
    pub value_contains: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for AttributeQuery {
    fn default() -> Self {
        Self {
            lineage: None,
            resource_type: None,
            resource_name: None,
            attribute_key: None,
            value_contains: None,
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMatch {
    pub lineage: LineageKey,
    pub version_id: VersionId,
    pub serial: u64,
    pub resource: ResourceId,
    pub path: AttributePath,
    /// `None` for sensitive attributes
    pub value: Option<String>,
    pub sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    /// Matches before limit/offset
    pub total: u64,
    pub matches: Vec<AttributeMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeCount {
    pub resource_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolVersionCount {
    pub tool_version: String,
    /// Lineages whose latest version was written by this tool version
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolVersionOrder {
    #[default]
    Version,
    Count,
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn column_u64(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

/// Rebuild a resource id from `module, mode, resource_type, name, index_key`
/// starting at column `start`
fn resource_id_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<ResourceId> {
    let mode: String = row.get(start + 1)?;
    let mode = ResourceMode::parse(&mode)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(start + 1, "mode".into(), Type::Text))?;
    let index_key: Option<String> = row.get(start + 4)?;
    let index = index_key
        .map(|raw| serde_json::from_str::<ResourceIndex>(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(start + 4, Type::Text, Box::new(e)))?;

    let resource_type: String = row.get(start + 2)?;
    let name: String = row.get(start + 3)?;
    let module: String = row.get(start)?;
    let mut id = ResourceId::managed(resource_type, name).in_module(module);
    id.mode = mode;
    id.index = index;
    Ok(id)
}

/// Search attributes across the latest version of every lineage
///
/// # Errors
///
/// `Persistence` if the query fails.
pub fn search_attributes(conn: &Connection, query: &AttributeQuery) -> Result<SearchPage> {
    let value = query.value_contains.as_deref().map(escape_like);
    let filters = rusqlite::params![
        query.lineage,
        query.resource_type,
        query.resource_name,
        query.attribute_key,
        value,
    ];

    let total: i64 = conn
        .query_row(
            &format!("{} SELECT COUNT(*) {}", LATEST_VERSIONS, SEARCH_FROM),
            filters,
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;

    let mut stmt = conn
        .prepare(&format!(
            "{} SELECT l.lineage, l.version_id, l.serial,
                    r.module, r.mode, r.resource_type, r.name, r.index_key,
                    a.attribute_path, a.value_text, a.sensitive
             {}
             ORDER BY l.lineage, r.module, r.mode, r.resource_type, r.name, r.index_key,
                      a.attribute_path
             LIMIT ?6 OFFSET ?7",
            LATEST_VERSIONS, SEARCH_FROM
        ))
        .map_err(from_rusqlite)?;
    let matches = stmt
        .query_map(
            rusqlite::params![
                query.lineage,
                query.resource_type,
                query.resource_name,
                query.attribute_key,
                value,
                to_i64("limit", query.limit as u64)?,
                to_i64("offset", query.offset as u64)?,
            ],
            |row| {
                let lineage: String = row.get(0)?;
                let version_id: String = row.get(1)?;
                let path: String = row.get(8)?;
                Ok(AttributeMatch {
                    lineage: LineageKey::new(lineage),
                    version_id: VersionId::new(version_id),
                    serial: column_u64(row, 2)?,
                    resource: resource_id_from_row(row, 3)?,
                    path: AttributePath::new(path),
                    value: row.get(9)?,
                    sensitive: row.get(10)?,
                })
            },
        )
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    Ok(SearchPage {
        total: u64::try_from(total).unwrap_or_default(),
        matches,
    })
}

/// Resource types with instance counts, ordered by type
///
/// # Errors
///
/// `Persistence` if the query fails.
pub fn list_resource_types(conn: &Connection) -> Result<Vec<ResourceTypeCount>> {
    let mut stmt = conn
        .prepare(&format!(
            "{} SELECT r.resource_type, COUNT(*)
             FROM latest l JOIN resources r ON r.version_row = l.id
             GROUP BY r.resource_type
             ORDER BY r.resource_type",
            LATEST_VERSIONS
        ))
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ResourceTypeCount {
                resource_type: row.get(0)?,
                count: column_u64(row, 1)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

/// Distinct resource names, optionally for one type
///
/// # Errors
///
/// `Persistence` if the query fails.
pub fn list_resource_names(conn: &Connection, resource_type: Option<&str>) -> Result<Vec<String>> {
    distinct_strings(
        conn,
        &format!(
            "{} SELECT DISTINCT r.name
             FROM latest l JOIN resources r ON r.version_row = l.id
             WHERE (?1 IS NULL OR r.resource_type = ?1)
             ORDER BY r.name",
            LATEST_VERSIONS
        ),
        resource_type,
    )
}

/// Distinct attribute paths, optionally for one resource type
///
/// # Errors
///
/// `Persistence` if the query fails.
pub fn list_attribute_keys(conn: &Connection, resource_type: Option<&str>) -> Result<Vec<String>> {
    distinct_strings(
        conn,
        &format!(
            "{} SELECT DISTINCT a.attribute_path
             FROM latest l
             JOIN resources r ON r.version_row = l.id
             JOIN resource_attributes a ON a.resource_row = r.id
             WHERE (?1 IS NULL OR r.resource_type = ?1)
             ORDER BY a.attribute_path",
            LATEST_VERSIONS
        ),
        resource_type,
    )
}

fn distinct_strings(conn: &Connection, sql: &str, filter: Option<&str>) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([filter], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

/// Tool versions of the latest version of each lineage, with counts
///
/// # Errors
///
/// `Persistence` if the query fails.
pub fn list_tool_versions(conn: &Connection, order: ToolVersionOrder) -> Result<Vec<ToolVersionCount>> {
    let order_by = match order {
        ToolVersionOrder::Version => "l.tool_version",
        ToolVersionOrder::Count => "COUNT(*) DESC, l.tool_version",
    };
    let mut stmt = conn
        .prepare(&format!(
            "{} SELECT l.tool_version, COUNT(*)
             FROM latest l
             WHERE l.tool_version IS NOT NULL
             GROUP BY l.tool_version
             ORDER BY {}",
            LATEST_VERSIONS, order_by
        ))
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ToolVersionCount {
                tool_version: row.get(0)?,
                count: column_u64(row, 1)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("10.0.%"), "10.0.\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("plain"), "plain");
    }
}
