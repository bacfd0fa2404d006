//! SQLite-backed [`VersionStore`].

#![allow(clippy::result_large_err)]

use crate::errors::{into_state_error, Result};
use crate::search::{
    AttributeQuery, ResourceTypeCount, SearchPage, ToolVersionCount, ToolVersionOrder,
};
use crate::versions::{insert_version, query, InsertOutcome};
use crate::{db, migrations, search};
use rusqlite::Connection;
use stateboard_core::errors::{ExError, ExErrorKind, StateError};
use stateboard_core::lineage::{
    LineageKey, LineageSummary, NewVersion, VersionId, VersionRecord, VersionStore, VersionSummary,
};
use stateboard_core::tree::build_tree;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Version store over a single SQLite connection
///
/// Opening applies pending migrations. The connection is serialized behind a
/// mutex; writes additionally run in immediate transactions so several
/// processes can share one database file.
pub struct SqliteVersionStore {
    conn: Mutex<Connection>,
}

impl SqliteVersionStore {
    /// # Errors
    ///
    /// `Io` or `Persistence` if the database cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = db::open(path)?;
        db::configure(&conn)?;
        Self::from_connection(conn)
    }

    /// # Errors
    ///
    /// `Persistence` if the database cannot be created or migrated.
    pub fn open_in_memory() -> Result<Self> {
        let conn = db::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(crate::errors::from_rusqlite)?;
        Self::from_connection(conn)
    }

    /// Wrap an already configured connection
    ///
    /// # Errors
    ///
    /// `Persistence` if migrations fail.
    pub fn from_connection(mut conn: Connection) -> Result<Self> {
        migrations::apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            ExError::new(ExErrorKind::Concurrency)
                .with_op("sqlite_store")
                .with_message("connection mutex poisoned")
        })
    }

    /// Run `f` with exclusive access to the connection
    ///
    /// # Errors
    ///
    /// `Concurrency` if the mutex is poisoned, otherwise whatever `f` returns.
    pub fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        f(&mut conn)
    }

    /// # Errors
    ///
    /// `Persistence` if the query fails.
    pub fn search_attributes(&self, query: &AttributeQuery) -> Result<SearchPage> {
        self.with_connection(|conn| search::search_attributes(conn, query))
    }

    /// # Errors
    ///
    /// `Persistence` if the query fails.
    pub fn list_resource_types(&self) -> Result<Vec<ResourceTypeCount>> {
        self.with_connection(|conn| search::list_resource_types(conn))
    }

    /// # Errors
    ///
    /// `Persistence` if the query fails.
    pub fn list_resource_names(&self, resource_type: Option<&str>) -> Result<Vec<String>> {
        self.with_connection(|conn| search::list_resource_names(conn, resource_type))
    }

    /// # Errors
    ///
    /// `Persistence` if the query fails.
    pub fn list_attribute_keys(&self, resource_type: Option<&str>) -> Result<Vec<String>> {
        self.with_connection(|conn| search::list_attribute_keys(conn, resource_type))
    }

    /// # Errors
    ///
    /// `Persistence` if the query fails.
    pub fn list_tool_versions(&self, order: ToolVersionOrder) -> Result<Vec<ToolVersionCount>> {
        self.with_connection(|conn| search::list_tool_versions(conn, order))
    }
}

impl VersionStore for SqliteVersionStore {
    fn load_version(
        &self,
        lineage: &LineageKey,
        version_id: &VersionId,
    ) -> stateboard_core::Result<Option<VersionRecord>> {
        self.with_connection(|conn| query::fetch_version(conn, lineage, version_id))
            .map_err(into_state_error)
    }

    fn list_version_summaries(
        &self,
        lineage: &LineageKey,
    ) -> stateboard_core::Result<Vec<VersionSummary>> {
        self.with_connection(|conn| query::list_version_summaries(conn, lineage))
            .map_err(into_state_error)
    }

    fn find_by_serial(
        &self,
        lineage: &LineageKey,
        serial: u64,
    ) -> stateboard_core::Result<Option<VersionSummary>> {
        self.with_connection(|conn| query::find_by_serial(conn, lineage, serial))
            .map_err(into_state_error)
    }

    fn insert_version(&self, version: NewVersion) -> stateboard_core::Result<VersionSummary> {
        let tree = build_tree(&version.payload)?;
        let outcome = self
            .with_connection(|conn| insert_version(conn, &version, &tree))
            .map_err(into_state_error)?;

        match outcome {
            InsertOutcome::Inserted(summary) | InsertOutcome::Existing(summary) => Ok(summary),
            InsertOutcome::Conflict { existing } => Err(StateError::DivergentVersion {
                lineage: version.lineage.to_string(),
                serial: version.serial,
                existing_hash: existing.content_hash,
                incoming_hash: version.content_hash,
            }),
        }
    }

    fn list_lineages(&self, limit: Option<usize>) -> stateboard_core::Result<Vec<LineageSummary>> {
        self.with_connection(|conn| query::list_lineages(conn, limit))
            .map_err(into_state_error)
    }
}
