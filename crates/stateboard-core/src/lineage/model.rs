//! Lineage and version records.

use crate::errors::{Result, StateError};
use crate::tree::{build_tree, AttributeTree, ParsedSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one logically continuous state file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineageKey(String);

impl LineageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineageKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LineageKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque version identifier, unique within a lineage
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh time-ordered identifier (UUIDv7)
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for VersionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A version about to be recorded
#[derive(Debug, Clone, PartialEq)]
pub struct NewVersion {
    pub lineage: LineageKey,
    pub version_id: VersionId,
    pub serial: u64,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub tool_version: Option<String>,
    pub resource_count: usize,
    pub payload: Vec<u8>,
}

impl NewVersion {
    /// Build from a parsed snapshot and its raw bytes
    ///
    /// Uses a generated version id and the current time; override with
    /// [`with_version_id`](Self::with_version_id) and
    /// [`with_created_at`](Self::with_created_at).
    ///
    /// # Errors
    ///
    /// `MalformedSnapshot` if the snapshot has no lineage or serial.
    pub fn from_snapshot(parsed: &ParsedSnapshot, payload: Vec<u8>) -> Result<Self> {
        let lineage = parsed
            .lineage
            .as_deref()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| StateError::malformed("snapshot has no `lineage`"))?;
        let serial = parsed
            .serial
            .ok_or_else(|| StateError::malformed("snapshot has no `serial`"))?;

        Ok(Self {
            lineage: LineageKey::new(lineage),
            version_id: VersionId::generate(),
            serial,
            created_at: Utc::now(),
            content_hash: parsed.content_hash.clone(),
            tool_version: parsed.tool_version.clone(),
            resource_count: parsed.tree.resource_count(),
            payload,
        })
    }

    pub fn with_version_id(mut self, version_id: VersionId) -> Self {
        self.version_id = version_id;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn summary(&self) -> VersionSummary {
        VersionSummary {
            lineage: self.lineage.clone(),
            version_id: self.version_id.clone(),
            serial: self.serial,
            created_at: self.created_at,
            content_hash: self.content_hash.clone(),
            tool_version: self.tool_version.clone(),
            resource_count: self.resource_count,
        }
    }
}

/// Version metadata without the payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub lineage: LineageKey,
    pub version_id: VersionId,
    pub serial: u64,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub tool_version: Option<String>,
    pub resource_count: usize,
}

impl VersionSummary {
    /// Ordering key: `(serial, created_at, version_id)`
    pub fn ordering_key(&self) -> (u64, DateTime<Utc>, &VersionId) {
        (self.serial, self.created_at, &self.version_id)
    }
}

/// A stored version with its raw payload
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRecord {
    pub summary: VersionSummary,
    pub payload: Vec<u8>,
}

impl VersionRecord {
    /// # Errors
    ///
    /// `MalformedSnapshot` if the stored payload no longer parses.
    pub fn tree(&self) -> Result<AttributeTree> {
        build_tree(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// A new version row was written
    Recorded(VersionSummary),
    /// The same `(lineage, serial, content_hash)` was already present
    AlreadyRecorded(VersionSummary),
}

impl RecordOutcome {
    pub fn summary(&self) -> &VersionSummary {
        match self {
            RecordOutcome::Recorded(s) | RecordOutcome::AlreadyRecorded(s) => s,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, RecordOutcome::Recorded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageSummary {
    pub lineage: LineageKey,
    pub version_count: u64,
    pub latest_serial: u64,
    pub last_updated: DateTime<Utc>,
}

/// One step of a lineage's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub version_id: VersionId,
    pub serial: u64,
    pub created_at: DateTime<Utc>,
    /// Entries relative to the previous version (the empty tree for the first)
    pub change_count: usize,
    pub resources_added: usize,
    pub resources_removed: usize,
}

/// Oldest-first history of a lineage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageActivity {
    pub lineage: LineageKey,
    pub entries: Vec<ActivityEntry>,
}
