//! Persistence collaborator trait and in-memory implementation.

use crate::errors::{Result, StateError};
use crate::lineage::model::{
    LineageKey, LineageSummary, NewVersion, VersionId, VersionRecord, VersionSummary,
};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Version persistence
///
/// `insert_version` must reject a second row for the same `(lineage,
/// serial)`: an equal content hash returns the existing summary, a different
/// one is `DivergentVersion`.
pub trait VersionStore: Send + Sync {
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn load_version(
        &self,
        lineage: &LineageKey,
        version_id: &VersionId,
    ) -> Result<Option<VersionRecord>>;

    /// All versions of a lineage, in no particular order
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn list_version_summaries(&self, lineage: &LineageKey) -> Result<Vec<VersionSummary>>;

    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn find_by_serial(&self, lineage: &LineageKey, serial: u64) -> Result<Option<VersionSummary>>;

    /// # Errors
    ///
    /// `DivergentVersion` for a conflicting `(lineage, serial)`,
    /// `Persistence` for a duplicate version id or storage failure.
    fn insert_version(&self, version: NewVersion) -> Result<VersionSummary>;

    /// Lineages, most recently updated first
    ///
    /// # Errors
    ///
    /// `Persistence` on storage failure.
    fn list_lineages(&self, limit: Option<usize>) -> Result<Vec<LineageSummary>>;
}

impl<T: VersionStore + ?Sized> VersionStore for Arc<T> {
    fn load_version(
        &self,
        lineage: &LineageKey,
        version_id: &VersionId,
    ) -> Result<Option<VersionRecord>> {
        (**self).load_version(lineage, version_id)
    }

    fn list_version_summaries(&self, lineage: &LineageKey) -> Result<Vec<VersionSummary>> {
        (**self).list_version_summaries(lineage)
    }

    fn find_by_serial(&self, lineage: &LineageKey, serial: u64) -> Result<Option<VersionSummary>> {
        (**self).find_by_serial(lineage, serial)
    }

    fn insert_version(&self, version: NewVersion) -> Result<VersionSummary> {
        (**self).insert_version(version)
    }

    fn list_lineages(&self, limit: Option<usize>) -> Result<Vec<LineageSummary>> {
        (**self).list_lineages(limit)
    }
}

/// In-memory store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    lineages: RwLock<BTreeMap<LineageKey, Vec<VersionRecord>>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StateError {
    StateError::internal("memory store lock poisoned")
}

impl VersionStore for MemoryVersionStore {
    fn load_version(
        &self,
        lineage: &LineageKey,
        version_id: &VersionId,
    ) -> Result<Option<VersionRecord>> {
        let lineages = self.lineages.read().map_err(|_| poisoned())?;
        Ok(lineages.get(lineage).and_then(|records| {
            records
                .iter()
                .find(|r| &r.summary.version_id == version_id)
                .cloned()
        }))
    }

    fn list_version_summaries(&self, lineage: &LineageKey) -> Result<Vec<VersionSummary>> {
        let lineages = self.lineages.read().map_err(|_| poisoned())?;
        Ok(lineages
            .get(lineage)
            .map(|records| records.iter().map(|r| r.summary.clone()).collect())
            .unwrap_or_default())
    }

    fn find_by_serial(&self, lineage: &LineageKey, serial: u64) -> Result<Option<VersionSummary>> {
        let lineages = self.lineages.read().map_err(|_| poisoned())?;
        Ok(lineages.get(lineage).and_then(|records| {
            records
                .iter()
                .find(|r| r.summary.serial == serial)
                .map(|r| r.summary.clone())
        }))
    }

    fn insert_version(&self, version: NewVersion) -> Result<VersionSummary> {
        let mut lineages = self.lineages.write().map_err(|_| poisoned())?;
        let records = lineages.entry(version.lineage.clone()).or_default();

        if let Some(existing) = records.iter().find(|r| r.summary.serial == version.serial) {
            if existing.summary.content_hash == version.content_hash {
                return Ok(existing.summary.clone());
            }
            return Err(StateError::DivergentVersion {
                lineage: version.lineage.to_string(),
                serial: version.serial,
                existing_hash: existing.summary.content_hash.clone(),
                incoming_hash: version.content_hash,
            });
        }
        if records
            .iter()
            .any(|r| r.summary.version_id == version.version_id)
        {
            return Err(StateError::Persistence {
                message: format!(
                    "version id {} already exists in lineage {}",
                    version.version_id, version.lineage
                ),
            });
        }

        let summary = version.summary();
        records.push(VersionRecord {
            summary: summary.clone(),
            payload: version.payload,
        });
        Ok(summary)
    }

    fn list_lineages(&self, limit: Option<usize>) -> Result<Vec<LineageSummary>> {
        let lineages = self.lineages.read().map_err(|_| poisoned())?;
        let mut out: Vec<LineageSummary> = lineages
            .iter()
            .filter_map(|(key, records)| {
                let latest_serial = records.iter().map(|r| r.summary.serial).max()?;
                let last_updated = records.iter().map(|r| r.summary.created_at).max()?;
                Some(LineageSummary {
                    lineage: key.clone(),
                    version_count: records.len() as u64,
                    latest_serial,
                    last_updated,
                })
            })
            .collect();
        out.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| a.lineage.cmp(&b.lineage))
        });
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        Ok(out)
    }
}
