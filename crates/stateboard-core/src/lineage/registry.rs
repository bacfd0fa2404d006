//! Lineage registry: version listing, default resolution and recording.

#![allow(clippy::result_large_err)]

use crate::diff::compare;
use crate::errors::{Result, StateError};
use crate::lineage::model::{
    ActivityEntry, LineageActivity, LineageKey, LineageSummary, NewVersion, RecordOutcome,
    VersionId, VersionSummary,
};
use crate::lineage::store::VersionStore;
use crate::tree::AttributeTree;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Registry over a [`VersionStore`]
///
/// `record_version` calls for the same lineage are serialized by a per-key
/// mutex held across the check and the insert.
pub struct LineageRegistry<S> {
    store: S,
    guards: Mutex<HashMap<LineageKey, Arc<Mutex<()>>>>,
}

impl<S: VersionStore> LineageRegistry<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Versions of a lineage, most recent first
    ///
    /// # Errors
    ///
    /// `UnknownLineage` if the lineage has no versions.
    pub fn list_versions(&self, lineage: &LineageKey) -> Result<Vec<VersionSummary>> {
        let mut versions = self.store.list_version_summaries(lineage)?;
        if versions.is_empty() {
            return Err(StateError::UnknownLineage {
                lineage: lineage.to_string(),
            });
        }
        versions.sort_by(|a, b| b.ordering_key().cmp(&a.ordering_key()));
        Ok(versions)
    }

    /// The version with the highest `(serial, created_at)`
    ///
    /// # Errors
    ///
    /// `UnknownLineage` if the lineage has no versions.
    pub fn latest_summary(&self, lineage: &LineageKey) -> Result<VersionSummary> {
        self.store
            .list_version_summaries(lineage)?
            .into_iter()
            .max_by(|a, b| a.ordering_key().cmp(&b.ordering_key()))
            .ok_or_else(|| StateError::UnknownLineage {
                lineage: lineage.to_string(),
            })
    }

    /// # Errors
    ///
    /// `UnknownLineage` if the lineage has no versions.
    pub fn default_version(&self, lineage: &LineageKey) -> Result<VersionId> {
        Ok(self.latest_summary(lineage)?.version_id)
    }

    /// Summary of one version
    ///
    /// # Errors
    ///
    /// `UnknownLineage` if the lineage is empty, `VersionNotFound` if the id
    /// does not belong to it.
    pub fn version_summary(
        &self,
        lineage: &LineageKey,
        version_id: &VersionId,
    ) -> Result<VersionSummary> {
        let versions = self.list_versions(lineage)?;
        versions
            .into_iter()
            .find(|v| &v.version_id == version_id)
            .ok_or_else(|| StateError::VersionNotFound {
                lineage: lineage.to_string(),
                version_id: version_id.to_string(),
            })
    }

    /// Record a version, detecting divergence
    ///
    /// # Errors
    ///
    /// `DivergentVersion` if a different content hash is already recorded
    /// for `(lineage, serial)`.
    pub fn record_version(&self, version: NewVersion) -> Result<RecordOutcome> {
        let guard = self.lineage_guard(&version.lineage)?;
        let _held = guard
            .lock()
            .map_err(|_| StateError::internal("lineage guard poisoned"))?;

        if let Some(existing) = self.store.find_by_serial(&version.lineage, version.serial)? {
            if existing.content_hash == version.content_hash {
                return Ok(RecordOutcome::AlreadyRecorded(existing));
            }
            return Err(StateError::DivergentVersion {
                lineage: version.lineage.to_string(),
                serial: version.serial,
                existing_hash: existing.content_hash,
                incoming_hash: version.content_hash,
            });
        }

        let summary = self.store.insert_version(version)?;
        Ok(RecordOutcome::Recorded(summary))
    }

    /// Load and build the tree of one version
    ///
    /// # Errors
    ///
    /// `UnknownLineage`/`VersionNotFound` for a missing version,
    /// `MalformedSnapshot` if the stored payload no longer parses.
    pub fn load_tree(&self, lineage: &LineageKey, version_id: &VersionId) -> Result<AttributeTree> {
        match self.store.load_version(lineage, version_id)? {
            Some(record) => record.tree(),
            None => {
                if self.store.list_version_summaries(lineage)?.is_empty() {
                    Err(StateError::UnknownLineage {
                        lineage: lineage.to_string(),
                    })
                } else {
                    Err(StateError::VersionNotFound {
                        lineage: lineage.to_string(),
                        version_id: version_id.to_string(),
                    })
                }
            }
        }
    }

    /// Oldest-first history with per-version change counts
    ///
    /// # Errors
    ///
    /// `UnknownLineage` if the lineage has no versions.
    pub fn lineage_activity(&self, lineage: &LineageKey) -> Result<LineageActivity> {
        let mut versions = self.list_versions(lineage)?;
        versions.reverse();

        let mut previous = AttributeTree::empty();
        let mut entries = Vec::with_capacity(versions.len());
        for version in versions {
            let tree = self.load_tree(lineage, &version.version_id)?;
            let result = compare(&previous, &tree)?;
            entries.push(ActivityEntry {
                version_id: version.version_id,
                serial: version.serial,
                created_at: version.created_at,
                change_count: result.change_count(),
                resources_added: result.stats.resources_added,
                resources_removed: result.stats.resources_removed,
            });
            previous = tree;
        }

        Ok(LineageActivity {
            lineage: lineage.clone(),
            entries,
        })
    }

    /// # Errors
    ///
    /// `Persistence` on storage failure.
    pub fn list_lineages(&self, limit: Option<usize>) -> Result<Vec<LineageSummary>> {
        self.store.list_lineages(limit)
    }

    fn lineage_guard(&self, lineage: &LineageKey) -> Result<Arc<Mutex<()>>> {
        let mut guards = self
            .guards
            .lock()
            .map_err(|_| StateError::internal("lineage guard table poisoned"))?;
        Ok(guards.entry(lineage.clone()).or_default().clone())
    }
}
