//! Comparison output types.
//!
//! Collections are sorted `Vec`s so serialization is deterministic.

use crate::tree::{AttributePath, AttributeValue, ResourceId};
use serde::{Deserialize, Deserializer, Serialize};
use stateboard_core_types::REDACTED;

/// Structured comparison between two attribute trees
///
/// `diff_schema_version` is always 1 for this implementation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonResult {
    pub diff_schema_version: u32,
    /// Digest of the `from` tree
    pub from_digest: String,
    /// Digest of the `to` tree
    pub to_digest: String,
    pub classification: DiffClassification,
    pub stats: DiffStats,
    /// Resources present only in `to`
    pub added_resources: Vec<ResourceId>,
    /// Resources present only in `from`
    pub removed_resources: Vec<ResourceId>,
    /// Attribute-level changes ordered by (resource, path)
    pub entries: Vec<ChangeEntry>,
}

impl ComparisonResult {
    pub fn is_identical(&self) -> bool {
        self.classification == DiffClassification::Identical
    }

    pub fn change_count(&self) -> usize {
        self.entries.len()
    }

    /// Copy with the old and new values of sensitive entries replaced by
    /// the redaction placeholder
    pub fn redacted(&self) -> ComparisonResult {
        let mut shown = self.clone();
        for entry in shown.entries.iter_mut().filter(|e| e.sensitive) {
            for value in [&mut entry.old, &mut entry.new].into_iter().flatten() {
                *value = AttributeValue::from(REDACTED);
            }
        }
        shown
    }

    /// Entries for a single resource
    pub fn entries_for<'a>(
        &'a self,
        resource: &'a ResourceId,
    ) -> impl Iterator<Item = &'a ChangeEntry> + 'a {
        self.entries.iter().filter(move |e| &e.resource == resource)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiffClassification {
    /// No attribute differs
    Identical,
    /// At least one entry
    Changed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub resources_added: usize,
    pub resources_removed: usize,
    /// Resources present on both sides with at least one entry
    pub resources_changed: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        }
    }
}

/// One attribute difference
///
/// `old` is absent for `added`, `new` is absent for `removed`. A present
/// JSON `null` is a real value and stays distinct from absence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEntry {
    pub resource: ResourceId,
    pub path: AttributePath,
    pub kind: ChangeKind,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub old: Option<AttributeValue>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub new: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<AttributeValue>, D::Error>
where
    D: Deserializer<'de>,
{
    AttributeValue::deserialize(deserializer).map(Some)
}
