//! Tree comparison engine.
//!
//! The entry point is [`compare`], which borrows two attribute trees and
//! produces a [`ComparisonResult`]. It is a pure function.

#![allow(clippy::result_large_err)]

use crate::diff::model::{
    ChangeEntry, ChangeKind, ComparisonResult, DiffClassification, DiffStats,
};
use crate::errors::{Result, StateError};
use crate::tree::{AttributePath, AttributeTree, ResourceId, ResourceState};
use std::collections::BTreeSet;

/// Compare two attribute trees
///
/// Entries are ordered by `(resource id, attribute path)`. Lists are compared
/// element by index, so a reordered list shows up as per-index `modified`
/// entries.
///
/// # Errors
///
/// - `IncomparableSnapshot` if either tree holds a non-flattened value
/// - `DeterminismViolation` if the result fails its JSON round-trip check
pub fn compare(from: &AttributeTree, to: &AttributeTree) -> Result<ComparisonResult> {
    from.validate()?;
    to.validate()?;

    let from_digest = from.digest()?;
    let to_digest = to.digest()?;

    let mut entries = Vec::new();
    let mut added_resources = Vec::new();
    let mut removed_resources = Vec::new();
    let mut resources_changed = 0;

    if from_digest != to_digest {
        let ids: BTreeSet<&ResourceId> = from.resource_ids().chain(to.resource_ids()).collect();
        for id in ids {
            match (from.resource(id), to.resource(id)) {
                (Some(old), None) => {
                    removed_resources.push(id.clone());
                    entries.extend(one_sided(id, old, ChangeKind::Removed));
                }
                (None, Some(new)) => {
                    added_resources.push(id.clone());
                    entries.extend(one_sided(id, new, ChangeKind::Added));
                }
                (Some(old), Some(new)) => {
                    let before = entries.len();
                    compare_resource(id, old, new, &mut entries);
                    if entries.len() > before {
                        resources_changed += 1;
                    }
                }
                (None, None) => {}
            }
        }
    }

    entries.sort_by(|a, b| (&a.resource, &a.path).cmp(&(&b.resource, &b.path)));

    let stats = DiffStats {
        added: count_kind(&entries, ChangeKind::Added),
        removed: count_kind(&entries, ChangeKind::Removed),
        modified: count_kind(&entries, ChangeKind::Modified),
        resources_added: added_resources.len(),
        resources_removed: removed_resources.len(),
        resources_changed,
    };

    let classification = if entries.is_empty()
        && added_resources.is_empty()
        && removed_resources.is_empty()
    {
        DiffClassification::Identical
    } else {
        DiffClassification::Changed
    };

    let result = ComparisonResult {
        diff_schema_version: 1,
        from_digest,
        to_digest,
        classification,
        stats,
        added_resources,
        removed_resources,
        entries,
    };

    check_round_trip(&result)?;
    Ok(result)
}

fn one_sided(id: &ResourceId, state: &ResourceState, kind: ChangeKind) -> Vec<ChangeEntry> {
    state
        .attributes()
        .iter()
        .map(|(path, value)| {
            let (old, new) = match kind {
                ChangeKind::Removed => (Some(value.clone()), None),
                _ => (None, Some(value.clone())),
            };
            ChangeEntry {
                resource: id.clone(),
                path: path.clone(),
                kind,
                old,
                new,
                sensitive: state.is_sensitive(path),
            }
        })
        .collect()
}

fn compare_resource(
    id: &ResourceId,
    old: &ResourceState,
    new: &ResourceState,
    entries: &mut Vec<ChangeEntry>,
) {
    let paths: BTreeSet<&AttributePath> = old
        .attributes()
        .keys()
        .chain(new.attributes().keys())
        .collect();

    for path in paths {
        let (kind, old_value, new_value) = match (old.get(path), new.get(path)) {
            (Some(a), None) => (ChangeKind::Removed, Some(a.clone()), None),
            (None, Some(b)) => (ChangeKind::Added, None, Some(b.clone())),
            (Some(a), Some(b)) if a != b => {
                (ChangeKind::Modified, Some(a.clone()), Some(b.clone()))
            }
            _ => continue,
        };
        entries.push(ChangeEntry {
            resource: id.clone(),
            path: path.clone(),
            kind,
            old: old_value,
            new: new_value,
            sensitive: old.is_sensitive(path) || new.is_sensitive(path),
        });
    }
}

fn count_kind(entries: &[ChangeEntry], kind: ChangeKind) -> usize {
    entries.iter().filter(|e| e.kind == kind).count()
}

/// Determinism guard: round-trip through JSON must produce an equal struct
fn check_round_trip(result: &ComparisonResult) -> Result<()> {
    let serialized = serde_json::to_string(result).map_err(|e| StateError::DeterminismViolation {
        message: format!("failed to serialize comparison: {}", e),
    })?;
    let reparsed: ComparisonResult =
        serde_json::from_str(&serialized).map_err(|e| StateError::DeterminismViolation {
            message: format!("failed to re-parse comparison: {}", e),
        })?;
    if &reparsed != result {
        return Err(StateError::DeterminismViolation {
            message: "comparison is not deterministic: round-trip produced different struct"
                .to_string(),
        });
    }
    Ok(())
}
