//! Human-readable summary renderer for comparisons.

use crate::diff::model::{ChangeEntry, ChangeKind, ComparisonResult, DiffClassification};
use crate::tree::AttributeValue;
use stateboard_core_types::Sensitive;

/// Render a Markdown summary of a [`ComparisonResult`]
///
/// Values of sensitive attributes are redacted. The summary is for review
/// only and carries no information the structured result lacks.
pub fn render_human_summary(result: &ComparisonResult) -> String {
    let mut out = String::new();

    out.push_str("## State Comparison\n\n");
    let class_label = match result.classification {
        DiffClassification::Identical => "Identical",
        DiffClassification::Changed => "Changed",
    };
    out.push_str(&format!("**Classification**: {class_label}\n\n"));

    out.push_str(&format!(
        "| | Digest |\n|---|---|\n| From | `{}` |\n| To | `{}` |\n\n",
        short(&result.from_digest),
        short(&result.to_digest),
    ));

    if result.classification == DiffClassification::Identical {
        out.push_str("_No changes detected._\n");
        return out;
    }

    let stats = &result.stats;
    out.push_str("### Summary\n\n");
    out.push_str(&format!(
        "- **Attributes**: {} added, {} removed, {} modified\n",
        stats.added, stats.removed, stats.modified
    ));
    out.push_str(&format!(
        "- **Resources**: {} added, {} removed, {} changed\n\n",
        stats.resources_added, stats.resources_removed, stats.resources_changed
    ));

    if !result.added_resources.is_empty() {
        out.push_str("### Added Resources\n\n");
        for id in &result.added_resources {
            out.push_str(&format!("- `{}`\n", id));
        }
        out.push('\n');
    }

    if !result.removed_resources.is_empty() {
        out.push_str("### Removed Resources\n\n");
        for id in &result.removed_resources {
            out.push_str(&format!("- `{}`\n", id));
        }
        out.push('\n');
    }

    out.push_str("### Attribute Changes\n\n");
    let mut current = None;
    for entry in &result.entries {
        if current != Some(&entry.resource) {
            if current.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("#### `{}`\n\n", entry.resource));
            current = Some(&entry.resource);
        }
        out.push_str(&render_entry(entry));
    }

    out
}

fn render_entry(entry: &ChangeEntry) -> String {
    let show = |value: &Option<AttributeValue>| -> String {
        match value {
            None => String::new(),
            Some(v) if entry.sensitive => Sensitive::new(v).to_string(),
            Some(v) => v.to_string(),
        }
    };
    match entry.kind {
        ChangeKind::Added => format!("- `+` `{}`: `{}`\n", entry.path, show(&entry.new)),
        ChangeKind::Removed => format!("- `-` `{}`: `{}`\n", entry.path, show(&entry.old)),
        ChangeKind::Modified => format!(
            "- `~` `{}`: `{}` → `{}`\n",
            entry.path,
            show(&entry.old),
            show(&entry.new)
        ),
    }
}

fn short(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
