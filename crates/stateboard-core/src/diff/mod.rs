//! Diff engine.
//!
//! Compares two attribute trees and produces a structured, deterministic
//! list of attribute-level changes.
//!
//! ## Entry point
//!
//! ```ignore
//! use stateboard_core::diff::engine::compare;
//!
//! let result = compare(&from_tree, &to_tree)?;
//! let summary = stateboard_core::diff::human_summary::render_human_summary(&result);
//! ```
//!
//! ## Guarantees
//!
//! - **Determinism**: identical inputs produce byte-identical serialized output.
//! - **Identity**: comparing a tree with itself yields no entries.
//! - **Antisymmetry**: `compare(a, b)` and `compare(b, a)` swap added/removed
//!   and old/new.
//! - **Completeness**: applying the entries of `compare(a, b)` to `a` yields `b`.

pub mod engine;
pub mod human_summary;
pub mod model;

pub use engine::compare;
pub use human_summary::render_human_summary;
pub use model::{ChangeEntry, ChangeKind, ComparisonResult, DiffClassification, DiffStats};
