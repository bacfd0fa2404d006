//! Version ledger persistence.
//!
//! ## Responsibilities
//!
//! - Persist version rows with their raw payloads
//! - Enforce `(lineage, serial)` uniqueness with a compare-and-insert
//! - Write the resource/attribute browsing index in the same transaction
//!
//! ## Non-Responsibilities
//!
//! - Snapshot parsing (handled by `stateboard-core`)
//! - Orchestration and logging (handled by `stateboard-engine`)

pub mod persist;
pub mod query;

pub use persist::{insert_version, InsertOutcome};
