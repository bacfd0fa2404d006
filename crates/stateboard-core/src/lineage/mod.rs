//! Lineages and their versions.
//!
//! A lineage is one logically continuous state file. Each ingested snapshot
//! becomes an immutable version identified by an opaque [`VersionId`] and
//! ordered by `(serial, created_at, version_id)`.

pub mod model;
pub mod registry;
pub mod store;

pub use model::{
    ActivityEntry, LineageActivity, LineageKey, LineageSummary, NewVersion, RecordOutcome,
    VersionId, VersionRecord, VersionSummary,
};
pub use registry::LineageRegistry;
pub use store::{MemoryVersionStore, VersionStore};
