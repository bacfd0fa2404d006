//! Stateboard Store - SQLite persistence for versioned infrastructure state
//!
//! Provides:
//! - SQLite schema with a checksummed migrations framework
//! - The version ledger with `(lineage, serial)` compare-and-insert
//! - A resource/attribute index for browsing and search
//! - A directory-backed lock provider

pub mod db;
pub mod errors;
pub mod lock_dir;
pub mod migrations;
pub mod search;
pub mod sqlite_store;
pub mod versions;

// Re-export key types
pub use errors::Result;
pub use lock_dir::LockDirProvider;
pub use search::{AttributeMatch, AttributeQuery, SearchPage, ToolVersionOrder};
pub use sqlite_store::SqliteVersionStore;
