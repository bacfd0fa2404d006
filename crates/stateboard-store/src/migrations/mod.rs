//! Schema migrations
//!
//! The SQL files under `migrations/` are compiled into the binary and applied
//! in order. Each applied file is recorded in `schema_version` together with
//! the SHA-256 of its text, so an edited migration is caught on the next open.

mod embedded;
mod runner;

pub use runner::{applied_migrations, apply_migrations, AppliedMigration};
