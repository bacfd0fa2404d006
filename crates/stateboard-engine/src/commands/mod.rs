//! Command orchestration layer.
//!
//! Read-only browsing goes through [`engine_query`]; ingestion and lock
//! aggregation have their own entry points because they write to the
//! ledger or run on the async runtime.

pub mod engine_query;
pub mod ingest;
pub mod locks;
