//! Snapshot ingestion.
//!
//! ## Pipeline (in order):
//! 1. Parse the payload into a tree plus header fields (MalformedSnapshot)
//! 2. Build the version record (lineage and serial required)
//! 3. Record through the registry (DivergentVersion surfaces from here)

#![allow(clippy::result_large_err)]

use chrono::{DateTime, Utc};
use serde::Serialize;
use stateboard_core::errors::{ExError, StateError};
use stateboard_core::lineage::{NewVersion, RecordOutcome, VersionId, VersionSummary};
use stateboard_core::tree::parse_snapshot;
use stateboard_core::{log_op_end, log_op_error, log_op_start};
use stateboard_core_types::RequestContext;
use stateboard_store::errors::Result;

use crate::commands::engine_query::Board;

/// Overrides for the generated version metadata.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Defaults to a fresh UUIDv7
    pub version_id: Option<VersionId>,
    /// Defaults to now
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestResult {
    pub version: VersionSummary,
    /// False when the same content was already recorded
    pub recorded: bool,
}

/// Parse and record one state payload
///
/// # Errors
///
/// `MalformedSnapshot` if the payload cannot be parsed or lacks lineage or
/// serial, `DivergentVersion` if the serial is already recorded with other
/// content, `Persistence` on storage failure.
pub fn ingest_state(
    board: &Board,
    payload: Vec<u8>,
    options: IngestOptions,
    ctx: &RequestContext,
) -> Result<IngestResult> {
    log_op_start!(
        "ingest_state",
        request_id = %ctx.request_id,
        operator = ctx.operator_or_anonymous(),
        bytes = payload.len()
    );
    let start = std::time::Instant::now();

    let result = record(board, payload, options);

    let elapsed = start.elapsed().as_millis() as u64;
    match &result {
        Ok(outcome) => {
            let summary = outcome.summary();
            log_op_end!(
                "ingest_state",
                duration_ms = elapsed,
                request_id = %ctx.request_id,
                lineage = %summary.lineage,
                version_id = %summary.version_id,
                serial = summary.serial,
                recorded = outcome.is_new()
            );
        }
        Err(e) => {
            if let StateError::DivergentVersion {
                lineage,
                serial,
                existing_hash,
                incoming_hash,
            } = e
            {
                tracing::warn!(
                    lineage = %lineage,
                    serial = serial,
                    existing_hash = %existing_hash,
                    incoming_hash = %incoming_hash,
                    "Divergent history: serial already recorded with different content"
                );
            }
            log_op_error!(
                "ingest_state",
                e.clone(),
                duration_ms = elapsed,
                request_id = %ctx.request_id
            );
        }
    }

    let outcome =
        result.map_err(|e| ExError::from(e).with_request_id(ctx.request_id.clone()))?;
    Ok(IngestResult {
        recorded: outcome.is_new(),
        version: outcome.summary().clone(),
    })
}

fn record(
    board: &Board,
    payload: Vec<u8>,
    options: IngestOptions,
) -> stateboard_core::Result<RecordOutcome> {
    let parsed = parse_snapshot(&payload)?;
    let mut version = NewVersion::from_snapshot(&parsed, payload)?;
    if let Some(version_id) = options.version_id {
        version = version.with_version_id(version_id);
    }
    if let Some(created_at) = options.created_at {
        version = version.with_created_at(created_at);
    }
    board.record_version(version)
}
