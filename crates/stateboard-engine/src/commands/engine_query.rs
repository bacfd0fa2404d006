//! Engine-level read-only query surface.
//!
//! `apply_engine_query` is the single entry point for every browsing query.
//! It never writes to the ledger. Each query is logged with the canonical
//! start/end/end_error events carrying the caller's request id.

#![allow(clippy::result_large_err)]

use serde::Serialize;
use stateboard_core::diff::{compare, render_human_summary, ComparisonResult};
use stateboard_core::lineage::{
    LineageActivity, LineageKey, LineageRegistry, LineageSummary, VersionId, VersionSummary,
};
use stateboard_core::resolver::VersionResolver;
use stateboard_core::tree::AttributeTree;
use stateboard_core::{log_op_end, log_op_error, log_op_start};
use stateboard_core_types::RequestContext;
use stateboard_store::errors::Result;
use stateboard_store::search::{
    AttributeQuery, ResourceTypeCount, SearchPage, ToolVersionCount, ToolVersionOrder,
};
use stateboard_store::SqliteVersionStore;

/// Lineage registry over the SQLite ledger
pub type Board = LineageRegistry<SqliteVersionStore>;

// ---------------------------------------------------------------------------
// EngineQuery
// ---------------------------------------------------------------------------

/// Read-only queries supported by the engine.
#[derive(Debug, Clone)]
pub enum EngineQuery {
    // ── State ─────────────────────────────────────────────────────────────────
    /// Tree of one version; `None` resolves to the default version.
    StateGet {
        lineage: LineageKey,
        version_id: Option<VersionId>,
    },
    /// Attribute-level comparison of two versions of a lineage.
    StateCompare {
        lineage: LineageKey,
        from: Option<VersionId>,
        to: Option<VersionId>,
    },

    // ── Lineage ───────────────────────────────────────────────────────────────
    /// Versions of a lineage, most recent first.
    LineageVersions { lineage: LineageKey },
    LineageDefaultVersion { lineage: LineageKey },
    /// Per-version change counts, oldest first.
    LineageActivity { lineage: LineageKey },
    LineageList { limit: Option<usize> },

    // ── Browsing index ────────────────────────────────────────────────────────
    ResourceTypes,
    ResourceNames { resource_type: Option<String> },
    AttributeKeys { resource_type: Option<String> },
    AttributeSearch(AttributeQuery),
    ToolVersions { order: ToolVersionOrder },
}

impl EngineQuery {
    /// Canonical `op` field for logs
    pub fn op_name(&self) -> &'static str {
        match self {
            EngineQuery::StateGet { .. } => "state_get",
            EngineQuery::StateCompare { .. } => "state_compare",
            EngineQuery::LineageVersions { .. } => "lineage_versions",
            EngineQuery::LineageDefaultVersion { .. } => "lineage_default_version",
            EngineQuery::LineageActivity { .. } => "lineage_activity",
            EngineQuery::LineageList { .. } => "lineage_list",
            EngineQuery::ResourceTypes => "resource_types",
            EngineQuery::ResourceNames { .. } => "resource_names",
            EngineQuery::AttributeKeys { .. } => "attribute_keys",
            EngineQuery::AttributeSearch(_) => "attribute_search",
            EngineQuery::ToolVersions { .. } => "tool_versions",
        }
    }
}

// ---------------------------------------------------------------------------
// EngineQueryResult
// ---------------------------------------------------------------------------

/// Values under sensitive paths are already redacted.
#[derive(Debug, Clone, Serialize)]
pub struct StateGetResult {
    pub version: VersionSummary,
    pub tree: AttributeTree,
}

/// The structured + rendered result of a `StateCompare` query.
#[derive(Debug, Clone, Serialize)]
pub struct StateCompareResult {
    pub from: VersionSummary,
    pub to: VersionSummary,
    /// Machine-readable structured diff; sensitive entries are redacted
    pub comparison: ComparisonResult,
    /// Human-readable Markdown summary
    pub human_summary: String,
}

/// All possible results from `apply_engine_query`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EngineQueryResult {
    StateGet(Box<StateGetResult>),
    StateCompare(Box<StateCompareResult>),
    LineageVersions(Vec<VersionSummary>),
    LineageDefaultVersion(VersionSummary),
    LineageActivity(LineageActivity),
    LineageList(Vec<LineageSummary>),
    ResourceTypes(Vec<ResourceTypeCount>),
    ResourceNames(Vec<String>),
    AttributeKeys(Vec<String>),
    AttributeSearch(SearchPage),
    ToolVersions(Vec<ToolVersionCount>),
}

// ---------------------------------------------------------------------------
// apply_engine_query
// ---------------------------------------------------------------------------

/// Run one read-only query against the board
///
/// # Errors
///
/// `UnknownLineage` / `VersionNotFound` for unresolvable identifiers,
/// `Persistence` on storage failure, `DeterminismViolation` if a comparison
/// does not round-trip. The returned error carries the request id.
pub fn apply_engine_query(
    query: EngineQuery,
    board: &Board,
    ctx: &RequestContext,
) -> Result<EngineQueryResult> {
    let op = query.op_name();
    log_op_start!(
        op,
        request_id = %ctx.request_id,
        operator = ctx.operator_or_anonymous()
    );
    let start = std::time::Instant::now();

    let result = run_query(query, board).map_err(|e| e.with_request_id(ctx.request_id.clone()));

    let elapsed = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => log_op_end!(op, duration_ms = elapsed, request_id = %ctx.request_id),
        Err(e) => {
            let e_clone = e.clone();
            log_op_error!(op, e_clone, duration_ms = elapsed, request_id = %ctx.request_id);
        }
    }
    result
}

fn run_query(query: EngineQuery, board: &Board) -> Result<EngineQueryResult> {
    let resolver = VersionResolver::new(board);
    let store = board.store();

    let result = match query {
        EngineQuery::StateGet {
            lineage,
            version_id,
        } => {
            let version_id = resolver.resolve(&lineage, version_id.as_ref())?;
            let version = board.version_summary(&lineage, &version_id)?;
            let tree = board.load_tree(&lineage, &version_id)?.redacted();
            EngineQueryResult::StateGet(Box::new(StateGetResult { version, tree }))
        }

        EngineQuery::StateCompare { lineage, from, to } => {
            let from_id = resolver.resolve(&lineage, from.as_ref())?;
            let to_id = resolver.resolve(&lineage, to.as_ref())?;
            let from_tree = board.load_tree(&lineage, &from_id)?;
            let to_tree = board.load_tree(&lineage, &to_id)?;

            let comparison = compare(&from_tree, &to_tree)?;
            tracing::debug!(
                lineage = %lineage,
                from = %from_id,
                to = %to_id,
                entry_count = comparison.change_count(),
                "Compared versions"
            );
            let human_summary = render_human_summary(&comparison);

            EngineQueryResult::StateCompare(Box::new(StateCompareResult {
                from: board.version_summary(&lineage, &from_id)?,
                to: board.version_summary(&lineage, &to_id)?,
                comparison: comparison.redacted(),
                human_summary,
            }))
        }

        EngineQuery::LineageVersions { lineage } => {
            EngineQueryResult::LineageVersions(board.list_versions(&lineage)?)
        }

        EngineQuery::LineageDefaultVersion { lineage } => {
            EngineQueryResult::LineageDefaultVersion(board.latest_summary(&lineage)?)
        }

        EngineQuery::LineageActivity { lineage } => {
            EngineQueryResult::LineageActivity(board.lineage_activity(&lineage)?)
        }

        EngineQuery::LineageList { limit } => {
            EngineQueryResult::LineageList(board.list_lineages(limit)?)
        }

        EngineQuery::ResourceTypes => EngineQueryResult::ResourceTypes(store.list_resource_types()?),

        EngineQuery::ResourceNames { resource_type } => {
            EngineQueryResult::ResourceNames(store.list_resource_names(resource_type.as_deref())?)
        }

        EngineQuery::AttributeKeys { resource_type } => {
            EngineQueryResult::AttributeKeys(store.list_attribute_keys(resource_type.as_deref())?)
        }

        EngineQuery::AttributeSearch(query) => {
            EngineQueryResult::AttributeSearch(store.search_attributes(&query)?)
        }

        EngineQuery::ToolVersions { order } => {
            EngineQueryResult::ToolVersions(store.list_tool_versions(order)?)
        }
    };

    Ok(result)
}
