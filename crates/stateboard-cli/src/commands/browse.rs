//! Browsing commands over the attribute index

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use stateboard_core_types::RequestContext;
use stateboard_engine::{apply_engine_query, EngineQuery, EngineQueryResult};
use stateboard_store::search::{ToolVersionOrder, DEFAULT_SEARCH_LIMIT};
use stateboard_store::{AttributeMatch, AttributeQuery};

use super::{print_json, CliContext, CliResult};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(long)]
    pub lineage: Option<String>,

    /// Resource type, e.g. aws_instance
    #[arg(long = "type")]
    pub resource_type: Option<String>,

    /// Resource name
    #[arg(long)]
    pub name: Option<String>,

    /// Attribute path, e.g. tags.Name
    #[arg(long)]
    pub key: Option<String>,

    /// Substring of the attribute value
    #[arg(long)]
    pub value: Option<String>,

    #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub limit: usize,

    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    pub page: usize,
}

#[derive(Debug, Args)]
pub struct ResourcesArgs {
    #[command(subcommand)]
    pub command: ResourcesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ResourcesCommand {
    /// Resource types with instance counts
    Types,
    /// Distinct resource names
    Names {
        #[arg(long = "type")]
        resource_type: Option<String>,
    },
    /// Distinct attribute paths
    Keys {
        #[arg(long = "type")]
        resource_type: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrderBy {
    Version,
    Count,
}

#[derive(Debug, Args)]
pub struct ToolVersionsArgs {
    #[arg(long, value_enum, default_value = "version")]
    pub order_by: OrderBy,
}

#[derive(Debug, Serialize)]
struct SearchOutput {
    results: Vec<AttributeMatch>,
    page: usize,
    total: u64,
}

pub fn execute_search(ctx: &CliContext, args: SearchArgs) -> CliResult {
    if args.page == 0 {
        return Err("--page starts at 1".into());
    }
    let board = ctx.open_board()?;

    let query = AttributeQuery {
        lineage: args.lineage,
        resource_type: args.resource_type,
        resource_name: args.name,
        attribute_key: args.key,
        value_contains: args.value,
        limit: args.limit,
        offset: (args.page - 1) * args.limit,
    };
    match apply_engine_query(
        EngineQuery::AttributeSearch(query),
        &board,
        &RequestContext::new(),
    )? {
        EngineQueryResult::AttributeSearch(found) => print_json(&SearchOutput {
            results: found.matches,
            page: args.page,
            total: found.total,
        }),
        other => print_json(&other),
    }
}

pub fn execute_resources(ctx: &CliContext, args: ResourcesArgs) -> CliResult {
    let board = ctx.open_board()?;
    let query = match args.command {
        ResourcesCommand::Types => EngineQuery::ResourceTypes,
        ResourcesCommand::Names { resource_type } => EngineQuery::ResourceNames { resource_type },
        ResourcesCommand::Keys { resource_type } => EngineQuery::AttributeKeys { resource_type },
    };
    print_json(&apply_engine_query(query, &board, &RequestContext::new())?)
}

pub fn execute_tool_versions(ctx: &CliContext, args: ToolVersionsArgs) -> CliResult {
    let board = ctx.open_board()?;
    let order = match args.order_by {
        OrderBy::Version => ToolVersionOrder::Version,
        OrderBy::Count => ToolVersionOrder::Count,
    };
    print_json(&apply_engine_query(
        EngineQuery::ToolVersions { order },
        &board,
        &RequestContext::new(),
    )?)
}
