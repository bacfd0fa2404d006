//! Lineage and version commands

use clap::{Args, Subcommand};
use stateboard_core::lineage::{LineageKey, VersionId};
use stateboard_core_types::RequestContext;
use stateboard_engine::{apply_engine_query, EngineQuery, EngineQueryResult};

use super::{print_json, CliContext, CliResult};

#[derive(Debug, Args)]
pub struct StateArgs {
    #[command(subcommand)]
    pub command: StateCommand,
}

#[derive(Debug, Subcommand)]
pub enum StateCommand {
    /// List versions of a lineage, most recent first
    Versions { lineage: String },
    /// Print the default (latest) version id of a lineage
    Default { lineage: String },
    /// Print the attribute tree of a version
    Get {
        lineage: String,
        /// Version id (defaults to the latest version)
        #[arg(long)]
        version: Option<String>,
    },
    /// Compare two versions of a lineage
    Compare {
        lineage: String,
        #[arg(long)]
        from: String,
        /// Defaults to the latest version
        #[arg(long)]
        to: Option<String>,
        /// Print the structured comparison instead of the Markdown summary
        #[arg(long)]
        json: bool,
    },
    /// Per-version change counts, oldest first
    Activity { lineage: String },
    /// List lineages, most recently updated first
    Lineages {
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub fn execute(ctx: &CliContext, args: StateArgs) -> CliResult {
    let board = ctx.open_board()?;
    let request = RequestContext::new();

    let (query, as_json) = match args.command {
        StateCommand::Versions { lineage } => (
            EngineQuery::LineageVersions {
                lineage: LineageKey::new(lineage),
            },
            true,
        ),
        StateCommand::Default { lineage } => (
            EngineQuery::LineageDefaultVersion {
                lineage: LineageKey::new(lineage),
            },
            false,
        ),
        StateCommand::Get { lineage, version } => (
            EngineQuery::StateGet {
                lineage: LineageKey::new(lineage),
                version_id: version.map(VersionId::new),
            },
            true,
        ),
        StateCommand::Compare {
            lineage,
            from,
            to,
            json,
        } => (
            EngineQuery::StateCompare {
                lineage: LineageKey::new(lineage),
                from: Some(VersionId::new(from)),
                to: to.map(VersionId::new),
            },
            json,
        ),
        StateCommand::Activity { lineage } => (
            EngineQuery::LineageActivity {
                lineage: LineageKey::new(lineage),
            },
            true,
        ),
        StateCommand::Lineages { limit } => (EngineQuery::LineageList { limit }, true),
    };

    match apply_engine_query(query, &board, &request)? {
        EngineQueryResult::LineageDefaultVersion(summary) if !as_json => {
            println!("{}", summary.version_id);
            Ok(())
        }
        EngineQueryResult::StateCompare(result) if !as_json => {
            print!("{}", result.human_summary);
            Ok(())
        }
        other => print_json(&other),
    }
}
