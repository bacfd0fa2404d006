//! Stateboard CLI
//!
//! Command-line interface for browsing versioned infrastructure state

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "stateboard")]
#[command(about = "Stateboard - Infrastructure state history browser", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./stateboard.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database, overriding the configured path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ingest state files
    Ingest(commands::ingest::IngestArgs),
    /// Lineage and version operations
    State(commands::state::StateArgs),
    /// Search attributes across the latest version of every lineage
    Search(commands::browse::SearchArgs),
    /// List resource types, names or attribute keys
    Resources(commands::browse::ResourcesArgs),
    /// Tool versions in use, with counts
    ToolVersions(commands::browse::ToolVersionsArgs),
    /// Active locks across the configured providers
    Locks(commands::locks::LocksArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = commands::CliContext::load(cli.config.as_deref(), cli.db).and_then(|ctx| {
        match cli.command {
            Commands::Ingest(args) => commands::ingest::execute(&ctx, args),
            Commands::State(args) => commands::state::execute(&ctx, args),
            Commands::Search(args) => commands::browse::execute_search(&ctx, args),
            Commands::Resources(args) => commands::browse::execute_resources(&ctx, args),
            Commands::ToolVersions(args) => commands::browse::execute_tool_versions(&ctx, args),
            Commands::Locks(args) => commands::locks::execute(&ctx, args),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
