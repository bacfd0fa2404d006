//! State file ingestion command

use clap::Args;
use stateboard_core::lineage::VersionId;
use stateboard_core_types::RequestContext;
use stateboard_engine::commands::ingest::{ingest_state, IngestOptions};
use std::path::PathBuf;

use super::{CliContext, CliResult};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// State files to ingest, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Version id to assign (single file only; defaults to a generated id)
    #[arg(long)]
    pub version_id: Option<String>,
}

pub fn execute(ctx: &CliContext, args: IngestArgs) -> CliResult {
    if args.version_id.is_some() && args.files.len() > 1 {
        return Err("--version-id can only be used with a single file".into());
    }

    let board = ctx.open_board()?;
    let request = RequestContext::new();

    for file in &args.files {
        let payload = std::fs::read(file)
            .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
        let options = IngestOptions {
            version_id: args.version_id.clone().map(VersionId::new),
            ..IngestOptions::default()
        };
        let result = ingest_state(&board, payload, options, &request)?;

        let verb = if result.recorded {
            "Recorded"
        } else {
            "Already recorded"
        };
        println!(
            "{} {} serial {} as {}",
            verb, result.version.lineage, result.version.serial, result.version.version_id
        );
    }

    Ok(())
}
