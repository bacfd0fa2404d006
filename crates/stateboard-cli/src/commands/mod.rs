//! Subcommand implementations and the shared invocation context.

use serde::Serialize;
use stateboard_core::lineage::LineageRegistry;
use stateboard_core::logging_facility;
use stateboard_engine::{Board, BoardConfig};
use stateboard_store::SqliteVersionStore;
use std::path::{Path, PathBuf};

pub mod browse;
pub mod ingest;
pub mod locks;
pub mod state;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Configuration resolved from file and global flags
pub struct CliContext {
    pub config: BoardConfig,
}

impl CliContext {
    /// Load configuration, apply `--db`, and initialize logging
    pub fn load(
        config_path: Option<&Path>,
        db: Option<PathBuf>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = BoardConfig::load(config_path)?;
        if let Some(db) = db {
            config.database.path = db;
        }
        logging_facility::init(config.logging.profile);
        Ok(Self { config })
    }

    pub fn open_board(&self) -> Result<Board, Box<dyn std::error::Error>> {
        let store = SqliteVersionStore::open(&self.config.database.path)?;
        Ok(LineageRegistry::new(store))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
