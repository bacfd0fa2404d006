//! Stateboard Engine - Orchestration layer
//!
//! Provides the query and command surface that coordinates the core domain
//! logic with the SQLite persistence layer, plus the TOML configuration
//! shared by every front end.

pub mod commands;
pub mod config;

pub use commands::engine_query::{apply_engine_query, Board, EngineQuery, EngineQueryResult};
pub use config::BoardConfig;
