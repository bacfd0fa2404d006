//! Board configuration loaded from TOML.
//!
//! ```toml
//! [database]
//! path = ".stateboard/store.db"
//!
//! [logging]
//! profile = "development"
//!
//! [locks]
//! timeout_ms = 5000
//! failure_policy = "fail_fast"
//!
//! [[locks.providers]]
//! name = "local"
//! dir = "/var/lib/stateboard/locks"
//! ```

#![allow(clippy::result_large_err)]

use serde::{Deserialize, Serialize};
use stateboard_core::errors::{ExError, ExErrorKind};
use stateboard_core::locks::{AggregatorConfig, FailurePolicy};
use stateboard_core::logging_facility::Profile;
use stateboard_store::errors::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "stateboard.toml";
pub const DEFAULT_DB_PATH: &str = ".stateboard/store.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub locks: LocksConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocksConfig {
    pub timeout_ms: u64,
    pub failure_policy: FailurePolicy,
    pub providers: Vec<LockProviderConfig>,
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            failure_policy: FailurePolicy::FailFast,
            providers: Vec::new(),
        }
    }
}

/// A directory of `*.lock.json` files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockProviderConfig {
    pub name: String,
    pub dir: PathBuf,
}

fn config_error(message: String) -> ExError {
    ExError::new(ExErrorKind::Configuration)
        .with_op("load_config")
        .with_message(message)
}

impl BoardConfig {
    /// # Errors
    ///
    /// `Configuration` if the document is not valid TOML for this schema.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| config_error(format!("invalid config: {}", e)))
    }

    /// Load configuration
    ///
    /// An explicit `path` must exist. Without one, `stateboard.toml` in the
    /// working directory is used when present, else the defaults.
    ///
    /// # Errors
    ///
    /// `Configuration` if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .map_err(|e| config_error(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
            .map_err(|e| config_error(format!("{}: {}", path.display(), e.message())))
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            provider_timeout: Duration::from_millis(self.locks.timeout_ms),
            failure_policy: self.locks.failure_policy,
        }
    }
}
