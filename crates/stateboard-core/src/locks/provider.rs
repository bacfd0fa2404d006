//! State provider collaborator.

use crate::lineage::LineageKey;
use crate::locks::model::LockInfo;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure reported by a single provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid lock info in {location}: {reason}")]
    InvalidLockInfo { location: String, reason: String },

    #[error("Backend error: {0}")]
    Backend(String),
}

/// A backing state store able to report its active locks
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Name used in reports and errors
    fn name(&self) -> &str;

    /// Active locks keyed by lineage
    ///
    /// # Errors
    ///
    /// Any [`ProviderError`]; the aggregator applies its failure policy.
    async fn get_locks(&self) -> Result<BTreeMap<LineageKey, LockInfo>, ProviderError>;
}
