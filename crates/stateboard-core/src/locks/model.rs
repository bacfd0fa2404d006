//! Lock records and aggregation reports.

use crate::lineage::LineageKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An active lock as reported by a state provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub lineage: LineageKey,
    pub id: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Holder, usually `user@host`
    pub who: String,
    /// Tool version of the holder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl LockInfo {
    /// Same holder and acquisition time means the same lock
    pub fn same_claim(&self, other: &LockInfo) -> bool {
        self.who == other.who && self.created == other.created
    }
}

/// A lock together with the provider that reported it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockClaim {
    pub provider: String,
    pub lock: LockInfo,
}

/// Every claim on a contested lineage, in provider configuration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConflict {
    pub lineage: LineageKey,
    pub claims: Vec<LockClaim>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

/// Merged view of all providers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockReport {
    /// One lock per lineage; the last-seen claim on conflict
    pub locks: BTreeMap<LineageKey, LockInfo>,
    pub conflicts: Vec<LockConflict>,
    /// Providers that failed under the best-effort policy
    pub unavailable: Vec<ProviderFailure>,
    pub providers_queried: usize,
}

impl LockReport {
    pub fn is_locked(&self, lineage: &LineageKey) -> bool {
        self.locks.contains_key(lineage)
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}
