//! Lock aggregation.
//!
//! Locks are never persisted. Every aggregation queries the configured
//! [`StateProvider`]s and merges their live answers.

pub mod aggregator;
pub mod model;
pub mod provider;

pub use aggregator::{AggregatorConfig, FailurePolicy, LockAggregator};
pub use model::{LockClaim, LockConflict, LockInfo, LockReport, ProviderFailure};
pub use provider::{ProviderError, StateProvider};
