//! Stateboard Core - infrastructure state history and comparison
//!
//! This crate provides the domain kernel for browsing versioned
//! infrastructure state, including:
//! - Attribute trees normalized from raw state snapshots (format v3 and v4)
//! - A deterministic attribute-level diff engine
//! - The lineage registry with divergence detection
//! - Version identifier resolution
//! - Concurrent lock aggregation across state providers
//!
//! Persistence lives in `stateboard-store`; orchestration and logging of
//! operations live in `stateboard-engine`.

pub mod diff;
pub mod digest;
pub mod errors;
pub mod lineage;
pub mod locks;
pub mod logging_facility;
pub mod resolver;
pub mod tree;

#[doc(hidden)]
pub use stateboard_core_types as __core_types;
#[doc(hidden)]
pub use tracing as __tracing;

// Re-export commonly used types
pub use diff::{compare, ComparisonResult};
pub use errors::{ExError, ExErrorKind, Result, StateError};
pub use lineage::{LineageKey, LineageRegistry, VersionId, VersionStore};
pub use locks::{LockAggregator, StateProvider};
pub use resolver::VersionResolver;
pub use tree::{build_tree, AttributeTree};
