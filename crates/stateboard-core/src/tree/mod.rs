//! Attribute tree: the normalized, immutable form of one state snapshot.
//!
//! A tree maps canonical resource identifiers to flattened attribute paths.
//! Nested attribute values are flattened at construction time (`tags.Name`,
//! `ingress.0.from_port`) so the diff engine compares leaves key by key.
//!
//! ## Responsibilities
//!
//! - Parse raw state payloads (format v3 and v4) into a tree
//! - Canonicalize resource identifiers across tool versions
//! - Compute the content hash used for divergence detection
//!
//! ## Non-Responsibilities
//!
//! - Interpreting resource semantics
//! - Persistence (handled by `stateboard-store`)

pub mod builder;
pub mod model;

pub use builder::{build_tree, parse_snapshot, ParsedSnapshot};
pub use model::{
    AttributePath, AttributeTree, AttributeValue, ResourceId, ResourceIndex, ResourceMode,
    ResourceState,
};
