//! Core types shared across stateboard facilities
//!
//! This crate provides foundational types used by the error, logging and
//! presentation layers:
//!
//! - **Correlation types**: RequestId, RequestContext
//! - **Sensitive data**: Sensitive<T> marker for redacting state values
//! - **Schema constants**: Canonical log field keys and event names

pub mod correlation;
pub mod schema;
pub mod sensitive;

pub use correlation::{RequestContext, RequestId};
pub use sensitive::{Sensitive, REDACTED};
