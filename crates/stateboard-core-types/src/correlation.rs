//! Request correlation
//!
//! Every engine call receives a `RequestContext`. Its id is stamped on the
//! operation's log events and on any error it returns, so one compare or lock
//! lookup can be followed from the CLI down to the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one engine request; time ordered when generated
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        RequestId(Uuid::now_v7().to_string())
    }

    /// Adopt an id minted by the caller
    pub fn from_string(id: String) -> Self {
        RequestId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        RequestId::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller identity as resolved by the front end; echoed into logs, never checked
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub operator: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        RequestContext::default()
    }

    pub fn with_request_id(request_id: RequestId) -> Self {
        RequestContext {
            request_id,
            ..RequestContext::default()
        }
    }

    pub fn with_operator(self, operator: impl Into<String>) -> Self {
        RequestContext {
            operator: Some(operator.into()),
            ..self
        }
    }

    pub fn operator_or_anonymous(&self) -> &str {
        match &self.operator {
            Some(name) => name,
            None => "anonymous",
        }
    }
}
