use stateboard_core_types::RequestId;
use thiserror::Error;

/// Result type alias using StateError
pub type Result<T> = std::result::Result<T, StateError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every error leaving the core or the store is classified by one of these
/// kinds. Each kind maps to a stable code used by the presentation layer to
/// choose a response class (invalid input, not found, conflict, upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Snapshot input
    /// Raw payload cannot be normalized into an attribute tree
    MalformedSnapshot,
    /// Attribute tree violates the flattened-leaf invariant (defensive)
    IncomparableSnapshot,

    // Lookup
    UnknownLineage,
    VersionNotFound,
    NotFound,
    InvalidInput,

    // Ingestion
    /// Same (lineage, serial) recorded with a different content hash
    DivergentVersion,

    // Lock providers
    ProviderUnavailable,
    Timeout,

    // Diff
    DeterminismViolation,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    Concurrency,
    Configuration,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::MalformedSnapshot => "ERR_MALFORMED_SNAPSHOT",
            ExErrorKind::IncomparableSnapshot => "ERR_INCOMPARABLE_SNAPSHOT",
            ExErrorKind::UnknownLineage => "ERR_UNKNOWN_LINEAGE",
            ExErrorKind::VersionNotFound => "ERR_VERSION_NOT_FOUND",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::DivergentVersion => "ERR_DIVERGENT_VERSION",
            ExErrorKind::ProviderUnavailable => "ERR_PROVIDER_UNAVAILABLE",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::DeterminismViolation => "ERR_DETERMINISM_VIOLATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// True for kinds that describe a caller-supplied identifier with no record
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ExErrorKind::UnknownLineage | ExErrorKind::VersionNotFound | ExErrorKind::NotFound
        )
    }
}

/// Canonical structured error type
///
/// Carries the classification plus whatever entity context was known at the
/// failure point. Built with the `with_*` methods.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    lineage: Option<String>,
    version_id: Option<String>,
    serial: Option<u64>,
    provider: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            lineage: None,
            version_id: None,
            serial: None,
            provider: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_lineage(mut self, lineage: impl Into<String>) -> Self {
        self.lineage = Some(lineage.into());
        self
    }

    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    pub fn with_serial(mut self, serial: u64) -> Self {
        self.serial = Some(serial);
        self
    }

    /// Name the lock provider the error came from
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn lineage(&self) -> Option<&str> {
        self.lineage.as_deref()
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }

    pub fn serial(&self) -> Option<u64> {
        self.serial
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(lineage) = &self.lineage {
            write!(f, " (lineage: {})", lineage)?;
        }
        if let Some(version_id) = &self.version_id {
            write!(f, " (version_id: {})", version_id)?;
        }
        if let Some(serial) = self.serial {
            write!(f, " (serial: {})", serial)?;
        }
        if let Some(provider) = &self.provider {
            write!(f, " (provider: {})", provider)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain error taxonomy for state browsing operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// Raw payload could not be normalized into modules/resources/attributes
    #[error("Malformed snapshot: {reason}")]
    MalformedSnapshot { reason: String },

    /// Lineage has no recorded versions
    #[error("Unknown lineage: {lineage}")]
    UnknownLineage { lineage: String },

    /// Version identifier does not belong to the lineage
    #[error("Version {version_id} not found in lineage {lineage}")]
    VersionNotFound { lineage: String, version_id: String },

    /// Two snapshots claim the same (lineage, serial) with different content
    #[error(
        "Divergent version for lineage {lineage} serial {serial}: recorded hash {existing_hash}, incoming hash {incoming_hash}"
    )]
    DivergentVersion {
        lineage: String,
        serial: u64,
        existing_hash: String,
        incoming_hash: String,
    },

    /// A lock provider errored or timed out
    #[error("Lock provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// An input tree is not in flattened form
    #[error("Incomparable snapshot: {reason}")]
    IncomparableSnapshot { reason: String },

    /// Serialized comparison did not round-trip to an equal value
    #[error("Determinism violation: {message}")]
    DeterminismViolation { message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StateError {
    /// Canonical kind for this error
    pub fn kind(&self) -> ExErrorKind {
        match self {
            StateError::MalformedSnapshot { .. } => ExErrorKind::MalformedSnapshot,
            StateError::UnknownLineage { .. } => ExErrorKind::UnknownLineage,
            StateError::VersionNotFound { .. } => ExErrorKind::VersionNotFound,
            StateError::DivergentVersion { .. } => ExErrorKind::DivergentVersion,
            StateError::ProviderUnavailable { .. } => ExErrorKind::ProviderUnavailable,
            StateError::IncomparableSnapshot { .. } => ExErrorKind::IncomparableSnapshot,
            StateError::DeterminismViolation { .. } => ExErrorKind::DeterminismViolation,
            StateError::Persistence { .. } => ExErrorKind::Persistence,
            StateError::Serialization { .. } => ExErrorKind::Serialization,
            StateError::Internal { .. } => ExErrorKind::Internal,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        StateError::MalformedSnapshot {
            reason: reason.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        StateError::Internal {
            message: message.into(),
        }
    }
}

impl From<StateError> for ExError {
    fn from(err: StateError) -> Self {
        let kind = err.kind();
        match err {
            StateError::MalformedSnapshot { reason } => ExError::new(kind)
                .with_op("build_tree")
                .with_message(reason),

            StateError::UnknownLineage { lineage } => ExError::new(kind)
                .with_lineage(lineage)
                .with_message("Lineage has no recorded versions"),

            StateError::VersionNotFound {
                lineage,
                version_id,
            } => ExError::new(kind)
                .with_lineage(lineage)
                .with_version_id(version_id)
                .with_message("Version does not belong to lineage"),

            StateError::DivergentVersion {
                lineage,
                serial,
                existing_hash,
                incoming_hash,
            } => ExError::new(kind)
                .with_op("record_version")
                .with_lineage(lineage)
                .with_serial(serial)
                .with_message(format!(
                    "recorded content hash {} differs from incoming {}",
                    existing_hash, incoming_hash
                )),

            StateError::ProviderUnavailable { provider, reason } => ExError::new(kind)
                .with_op("get_locks")
                .with_provider(provider)
                .with_message(reason),

            StateError::IncomparableSnapshot { reason } => ExError::new(kind)
                .with_op("compare")
                .with_message(reason),

            StateError::DeterminismViolation { message } => ExError::new(kind)
                .with_op("compare")
                .with_message(message),

            StateError::Persistence { message }
            | StateError::Serialization { message }
            | StateError::Internal { message } => ExError::new(kind).with_message(message),
        }
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        let cases = [
            (ExErrorKind::MalformedSnapshot, "ERR_MALFORMED_SNAPSHOT"),
            (ExErrorKind::UnknownLineage, "ERR_UNKNOWN_LINEAGE"),
            (ExErrorKind::VersionNotFound, "ERR_VERSION_NOT_FOUND"),
            (ExErrorKind::DivergentVersion, "ERR_DIVERGENT_VERSION"),
            (ExErrorKind::ProviderUnavailable, "ERR_PROVIDER_UNAVAILABLE"),
            (ExErrorKind::IncomparableSnapshot, "ERR_INCOMPARABLE_SNAPSHOT"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_divergent_version_converts_with_context() {
        let err = StateError::DivergentVersion {
            lineage: "prod/vpc".into(),
            serial: 7,
            existing_hash: "aaa".into(),
            incoming_hash: "bbb".into(),
        };
        let ex: ExError = err.into();
        assert_eq!(ex.kind(), ExErrorKind::DivergentVersion);
        assert_eq!(ex.lineage(), Some("prod/vpc"));
        assert_eq!(ex.serial(), Some(7));
        assert!(ex.message().contains("aaa"));
        assert!(ex.message().contains("bbb"));
    }

    #[test]
    fn test_provider_unavailable_names_provider() {
        let ex: ExError = StateError::ProviderUnavailable {
            provider: "s3-eu".into(),
            reason: "timed out after 50 ms".into(),
        }
        .into();
        assert_eq!(ex.provider(), Some("s3-eu"));
        assert!(ex.to_string().contains("ERR_PROVIDER_UNAVAILABLE"));
        assert!(ex.to_string().contains("s3-eu"));
    }

    #[test]
    fn test_not_found_kinds() {
        assert!(ExErrorKind::UnknownLineage.is_not_found());
        assert!(ExErrorKind::VersionNotFound.is_not_found());
        assert!(!ExErrorKind::DivergentVersion.is_not_found());
    }

    #[test]
    fn test_source_chain() {
        let inner = ExError::new(ExErrorKind::Io).with_message("disk gone");
        let outer = ExError::new(ExErrorKind::Persistence).with_source(inner);
        assert_eq!(
            outer.source_error().map(|e| e.kind()),
            Some(ExErrorKind::Io)
        );
        assert!(std::error::Error::source(&outer).is_some());
    }
}
