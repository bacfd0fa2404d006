//! Store-side error constructors
//!
//! Everything in this crate reports `ExError`. The `VersionStore` seam speaks
//! `StateError`, so [`into_state_error`] folds the two together there.

use stateboard_core::errors::{ExError, ExErrorKind, StateError};
use std::fmt::Display;

pub type Result<T> = std::result::Result<T, ExError>;

fn persistence(op: &str, message: String) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op(op.to_string())
        .with_message(message)
}

pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    persistence("migration", format!("{} did not apply: {}", migration_id, reason))
}

/// An applied migration whose SQL has since changed
pub fn checksum_mismatch(migration_id: &str, recorded: &str, embedded: &str) -> ExError {
    persistence(
        "migration_checksum",
        format!(
            "{} was applied with checksum {} but the bundled SQL hashes to {}",
            migration_id, recorded, embedded
        ),
    )
}

pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    persistence("sqlite", err.to_string())
}

/// A stored integer that does not fit the Rust type it maps to
pub fn out_of_range(column: &str, value: impl Display) -> ExError {
    persistence("sqlite", format!("{} holds {}, outside the expected range", column, value))
}

pub fn io_error(op: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(op.to_string())
        .with_message(err.to_string())
}

pub fn into_state_error(err: ExError) -> StateError {
    let message = err.to_string();
    match err.kind() {
        ExErrorKind::Serialization => StateError::Serialization { message },
        ExErrorKind::Internal | ExErrorKind::Concurrency => StateError::Internal { message },
        _ => StateError::Persistence { message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_failures_are_persistence() {
        let err = from_rusqlite(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.kind(), ExErrorKind::Persistence);
        assert_eq!(err.op(), Some("sqlite"));
    }

    #[test]
    fn test_folding_keeps_the_reason() {
        match into_state_error(migration_error("001_versions", "syntax error")) {
            StateError::Persistence { message } => assert!(message.contains("syntax error")),
            other => panic!("expected Persistence, got {:?}", other),
        }
        assert!(matches!(
            into_state_error(ExError::new(ExErrorKind::Concurrency)),
            StateError::Internal { .. }
        ));
    }
}
