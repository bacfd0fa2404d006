//! Operation boundary macros
//!
//! Every engine operation emits exactly one `start` event followed by either
//! one `end` or one `end_error` event. All three carry `component`, `op` and
//! `event`; callers append their own fields (request id, lineage, counts).

/// Emit the `start` event of an operation
///
/// ```
/// # use stateboard_core::log_op_start;
/// log_op_start!("state_compare");
/// log_op_start!("state_compare", lineage = "prod/vpc");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)+)?) => {
        $crate::__tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::__core_types::schema::EVENT_START
            $(, $($field)+)?
        )
    };
}

/// Emit the `end` event of an operation; `duration_ms` is mandatory
///
/// ```
/// # use stateboard_core::log_op_end;
/// log_op_end!("state_compare", duration_ms = 3, entry_count = 2);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {
        $crate::__tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::__core_types::schema::EVENT_END,
            duration_ms = $duration
            $(, $($field)+)?
        )
    };
}

/// Emit the `end_error` event of an operation
///
/// `$err` is anything convertible into `ExError`, so a `StateError` can be
/// passed directly. The lineage, version and provider recorded on the error
/// are logged under `err.*` when present.
///
/// ```
/// # use stateboard_core::{log_op_error, errors::StateError};
/// let err = StateError::UnknownLineage { lineage: "prod/vpc".to_string() };
/// log_op_error!("state_get", err, duration_ms = 1);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {{
        let ex_err: $crate::errors::ExError = ::core::convert::Into::into($err);
        $crate::__tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::__core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?ex_err.kind(),
            err.code = ex_err.code(),
            err.lineage = ex_err.lineage(),
            err.version_id = ex_err.version_id(),
            err.provider = ex_err.provider()
            $(, $($field)+)?
        )
    }};
}
