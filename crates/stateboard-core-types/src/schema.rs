//! Names shared by the log macros and the log assertions in tests

/// Operation name, e.g. `state_compare`
pub const FIELD_OP: &str = "op";
/// One of the `EVENT_*` values
pub const FIELD_EVENT: &str = "event";
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_events_are_distinct() {
        let events = [EVENT_START, EVENT_END, EVENT_END_ERROR];
        for (i, a) in events.iter().enumerate() {
            assert!(events[i + 1..].iter().all(|b| a != b));
        }
    }
}
