//! Structured logging
//!
//! Binaries call [`init`] once with the configured [`Profile`]. Engine
//! operations bracket their work with `log_op_start!`, `log_op_end!` and
//! `log_op_error!`; the tree, diff, registry and aggregator code below the
//! engine returns errors and stays silent. Tests assert on events through
//! [`init_test_capture`].

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
