//! Defensive parsing of sync-tool output lines
//!
//! The tool's human-readable output changes with verbosity flags and
//! versions, and stdout/stderr interleave diagnostics with stats. Both
//! parsers here are pure functions over a single line and never fail: a line
//! that cannot be understood simply yields `None`.
//!
//! - [`parse_progress`] extracts a completion percentage
//! - [`parse_status`] extracts transferred amount, speed and ETA
//!
//! Both share the same pre-processing in [`line`]: timestamped NOTICE/DEBUG/ERROR
//! log lines are discarded, INFO lines are unwrapped to their payload and ANSI
//! escapes are removed.

pub mod line;
pub mod progress;
pub mod status;

pub use line::prepare_line;
pub use progress::parse_progress;
pub use status::{parse_status, StatusSnapshot, TransferSpeed, TransferredAmount};
