//! Rclone Supervisor Library
//!
//! Runs rclone transfers as supervised child processes: output is parsed into
//! progress and status events, stalled transfers are stopped after an
//! inactivity timeout, and failures are classified into actionable messages.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
