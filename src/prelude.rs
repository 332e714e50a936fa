//! Prelude module for Rclone Supervisor Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use rclone_supervisor::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rclone_supervisor::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let handle = TransferSupervisor::start_args(
//!         ["rclone", "copyto", "gdrive:a.bin", "/tmp/a.bin"],
//!         SupervisorConfig::default(),
//!     )?;
//!
//!     let report = handle.wait().await;
//!     println!("{}", report.outcome);
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Supervisor and its event vocabulary
pub use crate::app::{
    CancelToken, FailureKind, JobState, SupervisorConfig, TerminalOutcome, TransferEvent,
    TransferHandle, TransferReport, TransferSupervisor,
};

// Command building and parsing
pub use crate::app::{
    classify, parse_progress, parse_status, CommandBuilder, FailureCategory, StatusSnapshot,
    TransferCommand, TransferDirection, TransferFlags, TransferRequest,
};

// Pre-transfer checks
pub use crate::app::{CheckReport, CheckStatus, Preflight};

pub use crate::config::AppConfig;

pub use std::time::Duration;
