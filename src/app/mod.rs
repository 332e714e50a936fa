//! Core application logic for Rclone Supervisor
//!
//! This module contains the main application components: command validation
//! and building, output parsing, failure classification, pre-transfer checks
//! and the transfer supervisor itself.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rclone_supervisor::app::{
//!     CommandBuilder, SupervisorConfig, TransferEvent, TransferRequest, TransferSupervisor,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let builder = CommandBuilder::new("/usr/bin/rclone")
//!     .with_config_path("/home/me/.config/rclone/rclone.conf")
//!     .with_bandwidth_limit(1024);
//!
//! let request = TransferRequest::new("gdrive:reports/q3.pdf", "/tmp/q3.pdf");
//! let command = builder.transfer(&request)?;
//!
//! let handle = TransferSupervisor::start(command, SupervisorConfig::default())?;
//! let report = handle
//!     .wait_with(|event| {
//!         if let TransferEvent::Progress(percent) = event {
//!             println!("{}%", percent);
//!         }
//!     })
//!     .await;
//! println!("{}", report.outcome);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod command;
pub mod parser;
pub mod preflight;
pub mod reader;
pub mod supervisor;

pub use classifier::{classify, Classification, FailureCategory};
pub use command::{
    is_remote_path, CommandBuilder, TransferCommand, TransferDirection, TransferFlags,
    TransferRequest,
};
pub use parser::{parse_progress, parse_status, StatusSnapshot, TransferSpeed, TransferredAmount};
pub use preflight::{CheckReport, CheckStatus, Preflight};
pub use reader::{LineStreamReader, OutputLine, OutputStream};
pub use supervisor::{
    CancelToken, FailureKind, JobState, SupervisorConfig, TerminalOutcome, TransferEvent,
    TransferHandle, TransferReport, TransferSupervisor,
};
