//! Command-line argument parsing for Rclone Supervisor
//!
//! This module defines the CLI structure using clap derive macros: supervised
//! transfers, standalone pre-transfer checks and configuration management.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::app::{TransferDirection, TransferRequest};

/// Rclone Supervisor - run rclone transfers with progress and liveness checks
#[derive(Parser, Debug)]
#[command(
    name = "rclone_supervisor",
    version,
    about = "Run rclone transfers with live progress, timeouts and clear failure reports",
    long_about = "Supervises rclone copy/copyto transfers: parses progress and speed from its output,
fails stalled transfers after an inactivity timeout, and explains failures with suggestions."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a supervised transfer
    Transfer(TransferArgs),

    /// Run pre-transfer checks only
    Check(CheckArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the transfer command
#[derive(Args, Debug, Clone)]
pub struct TransferArgs {
    /// Source path (local path or remote:path)
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Destination path (local path or remote:path)
    #[arg(value_name = "DEST")]
    pub destination: String,

    /// Source is a folder; keep its structure
    #[arg(long)]
    pub folder: bool,

    /// Treat the transfer as a download regardless of path shapes
    #[arg(long, conflicts_with = "upload")]
    pub download: bool,

    /// Treat the transfer as an upload regardless of path shapes
    #[arg(long)]
    pub upload: bool,

    /// Bandwidth limit in KB/s (overrides the config file, 0 = unlimited)
    #[arg(long, value_name = "KB")]
    pub bwlimit: Option<u32>,

    /// Fail when rclone prints nothing for this long (e.g. "30m", "2h")
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub inactivity_timeout: Option<Duration>,

    /// Print events as JSON lines on stdout
    #[arg(long)]
    pub json: bool,

    /// Skip network, disk space and remote existence checks
    #[arg(long)]
    pub skip_checks: bool,
}

/// Arguments for the check command
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Source path (local path or remote:path)
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Destination path (local path or remote:path)
    #[arg(value_name = "DEST")]
    pub destination: String,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,

        /// Write to this path instead of the user config directory
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }

    /// Whether any verbosity flag was given
    pub fn has_verbosity_flag(&self) -> bool {
        self.global.quiet || self.global.verbose || self.global.very_verbose
    }
}

impl TransferArgs {
    /// Reject arguments clap cannot check on its own
    pub fn validate(&self) -> Result<(), String> {
        if self.source.trim().is_empty() || self.destination.trim().is_empty() {
            return Err("Source and destination must not be empty".to_string());
        }

        if self.source == self.destination {
            return Err("Source and destination are the same path".to_string());
        }

        if self.inactivity_timeout == Some(Duration::ZERO) {
            return Err("Inactivity timeout must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Direction forced by `--download`/`--upload`, if any
    pub fn direction(&self) -> Option<TransferDirection> {
        if self.download {
            Some(TransferDirection::Download)
        } else if self.upload {
            Some(TransferDirection::Upload)
        } else {
            None
        }
    }

    /// Build the transfer request described by these arguments
    pub fn request(&self) -> TransferRequest {
        let request =
            TransferRequest::new(self.source.clone(), self.destination.clone()).folder(self.folder);
        match self.direction() {
            Some(direction) => request.with_direction(direction),
            None => request,
        }
    }
}

impl CheckArgs {
    pub fn request(&self) -> TransferRequest {
        TransferRequest::new(self.source.clone(), self.destination.clone())
    }
}
