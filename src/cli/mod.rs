//! Command-line interface components
//!
//! This module contains CLI-specific code for Rclone Supervisor, including
//! argument parsing, progress display and signal handling.

pub mod args;
pub mod commands;
pub mod progress;
pub mod signals;

pub use args::{
    CheckArgs, Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, TransferArgs,
};
pub use commands::{handle_check, handle_config, handle_transfer};
pub use progress::{ProgressConfig, TransferDisplay};
pub use signals::cancel_on_signal;
