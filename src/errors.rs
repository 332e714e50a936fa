//! Error types for Rclone Supervisor
//!
//! This module defines the error types for all components of the application.
//! Errors that happen before a child process exists (validation, spawn) are
//! returned synchronously; everything that happens while a job is running is
//! reported through the job's terminal event instead.

use std::path::PathBuf;
use thiserror::Error;

/// Structural problems with a transfer command, detected before spawning
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Command vector is too short to be a tool invocation
    #[error("Invalid command parameters: expected at least {min} arguments, got {actual}")]
    TooFewArguments { min: usize, actual: usize },

    /// Tool executable does not exist on disk
    #[error("Tool executable not found at: {path}")]
    ExecutableNotFound { path: PathBuf },

    /// Subcommand is not in the allow-list
    #[error("Unsupported subcommand '{subcommand}'")]
    UnsupportedSubcommand { subcommand: String },

    /// Transfer subcommand without a source or destination
    #[error("Missing {field} for '{subcommand}'")]
    MissingArgument {
        subcommand: String,
        field: &'static str,
    },

    /// Local source path does not exist
    #[error("Local source path does not exist: {path}")]
    SourceNotFound { path: PathBuf },

    /// Tool configuration file does not exist
    #[error("rclone config not found at: {path}")]
    ConfigNotFound { path: PathBuf },
}

/// Errors returned synchronously by the transfer supervisor
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Command failed structural validation
    #[error("Command validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Child process could not be launched
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Child process was spawned without a requested pipe
    #[error("Failed to capture {stream} of the child process")]
    PipeUnavailable { stream: &'static str },

    /// Supervisor options are unusable
    #[error("Invalid supervisor configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// File I/O error while reading or writing configuration
    #[error("Configuration I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// No per-user configuration directory on this platform
    #[error("Could not determine user config directory")]
    NoConfigDir,
}

/// Pre-transfer check failures
#[derive(Error, Debug)]
pub enum PreflightError {
    /// Connectivity probe failed
    #[error("Network connection failed. Check your internet connection ({reason})")]
    NetworkUnreachable { reason: String },

    /// Destination does not have room for the transfer
    #[error("Insufficient disk space. Need ~{required} bytes, but only {available} bytes available")]
    InsufficientSpace { required: u64, available: u64 },

    /// Destination is nearly full
    #[error("Very low disk space: only {available} bytes available. Consider freeing up space first")]
    LowSpace { available: u64 },

    /// Remote source could not be listed
    #[error("Remote file or directory not found or inaccessible: {source_path}\n{details}")]
    RemoteNotFound {
        source_path: String,
        details: String,
    },

    /// Probe command could not be built
    #[error("Invalid probe command: {0}")]
    Command(#[from] ValidationError),

    /// Probe process could not be run
    #[error("Failed to run probe: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Command validation error
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Supervisor start error
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Pre-transfer check error
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Supervised transfer ended in failure
    #[error("Transfer failed: {message}")]
    TransferFailed { message: String },

    /// Supervised transfer was cancelled by the user
    #[error("Transfer cancelled")]
    Cancelled,

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Preflight(PreflightError::NetworkUnreachable { .. })
            | AppError::Preflight(PreflightError::Io(_))
            | AppError::Supervisor(SupervisorError::Spawn { .. })
            | AppError::Io(_) => true,

            AppError::Validation(_)
            | AppError::Supervisor(SupervisorError::Validation(_))
            | AppError::Config(_)
            | AppError::Cancelled => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Supervisor(SupervisorError::Validation(_)) => "validation",
            AppError::Supervisor(_) => "supervisor",
            AppError::Config(_) => "config",
            AppError::Preflight(_) => "preflight",
            AppError::Io(_) => "io",
            AppError::TransferFailed { .. } => "transfer",
            AppError::Cancelled => "cancelled",
            AppError::Generic { .. } => "generic",
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Cancelled => 130,
            AppError::Validation(_) | AppError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Supervisor result type alias
pub type SupervisorResult<T> = std::result::Result<T, SupervisorError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Pre-transfer check result type alias
pub type PreflightResult<T> = std::result::Result<T, PreflightError>;
