//! Validated sync-tool invocations
//!
//! A [`TransferCommand`] is an argv vector that has passed structural
//! validation: the executable exists, the subcommand is allow-listed and
//! transfer subcommands carry a usable source and destination. Commands can
//! only be obtained through validation, so a supervisor never spawns a
//! malformed invocation.
//!
//! [`CommandBuilder`] assembles the `copy`/`copyto` invocations used for
//! uploads and downloads, including the stats flags the output parsers rely on.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::tool;
use crate::errors::ValidationError;

/// An immutable, validated command vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferCommand {
    args: Vec<String>,
}

impl TransferCommand {
    /// Validate an argv vector and wrap it
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the vector is shorter than three
    /// elements, the executable is missing, the subcommand is not allowed, or
    /// a transfer subcommand lacks a source/destination or names a local
    /// source that does not exist.
    pub fn new<I, S>(args: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        validate_args(&args)?;
        Ok(Self { args })
    }

    /// Full argv including the executable
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Executable path (argv[0])
    pub fn program(&self) -> &str {
        &self.args[0]
    }

    /// Arguments passed to the executable (argv[1..])
    pub fn tool_args(&self) -> &[String] {
        &self.args[1..]
    }

    /// Tool subcommand (argv[1])
    pub fn subcommand(&self) -> &str {
        &self.args[1]
    }

    /// Whether the subcommand moves data between a source and destination
    pub fn is_transfer(&self) -> bool {
        tool::TRANSFER_SUBCOMMANDS.contains(&self.subcommand())
    }

    /// Source argument for transfer subcommands
    pub fn source(&self) -> Option<&str> {
        self.is_transfer().then(|| self.args[2].as_str())
    }

    /// Destination argument for transfer subcommands
    pub fn destination(&self) -> Option<&str> {
        self.is_transfer().then(|| self.args[3].as_str())
    }
}

impl fmt::Display for TransferCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

fn validate_args(args: &[String]) -> Result<(), ValidationError> {
    if args.len() < tool::MIN_COMMAND_LEN {
        return Err(ValidationError::TooFewArguments {
            min: tool::MIN_COMMAND_LEN,
            actual: args.len(),
        });
    }

    let program = Path::new(&args[0]);
    if args[0].is_empty() || !program.exists() {
        return Err(ValidationError::ExecutableNotFound {
            path: program.to_path_buf(),
        });
    }

    let subcommand = args[1].as_str();
    if !tool::ALLOWED_SUBCOMMANDS.contains(&subcommand) {
        return Err(ValidationError::UnsupportedSubcommand {
            subcommand: subcommand.to_string(),
        });
    }

    if tool::TRANSFER_SUBCOMMANDS.contains(&subcommand) {
        let source = args[2].as_str();
        if source.is_empty() {
            return Err(ValidationError::MissingArgument {
                subcommand: subcommand.to_string(),
                field: "source",
            });
        }

        let destination = args.get(3).map(String::as_str).unwrap_or_default();
        if destination.is_empty() {
            return Err(ValidationError::MissingArgument {
                subcommand: subcommand.to_string(),
                field: "destination",
            });
        }

        if !is_remote_path(source) && !Path::new(source).exists() {
            return Err(ValidationError::SourceNotFound {
                path: PathBuf::from(source),
            });
        }
    }

    Ok(())
}

/// Whether a path refers to a configured remote (`remote:path`)
///
/// Windows drive letters (`C:\data`) are local paths.
pub fn is_remote_path(path: &str) -> bool {
    let Some((remote, _)) = path.split_once(':') else {
        return false;
    };

    let is_drive_letter = remote.len() == 1
        && remote.chars().all(|c| c.is_ascii_alphabetic())
        && path[2..].chars().next().map_or(true, |c| c == '\\' || c == '/');

    !remote.trim().is_empty() && !is_drive_letter
}

/// Direction of a transfer relative to the local machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    /// Local source, remote destination
    Upload,
    /// Remote source, local destination
    Download,
}

impl TransferDirection {
    /// Infer the direction from which side names a remote
    pub fn infer(source: &str, destination: &str) -> Self {
        if is_remote_path(source) && !is_remote_path(destination) {
            TransferDirection::Download
        } else {
            TransferDirection::Upload
        }
    }
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::Upload => write!(f, "upload"),
            TransferDirection::Download => write!(f, "download"),
        }
    }
}

/// A single user-requested transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: String,
    pub destination: String,
    pub direction: TransferDirection,
    /// Source is a directory whose structure must be preserved
    pub is_folder: bool,
}

impl TransferRequest {
    /// Create a request, inferring the direction from the paths
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        let source = source.into();
        let destination = destination.into();
        let direction = TransferDirection::infer(&source, &destination);
        Self {
            source,
            destination,
            direction,
            is_folder: false,
        }
    }

    /// Mark the source as a folder
    pub fn folder(mut self, is_folder: bool) -> Self {
        self.is_folder = is_folder;
        self
    }

    /// Override the inferred direction
    pub fn with_direction(mut self, direction: TransferDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Tool subcommand for this request
    ///
    /// Folder downloads use `copy` to keep the directory structure; everything
    /// else uses `copyto` for exact destination control.
    pub fn subcommand(&self) -> &'static str {
        if self.is_folder && self.direction == TransferDirection::Download {
            "copy"
        } else {
            "copyto"
        }
    }

    /// File name shown to users for this transfer
    pub fn display_name(&self) -> String {
        let path = match self.direction {
            TransferDirection::Download => self.source.rsplit(':').next().unwrap_or(&self.source),
            TransferDirection::Upload => self.destination.as_str(),
        };
        Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    }
}

/// Tool flags applied to every transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFlags {
    /// Interval between stats lines (tool duration syntax, e.g. `500ms`)
    pub stats_interval: String,
    /// Parallel file transfers
    pub transfers: u32,
    /// Parallel checkers
    pub checkers: u32,
    /// Bandwidth limit in KB/s (0 = unlimited)
    pub bandwidth_limit_kb: u32,
}

impl Default for TransferFlags {
    fn default() -> Self {
        Self {
            stats_interval: tool::DEFAULT_STATS_INTERVAL.to_string(),
            transfers: tool::DEFAULT_TRANSFERS,
            checkers: tool::DEFAULT_CHECKERS,
            bandwidth_limit_kb: 0,
        }
    }
}

/// Builds validated commands for a configured tool installation
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    tool_path: PathBuf,
    config_path: Option<PathBuf>,
    flags: TransferFlags,
}

impl CommandBuilder {
    /// Create a builder for the given executable
    pub fn new(tool_path: impl Into<PathBuf>) -> Self {
        Self {
            tool_path: tool_path.into(),
            config_path: None,
            flags: TransferFlags::default(),
        }
    }

    /// Pass `--config <path>` to every command
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Replace the transfer flags
    pub fn with_flags(mut self, flags: TransferFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the bandwidth limit in KB/s (0 = unlimited)
    pub fn with_bandwidth_limit(mut self, kb_per_sec: u32) -> Self {
        self.flags.bandwidth_limit_kb = kb_per_sec;
        self
    }

    /// Build a transfer command with stats output tuned for progress parsing
    pub fn transfer(&self, request: &TransferRequest) -> Result<TransferCommand, ValidationError> {
        let mut args = vec![
            self.tool_path.to_string_lossy().into_owned(),
            request.subcommand().to_string(),
            request.source.clone(),
            request.destination.clone(),
        ];
        self.push_config(&mut args);
        args.extend(
            [
                "-v",
                "--stats",
                self.flags.stats_interval.as_str(),
                "--stats-one-line",
                "--transfers",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(self.flags.transfers.to_string());
        args.push("--checkers".to_string());
        args.push(self.flags.checkers.to_string());
        args.push("--stats-file-name-length".to_string());
        args.push("0".to_string());

        if self.flags.bandwidth_limit_kb > 0 {
            args.push("--bwlimit".to_string());
            args.push(format!("{}K", self.flags.bandwidth_limit_kb));
        }

        TransferCommand::new(args)
    }

    /// Build a listing command such as `lsf <path>`
    pub fn listing(&self, subcommand: &str, path: &str) -> Result<TransferCommand, ValidationError> {
        let mut args = vec![
            self.tool_path.to_string_lossy().into_owned(),
            subcommand.to_string(),
            path.to_string(),
        ];
        self.push_config(&mut args);
        TransferCommand::new(args)
    }

    fn push_config(&self, args: &mut Vec<String>) {
        if let Some(config) = &self.config_path {
            args.push("--config".to_string());
            args.push(config.to_string_lossy().into_owned());
        }
    }
}
