//! Exit code and stderr classification
//!
//! Maps a failed tool run to a user-facing category with remediation hints.
//! The composed message always prefaces, and never replaces, the verbatim
//! stderr so users can act on the summary or drill into the raw detail.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure categories reported to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    DiskFull,
    Network,
    PermissionDenied,
    NotFound,
    Authentication,
    RateLimited,
    QuotaExceeded,
    UnknownError,
    ConfigError,
    DirectoryNotFound,
    FileNotFound,
    OperationTimeout,
    RetryLimitExceeded,
    Interrupted,
    FatalError,
    UnknownExitCode,
}

/// Keyword families checked, in order, for generic (exit code 1) failures
const KEYWORD_FAMILIES: &[(FailureCategory, &[&str])] = &[
    (FailureCategory::DiskFull, &["no space left", "disk full"]),
    (FailureCategory::Network, &["network", "connection", "timeout"]),
    (FailureCategory::PermissionDenied, &["permission denied", "access denied"]),
    (FailureCategory::NotFound, &["not found", "no such file"]),
    (
        FailureCategory::Authentication,
        &["unauthorized", "forbidden", "authentication"],
    ),
    (FailureCategory::RateLimited, &["rate limit", "too many requests"]),
    (FailureCategory::QuotaExceeded, &["quota", "storage full"]),
];

impl FailureCategory {
    /// Category for an exit code, consulting stderr only for exit code 1
    pub fn from_exit(exit_code: i32, stderr: &str) -> Self {
        match exit_code {
            1 => {
                let lowered = stderr.to_lowercase();
                KEYWORD_FAMILIES
                    .iter()
                    .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
                    .map(|(category, _)| *category)
                    .unwrap_or(FailureCategory::UnknownError)
            }
            2 => FailureCategory::ConfigError,
            3 => FailureCategory::DirectoryNotFound,
            4 => FailureCategory::FileNotFound,
            5 => FailureCategory::OperationTimeout,
            6 => FailureCategory::RetryLimitExceeded,
            7 => FailureCategory::Interrupted,
            8 => FailureCategory::FatalError,
            _ => FailureCategory::UnknownExitCode,
        }
    }

    /// One-line summary for this category
    pub fn summary(&self, exit_code: i32) -> String {
        let text = match self {
            FailureCategory::DiskFull => "Insufficient disk space on destination",
            FailureCategory::Network => "Network connection problem",
            FailureCategory::PermissionDenied => "Permission denied",
            FailureCategory::NotFound => "File or folder not found",
            FailureCategory::Authentication => "Authentication or authorization failed",
            FailureCategory::RateLimited => "Rate limited by remote service",
            FailureCategory::QuotaExceeded => "Remote storage quota exceeded",
            FailureCategory::UnknownError => "Transfer failed with unknown error",
            FailureCategory::ConfigError => "Configuration or command error",
            FailureCategory::DirectoryNotFound => "Directory not found or access error",
            FailureCategory::FileNotFound => "File not found",
            FailureCategory::OperationTimeout => "Operation timed out",
            FailureCategory::RetryLimitExceeded => "Retry limit exceeded",
            FailureCategory::Interrupted => "Interrupted by user or system",
            FailureCategory::FatalError => "Fatal error occurred",
            FailureCategory::UnknownExitCode => {
                return format!("Unknown error (Code: {})", exit_code);
            }
        };
        text.to_string()
    }

    /// Ordered remediation suggestions
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            FailureCategory::DiskFull => &[
                "Free up space on your local drive",
                "Choose a different download location",
                "Delete unnecessary files",
            ],
            FailureCategory::Network => &[
                "Check your internet connection",
                "Try again in a few moments",
                "Consider using bandwidth limiting",
            ],
            FailureCategory::PermissionDenied => &[
                "Run as administrator if needed",
                "Check file/folder permissions",
                "Choose a different destination",
            ],
            FailureCategory::NotFound => &[
                "Refresh the file list",
                "Check if the file still exists",
                "Verify remote connection",
            ],
            FailureCategory::Authentication => &[
                "Check your remote configuration",
                "Re-authenticate with the remote service",
                "Verify access permissions",
            ],
            FailureCategory::RateLimited => &[
                "Wait a few minutes before retrying",
                "Use bandwidth limiting",
                "Check service limits",
            ],
            FailureCategory::QuotaExceeded => &[
                "Free up space on remote storage",
                "Upgrade your storage plan",
                "Choose different files to transfer",
            ],
            FailureCategory::UnknownError => &[
                "Check the detailed error logs",
                "Verify source and destination paths",
                "Try a smaller file first",
            ],
            FailureCategory::ConfigError => &[
                "Check rclone configuration",
                "Verify remote settings",
                "Update rclone if needed",
            ],
            FailureCategory::DirectoryNotFound => &[
                "Check if the directory exists",
                "Verify path permissions",
                "Refresh the remote connection",
            ],
            FailureCategory::FileNotFound => &[
                "Refresh the file list",
                "Check if file was moved or deleted",
                "Verify the file path",
            ],
            FailureCategory::OperationTimeout => &[
                "Check your internet connection",
                "Try with a smaller file",
                "Increase timeout settings",
            ],
            FailureCategory::RetryLimitExceeded => &[
                "Check network stability",
                "Try again later",
                "Use lower transfer speeds",
            ],
            FailureCategory::Interrupted => &[
                "Transfer was cancelled",
                "Try starting the transfer again",
            ],
            FailureCategory::FatalError => &[
                "Check system resources",
                "Restart the application",
                "Check rclone installation",
            ],
            FailureCategory::UnknownExitCode => &[
                "Check rclone documentation",
                "Try with different settings",
                "Report this error code",
            ],
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::DiskFull => "disk-full",
            FailureCategory::Network => "network",
            FailureCategory::PermissionDenied => "permission-denied",
            FailureCategory::NotFound => "not-found",
            FailureCategory::Authentication => "authentication",
            FailureCategory::RateLimited => "rate-limited",
            FailureCategory::QuotaExceeded => "quota-exceeded",
            FailureCategory::UnknownError => "unknown-error",
            FailureCategory::ConfigError => "config-error",
            FailureCategory::DirectoryNotFound => "directory-not-found",
            FailureCategory::FileNotFound => "file-not-found",
            FailureCategory::OperationTimeout => "operation-timeout",
            FailureCategory::RetryLimitExceeded => "retry-limit-exceeded",
            FailureCategory::Interrupted => "interrupted",
            FailureCategory::FatalError => "fatal-error",
            FailureCategory::UnknownExitCode => "unknown-exit-code",
        };
        write!(f, "{}", name)
    }
}

/// Result of classifying a failed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub exit_code: i32,
    pub category: FailureCategory,
    pub summary: String,
    pub suggestions: Vec<String>,
}

impl Classification {
    /// Full user-facing message: summary, numbered suggestions, then stderr
    pub fn compose(&self, stderr: &str) -> String {
        let mut message = self.summary.clone();

        if !self.suggestions.is_empty() {
            message.push_str("\n\nSuggestions:");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                message.push_str(&format!("\n{}. {}", i + 1, suggestion));
            }
        }

        let details = stderr.trim();
        if !details.is_empty() {
            message.push_str("\n\nTechnical details:\n");
            message.push_str(details);
        }

        message
    }
}

/// Classify a non-zero exit of the sync tool
pub fn classify(exit_code: i32, stderr: &str) -> Classification {
    let category = FailureCategory::from_exit(exit_code, stderr);

    Classification {
        exit_code,
        category,
        summary: category.summary(exit_code),
        suggestions: category.suggestions().iter().map(|s| s.to_string()).collect(),
    }
}
