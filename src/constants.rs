//! Application constants for Rclone Supervisor
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for configuration overrides
pub mod env {
    /// Overrides the path of the rclone executable
    pub const RCLONE_PATH: &str = "RCLONE_SUPERVISOR_RCLONE_PATH";

    /// Overrides the path of the rclone configuration file
    pub const CONFIG_PATH: &str = "RCLONE_SUPERVISOR_CONFIG_PATH";
}

/// Supervisor timing defaults
pub mod supervisor {
    use super::Duration;

    /// Cadence of the supervisor poll loop
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Grace period before "no progress yet" becomes a warning
    pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

    /// Hard limit since last observed output line (2 hours for real transfers)
    pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(7200);

    /// Time a terminated child is given to exit before it is force-killed
    pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);

    /// Upper bound on waiting for the readers to hit EOF after the child exits
    pub const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

    /// Percentage reported when the tool exits successfully
    pub const COMPLETE_PERCENT: u8 = 100;

    /// Most recent stderr lines kept for failure classification
    pub const STDERR_TAIL_LINES: usize = 500;
}

/// Sync tool command vocabulary
pub mod tool {
    /// Subcommands a supervised command may use
    pub const ALLOWED_SUBCOMMANDS: &[&str] = &[
        "copy", "move", "sync", "copyto", "moveto", "lsf", "lsjson", "lsd", "size",
    ];

    /// Subcommands that require a non-empty source and destination
    pub const TRANSFER_SUBCOMMANDS: &[&str] = &["copy", "copyto", "move", "moveto"];

    /// Minimum argv length: executable, subcommand, one argument
    pub const MIN_COMMAND_LEN: usize = 3;

    /// Default interval between stats lines
    pub const DEFAULT_STATS_INTERVAL: &str = "500ms";

    /// Default number of parallel file transfers
    pub const DEFAULT_TRANSFERS: u32 = 1;

    /// Default number of parallel checkers
    pub const DEFAULT_CHECKERS: u32 = 8;
}

/// Pre-transfer check constants
pub mod preflight {
    use super::Duration;

    /// Well-known host used for the connectivity probe
    pub const NETWORK_PROBE_ADDR: &str = "8.8.8.8:53";

    /// Connectivity probe timeout
    pub const NETWORK_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

    /// Probe latency above which the network is reported as slow
    pub const SLOW_NETWORK_THRESHOLD: Duration = Duration::from_secs(2);

    /// Free space below which a download destination is rejected (1 GiB)
    pub const MIN_FREE_SPACE_BYTES: u64 = 1024 * 1024 * 1024;

    /// Headroom required on top of a known transfer size
    pub const SPACE_HEADROOM_FACTOR: f64 = 1.1;

    /// Timeout for the remote existence probe
    pub const REMOTE_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
}
