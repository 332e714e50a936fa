//! Runtime options for the transfer supervisor
//!
//! Timing knobs for the poll loop, the liveness checks and process cleanup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::supervisor;

/// Configuration for a supervised transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// How often the loop checks cancellation, timeouts and output
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// How long to wait for a first percentage before warning
    #[serde(with = "humantime_serde")]
    pub startup_timeout: Duration,
    /// Maximum time without any output line before the job fails
    #[serde(with = "humantime_serde")]
    pub inactivity_timeout: Duration,
    /// Time a terminated process gets before it is force-killed
    #[serde(with = "humantime_serde")]
    pub termination_grace: Duration,
    /// Bound on collecting residual output after the process exits
    #[serde(with = "humantime_serde")]
    pub reader_drain_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: supervisor::POLL_INTERVAL,
            startup_timeout: supervisor::STARTUP_TIMEOUT,
            inactivity_timeout: supervisor::INACTIVITY_TIMEOUT,
            termination_grace: supervisor::TERMINATION_GRACE,
            reader_drain_timeout: supervisor::READER_DRAIN_TIMEOUT,
        }
    }
}

impl SupervisorConfig {
    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set startup warning threshold
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Set inactivity timeout
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Set grace period before force-kill
    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace = grace;
        self
    }

    pub fn with_reader_drain_timeout(mut self, timeout: Duration) -> Self {
        self.reader_drain_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("Poll interval cannot be zero".to_string());
        }

        if self.inactivity_timeout.is_zero() {
            return Err("Inactivity timeout cannot be zero".to_string());
        }

        if self.startup_timeout.is_zero() {
            return Err("Startup timeout cannot be zero".to_string());
        }

        if self.poll_interval >= self.inactivity_timeout {
            return Err(format!(
                "Poll interval ({:?}) must be shorter than the inactivity timeout ({:?})",
                self.poll_interval, self.inactivity_timeout
            ));
        }

        Ok(())
    }
}
