//! Event, outcome and report types for supervised transfers

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::app::classifier::FailureCategory;
use crate::app::parser::StatusSnapshot;

/// Lifecycle of a supervised job
///
/// `Initializing -> Running -> {Completed, Failed, Cancelled}`; the last
/// three are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Initializing,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the state is final
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Initializing => "initializing",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Why a job failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// No output for longer than the inactivity timeout
    Timeout,
    /// The tool exited with a non-zero code
    Process {
        category: FailureCategory,
        exit_code: i32,
    },
    /// The supervisor itself faulted
    Internal,
}

/// Final result of a job, delivered exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TerminalOutcome {
    Success,
    Failure { kind: FailureKind, message: String },
    Cancelled,
}

impl TerminalOutcome {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        TerminalOutcome::Failure {
            kind: FailureKind::Internal,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TerminalOutcome::Success)
    }

    /// Terminal state this outcome corresponds to
    pub fn state(&self) -> JobState {
        match self {
            TerminalOutcome::Success => JobState::Completed,
            TerminalOutcome::Failure { .. } => JobState::Failed,
            TerminalOutcome::Cancelled => JobState::Cancelled,
        }
    }
}

impl fmt::Display for TerminalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalOutcome::Success => write!(f, "Transfer completed successfully"),
            TerminalOutcome::Failure { message, .. } => write!(f, "{}", message),
            TerminalOutcome::Cancelled => write!(f, "Transfer cancelled"),
        }
    }
}

/// Notification emitted by a running job
///
/// `Terminal` is always the last event of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TransferEvent {
    /// Completion percentage, only when it differs from the previous one
    Progress(u8),
    /// Transferred amount, speed and ETA from one output line
    Status(StatusSnapshot),
    /// Non-fatal notice, e.g. slow startup
    Warning(String),
    Terminal(TerminalOutcome),
}

/// Cancellation handle shared between a job and its callers
///
/// Cloning is cheap; every clone cancels the same job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    requested: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; repeated calls are no-ops
    pub fn cancel(&self) {
        if !self.requested.swap(true, Ordering::AcqRel) {
            self.wake.notify_one();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Resolves once cancellation has been requested
    pub(crate) async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.wake.notified().await;
    }
}

/// Summary of a finished job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReport {
    pub outcome: TerminalOutcome,
    pub progress_events: usize,
    pub status_events: usize,
    pub warnings: usize,
    pub last_progress: Option<u8>,
    /// Most recent status snapshot seen
    pub last_status: Option<StatusSnapshot>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TransferReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Running counts of a job's events, folded into a [`TransferReport`]
#[derive(Debug, Default)]
pub(crate) struct EventTally {
    pub progress_events: usize,
    pub status_events: usize,
    pub warnings: usize,
    pub last_progress: Option<u8>,
    pub last_status: Option<StatusSnapshot>,
    pub outcome: Option<TerminalOutcome>,
}

impl EventTally {
    pub fn record(&mut self, event: &TransferEvent) {
        match event {
            TransferEvent::Progress(percent) => {
                self.progress_events += 1;
                self.last_progress = Some(*percent);
            }
            TransferEvent::Status(snapshot) => {
                self.status_events += 1;
                self.last_status = Some(snapshot.clone());
            }
            TransferEvent::Warning(_) => self.warnings += 1,
            TransferEvent::Terminal(outcome) => self.outcome = Some(outcome.clone()),
        }
    }

    pub fn into_report(
        self,
        elapsed: Duration,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> TransferReport {
        TransferReport {
            outcome: self.outcome.unwrap_or_else(|| {
                TerminalOutcome::internal("Event stream ended without a terminal outcome")
            }),
            progress_events: self.progress_events,
            status_events: self.status_events,
            warnings: self.warnings,
            last_progress: self.last_progress,
            last_status: self.last_status,
            elapsed,
            started_at,
            finished_at,
        }
    }
}
