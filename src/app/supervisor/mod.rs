//! Supervised execution of sync-tool transfers
//!
//! This module runs one external transfer process per job and turns its
//! loosely formatted output into typed events. It owns the full child
//! lifecycle: launch, output pumping, liveness checks, cancellation and
//! guaranteed cleanup.
//!
//! # Key Features
//!
//! - **Typed events**: progress percentages, status snapshots, warnings and
//!   exactly one terminal outcome per job
//! - **Liveness**: a slow-startup warning and a hard inactivity timeout
//! - **Cancellation**: idempotent, non-blocking, usable from any task
//! - **Cleanup**: graceful termination of the whole process group with a
//!   forced kill after a grace period
//!
//! # Architecture
//!
//! - [`config`] - Timing options and validation
//! - [`types`] - Events, outcomes, job states and reports
//! - `job` - The per-job poll loop
//! - `process` - Child launch and termination
//!
//! # Examples
//!
//! ```rust,no_run
//! use rclone_supervisor::app::{SupervisorConfig, TransferCommand, TransferEvent, TransferSupervisor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let command = TransferCommand::new([
//!     "/usr/bin/rclone", "copyto", "remote:data.bin", "/tmp/data.bin",
//! ])?;
//!
//! let mut handle = TransferSupervisor::start(command, SupervisorConfig::default())?;
//! while let Some(event) = handle.next_event().await {
//!     match event {
//!         TransferEvent::Progress(percent) => println!("{}%", percent),
//!         TransferEvent::Terminal(outcome) => println!("{}", outcome),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod types;

mod job;
mod process;

#[cfg(test)]
pub mod tests;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tracing::{error, info};

use crate::app::command::TransferCommand;
use crate::app::reader::{LineStreamReader, OutputStream};
use crate::errors::{SupervisorError, SupervisorResult};

pub use config::SupervisorConfig;
pub use types::{
    CancelToken, FailureKind, JobState, TerminalOutcome, TransferEvent, TransferReport,
};

use job::{ChildOutput, TransferJob};
use types::EventTally;

/// Message used when the supervising loop itself faults
const INTERNAL_FAULT_MESSAGE: &str = "Internal supervisor error; the transfer was stopped";

/// Entry point for supervised transfers
pub struct TransferSupervisor;

impl TransferSupervisor {
    /// Spawn `command` and start supervising it
    ///
    /// Validation and launch problems are returned here and no job exists.
    /// Everything after a successful launch is reported through the
    /// returned handle's events. Must be called from within a Tokio runtime.
    pub fn start(
        command: TransferCommand,
        config: SupervisorConfig,
    ) -> SupervisorResult<TransferHandle> {
        config
            .validate()
            .map_err(|reason| SupervisorError::InvalidConfig { reason })?;

        let mut child = process::spawn(&command)?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or(SupervisorError::PipeUnavailable { stream: "stdout" })?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SupervisorError::PipeUnavailable { stream: "stderr" })?;

        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let output = ChildOutput {
            lines: lines_rx,
            readers: vec![
                LineStreamReader::spawn(OutputStream::Stdout, stdout, lines_tx.clone()),
                LineStreamReader::spawn(OutputStream::Stderr, stderr, lines_tx),
            ],
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(JobState::Initializing);
        let state_tx = Arc::new(state_tx);
        let cancel = CancelToken::new();

        info!("Starting transfer: {}", command);
        let description = command.to_string();
        let job = TransferJob::new(
            command,
            config,
            cancel.clone(),
            Arc::clone(&state_tx),
            event_tx.clone(),
        );

        tokio::spawn(async move {
            let outcome = outcome_from_join(tokio::spawn(job.run(child, output)).await);
            state_tx.send_replace(outcome.state());
            let _ = event_tx.send(TransferEvent::Terminal(outcome));
        });

        Ok(TransferHandle {
            events: event_rx,
            cancel,
            state: state_rx,
            pid,
            description,
            started: Instant::now(),
            started_at: Utc::now(),
        })
    }

    /// Validate `args` into a command and start it
    pub fn start_args<I, S>(args: I, config: SupervisorConfig) -> SupervisorResult<TransferHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = TransferCommand::new(args)?;
        Self::start(command, config)
    }
}

/// Map the supervising task's join result to an outcome
///
/// A panic or abort inside the loop becomes an internal failure so the job
/// still ends with exactly one terminal event.
pub(crate) fn outcome_from_join(result: Result<TerminalOutcome, JoinError>) -> TerminalOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Supervisor loop faulted: {}", e);
            TerminalOutcome::internal(INTERNAL_FAULT_MESSAGE)
        }
    }
}

/// Caller's view of a running job
///
/// Dropping the handle does not stop the job; use [`TransferHandle::cancel`]
/// or a [`CancelToken`] for that.
#[derive(Debug)]
pub struct TransferHandle {
    events: mpsc::UnboundedReceiver<TransferEvent>,
    cancel: CancelToken,
    state: watch::Receiver<JobState>,
    pid: Option<u32>,
    description: String,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl TransferHandle {
    /// Request cancellation; idempotent and a no-op once the job has finished
    ///
    /// Besides setting the token, this sends a best-effort SIGTERM to the
    /// child's process group on Unix. The job still reports `Cancelled` and
    /// escalates to a forced kill after the grace period if needed.
    pub fn cancel(&self) {
        if self.is_finished() {
            return;
        }
        let first = !self.cancel.is_cancelled();
        self.cancel.cancel();
        if let (true, Some(pid)) = (first, self.pid) {
            process::signal_group(pid);
        }
    }

    /// Token that cancels this job from another task
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Process id of the tool, if it was known at launch
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The supervised command line
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Next event, or `None` after the terminal event has been taken
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        self.events.recv().await
    }

    /// Consume the handle as a stream of events ending with `Terminal`
    pub fn events(self) -> impl Stream<Item = TransferEvent> {
        futures::stream::unfold(self.events, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        })
    }

    /// Wait for the job to finish, discarding events
    pub async fn wait(self) -> TransferReport {
        self.wait_with(|_| {}).await
    }

    /// Wait for the job to finish, passing every event to `on_event`
    pub async fn wait_with<F>(mut self, mut on_event: F) -> TransferReport
    where
        F: FnMut(&TransferEvent),
    {
        let mut tally = EventTally::default();
        while let Some(event) = self.events.recv().await {
            on_event(&event);
            tally.record(&event);
        }

        tally.into_report(self.started.elapsed(), self.started_at, Utc::now())
    }
}
