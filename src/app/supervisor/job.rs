//! The per-job poll loop
//!
//! A [`TransferJob`] is owned by exactly one supervising task. Each iteration
//! checks, in order: cancellation, the startup warning, the inactivity
//! deadline, buffered output, and process exit. The loop never blocks on a
//! pipe; the only wait is the poll sleep, which a cancel request cuts short.

use std::collections::VecDeque;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Instant;

use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::config::SupervisorConfig;
use super::process;
use super::types::{CancelToken, FailureKind, JobState, TerminalOutcome, TransferEvent};
use crate::app::classifier::classify;
use crate::app::command::TransferCommand;
use crate::app::parser::{parse_progress, parse_status};
use crate::app::reader::{LineStreamReader, OutputLine, OutputStream};
use crate::constants::supervisor::{COMPLETE_PERCENT, STDERR_TAIL_LINES};

/// Output side of a running child: both readers and their shared line queue
pub(crate) struct ChildOutput {
    pub lines: mpsc::UnboundedReceiver<OutputLine>,
    pub readers: Vec<LineStreamReader>,
}

/// Mutable state of one supervised transfer
pub(crate) struct TransferJob {
    command: TransferCommand,
    config: SupervisorConfig,
    started: Instant,
    last_activity: Instant,
    last_progress: Option<u8>,
    startup_warned: bool,
    stderr_tail: VecDeque<String>,
    cancel: CancelToken,
    state: Arc<watch::Sender<JobState>>,
    events: mpsc::UnboundedSender<TransferEvent>,
}

impl TransferJob {
    pub fn new(
        command: TransferCommand,
        config: SupervisorConfig,
        cancel: CancelToken,
        state: Arc<watch::Sender<JobState>>,
        events: mpsc::UnboundedSender<TransferEvent>,
    ) -> Self {
        let now = Instant::now();
        Self {
            command,
            config,
            started: now,
            last_activity: now,
            last_progress: None,
            startup_warned: false,
            stderr_tail: VecDeque::new(),
            cancel,
            state,
            events,
        }
    }

    /// Drive the child to a terminal outcome and clean it up
    ///
    /// The terminal event itself is sent by the caller.
    pub async fn run(mut self, mut child: Child, mut output: ChildOutput) -> TerminalOutcome {
        self.state.send_replace(JobState::Running);
        info!(
            "Supervising {} (pid {:?})",
            self.command.subcommand(),
            child.id()
        );

        let outcome = loop {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested, stopping transfer");
                break TerminalOutcome::Cancelled;
            }

            let now = Instant::now();

            if self.last_progress.is_none()
                && !self.startup_warned
                && now.duration_since(self.started) > self.config.startup_timeout
            {
                self.startup_warned = true;
                let message = format!(
                    "No progress reported after {} seconds; the transfer may still be starting",
                    self.config.startup_timeout.as_secs()
                );
                warn!("{}", message);
                self.emit(TransferEvent::Warning(message));
            }

            if now.duration_since(self.last_activity) > self.config.inactivity_timeout {
                let message = format!(
                    "Transfer timed out after {} seconds of inactivity",
                    self.config.inactivity_timeout.as_secs()
                );
                warn!("{}", message);
                break TerminalOutcome::Failure {
                    kind: FailureKind::Timeout,
                    message,
                };
            }

            self.drain(&mut output);

            match child.try_wait() {
                Ok(Some(status)) => {
                    for reader in output.readers.drain(..) {
                        reader.finish(self.config.reader_drain_timeout).await;
                    }
                    self.drain_residual(&mut output);
                    if !status.success() && self.cancel.is_cancelled() {
                        info!("Transfer process stopped by cancellation ({})", status);
                        break TerminalOutcome::Cancelled;
                    }
                    break self.exit_outcome(status);
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to poll transfer process: {}", e);
                    break TerminalOutcome::internal(format!(
                        "Failed to poll transfer process: {}",
                        e
                    ));
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.cancel.cancelled() => {}
            }
        };

        process::terminate(&mut child, self.config.termination_grace).await;
        for reader in &output.readers {
            reader.abort();
        }

        info!(
            "Transfer finished as {} after {:?}",
            outcome.state(),
            self.started.elapsed()
        );
        outcome
    }

    fn emit(&self, event: TransferEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped; continuing without delivery");
        }
    }

    /// Consume the lines queued when the drain starts, in arrival order
    ///
    /// Lines that arrive meanwhile wait for the next iteration, and a cancel
    /// request stops the drain early, so a flooding child cannot hold the
    /// loop away from its other checks.
    fn drain(&mut self, output: &mut ChildOutput) {
        let queued = output.lines.len();
        for _ in 0..queued {
            if self.cancel.is_cancelled() {
                debug!("Cancel requested mid-drain; deferring remaining lines");
                return;
            }
            match output.lines.try_recv() {
                Ok(line) => self.accept(line),
                Err(_) => return,
            }
        }
    }

    /// Consume everything left once the readers have stopped
    fn drain_residual(&mut self, output: &mut ChildOutput) {
        while let Ok(line) = output.lines.try_recv() {
            self.accept(line);
        }
    }

    fn accept(&mut self, line: OutputLine) {
        self.handle_line(&line.text);
        if line.stream == OutputStream::Stderr {
            if self.stderr_tail.len() == STDERR_TAIL_LINES {
                self.stderr_tail.pop_front();
            }
            self.stderr_tail.push_back(line.text);
        }
    }

    fn handle_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        self.last_activity = Instant::now();

        if let Some(percent) = parse_progress(line) {
            if self.last_progress != Some(percent) {
                debug!("Progress {}%", percent);
                self.last_progress = Some(percent);
                self.emit(TransferEvent::Progress(percent));
            }
        }

        if let Some(snapshot) = parse_status(line) {
            debug!("Status {}", snapshot);
            self.emit(TransferEvent::Status(snapshot));
        }
    }

    fn exit_outcome(&mut self, status: ExitStatus) -> TerminalOutcome {
        if status.success() {
            if self.last_progress != Some(COMPLETE_PERCENT) {
                self.last_progress = Some(COMPLETE_PERCENT);
                self.emit(TransferEvent::Progress(COMPLETE_PERCENT));
            }
            return TerminalOutcome::Success;
        }

        let exit_code = status.code().unwrap_or(-1);
        let stderr = self
            .stderr_tail
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        let classification = classify(exit_code, &stderr);

        warn!(
            "Transfer process exited with code {} ({})",
            exit_code, classification.category
        );

        TerminalOutcome::Failure {
            kind: FailureKind::Process {
                category: classification.category,
                exit_code,
            },
            message: classification.compose(&stderr),
        }
    }
}
