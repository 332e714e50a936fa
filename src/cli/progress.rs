//! Live display of transfer events
//!
//! Renders supervisor events as an indicatif progress bar when stderr is a
//! terminal, as plain text lines otherwise, or as JSON lines on stdout for
//! machine consumers.

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::debug;

use crate::app::{StatusSnapshot, TerminalOutcome, TransferEvent, TransferReport};
use crate::errors::{AppError, Result};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Only report the outcome
    pub quiet: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            json: false,
            quiet: false,
        }
    }
}

#[derive(Debug)]
enum Mode {
    Bar(ProgressBar),
    Text,
    Json,
}

/// Progress renderer for a single transfer
#[derive(Debug)]
pub struct TransferDisplay {
    mode: Mode,
    quiet: bool,
    name: String,
    last_progress: Option<u8>,
    last_status: Option<StatusSnapshot>,
}

impl TransferDisplay {
    /// Create a display for the transfer called `name`
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the progress bar template is rejected
    pub fn new(config: ProgressConfig, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let is_terminal = atty::is(atty::Stream::Stderr);

        let mode = if config.json {
            Mode::Json
        } else if config.enable_progress_bars && is_terminal && !config.quiet {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                    .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
                    .progress_chars("##-"),
            );
            bar.set_message(format!("Starting {}", name));
            Mode::Bar(bar)
        } else {
            Mode::Text
        };

        debug!("Transfer display started for {}", name);
        Ok(Self {
            mode,
            quiet: config.quiet,
            name,
            last_progress: None,
            last_status: None,
        })
    }

    /// Render one event
    pub fn handle(&mut self, event: &TransferEvent) {
        match event {
            TransferEvent::Progress(percent) => self.last_progress = Some(*percent),
            TransferEvent::Status(snapshot) => self.last_status = Some(snapshot.clone()),
            _ => {}
        }

        match &self.mode {
            Mode::Json => match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => debug!("Failed to serialize event: {}", e),
            },
            Mode::Bar(bar) => match event {
                TransferEvent::Progress(percent) => bar.set_position(u64::from(*percent)),
                TransferEvent::Status(snapshot) => bar.set_message(snapshot.to_string()),
                TransferEvent::Warning(message) => bar.println(format!("Warning: {}", message)),
                TransferEvent::Terminal(outcome) => {
                    if outcome.is_success() {
                        bar.finish_with_message("done");
                    } else {
                        bar.abandon_with_message(outcome_label(outcome));
                    }
                }
            },
            Mode::Text => {
                if self.quiet {
                    return;
                }
                match event {
                    TransferEvent::Progress(_) => eprintln!("{}", self.progress_line()),
                    TransferEvent::Warning(message) => eprintln!("Warning: {}", message),
                    TransferEvent::Status(_) | TransferEvent::Terminal(_) => {}
                }
            }
        }
    }

    /// Print the final summary
    pub fn finish(&self, report: &TransferReport) {
        match &self.mode {
            Mode::Json => {
                let summary = json!({ "type": "report", "data": report });
                println!("{}", summary);
            }
            Mode::Bar(_) | Mode::Text => {
                if self.quiet && report.is_success() {
                    return;
                }
                eprintln!();
                eprintln!("Transfer Summary ({}):", self.name);
                eprintln!("   Outcome: {}", outcome_label(&report.outcome));
                if let Some(percent) = report.last_progress {
                    eprintln!("   Progress: {}%", percent);
                }
                if let Some(status) = &report.last_status {
                    eprintln!("   Last status: {}", status);
                }
                eprintln!("   Duration: {}", humantime::format_duration(round_secs(report)));
            }
        }
    }

    /// Text-mode line for the current progress and latest status
    fn progress_line(&self) -> String {
        let percent = self.last_progress.unwrap_or(0);
        match &self.last_status {
            Some(status) => format!("{}: {}% | {}", self.name, percent, status),
            None => format!("{}: {}%", self.name, percent),
        }
    }
}

fn outcome_label(outcome: &TerminalOutcome) -> &'static str {
    match outcome {
        TerminalOutcome::Success => "completed",
        TerminalOutcome::Failure { .. } => "failed",
        TerminalOutcome::Cancelled => "cancelled",
    }
}

fn round_secs(report: &TransferReport) -> std::time::Duration {
    std::time::Duration::from_secs(report.elapsed.as_secs())
}
