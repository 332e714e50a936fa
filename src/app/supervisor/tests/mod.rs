//! Tests for the transfer supervisor
//!
//! Process-level tests run small shell scripts in place of the sync tool and
//! are Unix-only.

use std::time::Duration;

use super::types::EventTally;
use super::*;
use crate::app::classifier::FailureCategory;
use crate::errors::ValidationError;

/// Test that cancel tokens are idempotent and shared between clones
#[tokio::test]
async fn test_cancel_token_idempotent() {
    let token = CancelToken::new();
    let other = token.clone();
    assert!(!token.is_cancelled());

    other.cancel();
    other.cancel();
    token.cancel();
    assert!(token.is_cancelled());

    // Already-cancelled tokens resolve immediately
    tokio::time::timeout(Duration::from_millis(100), token.cancelled())
        .await
        .expect("cancelled() should resolve");
}

/// Test that a cancel request wakes a pending waiter
#[tokio::test]
async fn test_cancel_token_wakes_waiter() {
    let token = CancelToken::new();
    let waiter = token.clone();

    let task = tokio::spawn(async move { waiter.cancelled().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    tokio::time::timeout(Duration::from_millis(500), task)
        .await
        .expect("waiter should wake")
        .unwrap();
}

/// Test job state classification
#[test]
fn test_job_states() {
    assert!(!JobState::Initializing.is_terminal());
    assert!(!JobState::Running.is_terminal());
    assert!(JobState::Completed.is_terminal());
    assert!(JobState::Failed.is_terminal());
    assert!(JobState::Cancelled.is_terminal());

    assert_eq!(TerminalOutcome::Success.state(), JobState::Completed);
    assert_eq!(TerminalOutcome::Cancelled.state(), JobState::Cancelled);
    assert_eq!(TerminalOutcome::internal("x").state(), JobState::Failed);
}

/// Test that a panicking loop is reported as an internal failure
#[tokio::test]
async fn test_panic_becomes_internal_failure() {
    let joined = tokio::spawn(async {
        if true {
            panic!("loop fault");
        }
        TerminalOutcome::Success
    })
    .await;

    let outcome = outcome_from_join(joined);
    match outcome {
        TerminalOutcome::Failure { kind, message } => {
            assert_eq!(kind, FailureKind::Internal);
            assert!(!message.contains("loop fault"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

/// Test folding events into a report
#[test]
fn test_event_tally() {
    let mut tally = EventTally::default();
    tally.record(&TransferEvent::Warning("slow".to_string()));
    tally.record(&TransferEvent::Progress(10));
    tally.record(&TransferEvent::Progress(55));
    tally.record(&TransferEvent::Status(Default::default()));
    tally.record(&TransferEvent::Terminal(TerminalOutcome::Success));

    let now = chrono::Utc::now();
    let report = tally.into_report(Duration::from_secs(3), now, now);
    assert!(report.is_success());
    assert_eq!(report.progress_events, 2);
    assert_eq!(report.status_events, 1);
    assert_eq!(report.warnings, 1);
    assert_eq!(report.last_progress, Some(55));

    let empty = EventTally::default().into_report(Duration::ZERO, now, now);
    assert!(matches!(
        empty.outcome,
        TerminalOutcome::Failure {
            kind: FailureKind::Internal,
            ..
        }
    ));
}

/// Test the JSON shape of events
#[test]
fn test_event_serialization() {
    let progress = serde_json::to_value(TransferEvent::Progress(42)).unwrap();
    assert_eq!(progress, serde_json::json!({"type": "progress", "data": 42}));

    let failure = TransferEvent::Terminal(TerminalOutcome::Failure {
        kind: FailureKind::Process {
            category: FailureCategory::DiskFull,
            exit_code: 1,
        },
        message: "Insufficient disk space".to_string(),
    });
    let value = serde_json::to_value(&failure).unwrap();
    assert_eq!(value["type"], "terminal");
    assert_eq!(value["data"]["outcome"], "failure");
    assert_eq!(value["data"]["kind"]["kind"], "process");
    assert_eq!(value["data"]["kind"]["exit_code"], 1);

    let parsed: TransferEvent = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, failure);
}

/// Test that short commands fail synchronously
#[tokio::test]
async fn test_too_few_arguments_rejected() {
    let result = TransferSupervisor::start_args(["rclone", "lsf"], SupervisorConfig::default());
    match result {
        Err(SupervisorError::Validation(ValidationError::TooFewArguments { min, actual })) => {
            assert_eq!(min, 3);
            assert_eq!(actual, 2);
        }
        other => panic!("unexpected result: {:?}", other.map(|h| h.pid())),
    }
}

/// Test that an invalid supervisor configuration is rejected before launch
#[cfg(unix)]
#[tokio::test]
async fn test_invalid_config_rejected() {
    let config = SupervisorConfig::default().with_poll_interval(Duration::ZERO);
    let result = TransferSupervisor::start_args(["/bin/sh", "lsf", "remote:"], config);
    assert!(matches!(result, Err(SupervisorError::InvalidConfig { .. })));
}

#[cfg(unix)]
mod scripted {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    use tempfile::TempDir;

    use crate::app::classifier::FailureCategory;
    use crate::app::supervisor::{
        FailureKind, JobState, SupervisorConfig, TerminalOutcome, TransferEvent, TransferHandle,
        TransferSupervisor,
    };
    use crate::errors::SupervisorError;

    const ETXTBSY: i32 = 26;

    fn write_script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-rclone");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig::default()
            .with_poll_interval(Duration::from_millis(20))
            .with_termination_grace(Duration::from_secs(2))
            .with_reader_drain_timeout(Duration::from_millis(500))
    }

    /// Start a script, retrying while another test's fork still holds it open
    async fn start_script(script: &PathBuf, config: SupervisorConfig) -> TransferHandle {
        let args = [script.display().to_string(), "lsf".into(), "remote:".into()];
        for _ in 0..20 {
            match TransferSupervisor::start_args(args.clone(), config.clone()) {
                Err(SupervisorError::Spawn { source, .. })
                    if source.raw_os_error() == Some(ETXTBSY) =>
                {
                    tokio::time::sleep(Duration::from_millis(25)).await;
                }
                other => return other.expect("script should start"),
            }
        }
        panic!("script stayed busy");
    }

    async fn collect(handle: TransferHandle) -> Vec<TransferEvent> {
        tokio::time::timeout(Duration::from_secs(20), async move {
            let mut handle = handle;
            let mut events = Vec::new();
            while let Some(event) = handle.next_event().await {
                events.push(event);
            }
            events
        })
        .await
        .expect("job should finish")
    }

    fn progress_values(events: &[TransferEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn terminals(events: &[TransferEvent]) -> Vec<&TerminalOutcome> {
        events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Terminal(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }

    /// Test duplicate suppression and the terminal 100%
    ///
    /// Repeated values are emitted once and a final 100% is not repeated.
    #[tokio::test]
    async fn test_progress_dedup_and_success() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            &dir,
            "echo '10%'\necho '55%'\necho '55%' >&2\necho '100%'\nexit 0",
        );

        let events = collect(start_script(&script, fast_config()).await).await;

        assert_eq!(progress_values(&events), vec![10, 55, 100]);
        assert_eq!(terminals(&events), vec![&TerminalOutcome::Success]);
        assert!(matches!(events.last(), Some(TransferEvent::Terminal(_))));
    }

    /// Test that success without a final percentage still reports 100%
    #[tokio::test]
    async fn test_success_emits_completion() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "echo 'Transfer: 40%' >&2\nexit 0");

        let handle = start_script(&script, fast_config()).await;
        let report = handle.wait().await;

        assert!(report.is_success());
        assert_eq!(report.last_progress, Some(100));
        assert_eq!(report.progress_events, 2);
    }

    /// Test status snapshots from stats lines
    #[tokio::test]
    async fn test_status_events() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            &dir,
            "echo '2024/05/01 10:00:00 INFO  :    1.000 GiB / 2.000 GiB, 50%, 10 MiB/s, ETA 1m40s' >&2\n\
             echo '2024/05/01 10:00:01 NOTICE: 75% of quota used' >&2\nexit 0",
        );

        let events = collect(start_script(&script, fast_config()).await).await;

        let statuses: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].eta.as_deref(), Some("1m40s"));
        assert_eq!(progress_values(&events), vec![50, 100]);
    }

    /// Test classification of a failing process
    #[tokio::test]
    async fn test_failure_is_classified() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            &dir,
            "echo 'Failed to copy: write /dst: no space left on device' >&2\nexit 1",
        );

        let events = collect(start_script(&script, fast_config()).await).await;

        match terminals(&events).as_slice() {
            [TerminalOutcome::Failure {
                kind: FailureKind::Process {
                    category,
                    exit_code,
                },
                message,
            }] => {
                assert_eq!(*category, FailureCategory::DiskFull);
                assert_eq!(*exit_code, 1);
                assert!(message.starts_with("Insufficient disk space"));
                assert!(message.contains("Technical details:"));
                assert!(message.contains("no space left on device"));
            }
            other => panic!("unexpected terminals: {:?}", other),
        }
        assert!(!progress_values(&events).contains(&100));
    }

    /// Test the inactivity timeout against a silent process
    #[tokio::test]
    async fn test_inactivity_timeout() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "sleep 30");
        let config = fast_config().with_inactivity_timeout(Duration::from_secs(1));

        let started = Instant::now();
        let events = collect(start_script(&script, config).await).await;
        let elapsed = started.elapsed();

        match terminals(&events).as_slice() {
            [TerminalOutcome::Failure {
                kind: FailureKind::Timeout,
                message,
            }] => {
                assert_eq!(message, "Transfer timed out after 1 seconds of inactivity");
            }
            other => panic!("unexpected terminals: {:?}", other),
        }
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1500), "took {:?}", elapsed);
    }

    /// Test that progress from both streams is handled in arrival order
    #[tokio::test]
    async fn test_streams_interleave_in_arrival_order() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "echo '10%' >&2
sleep 0.03
echo '20%'
exit 0");

        let events = collect(start_script(&script, fast_config()).await).await;

        assert_eq!(progress_values(&events), vec![10, 20, 100]);
        assert_eq!(terminals(&events), vec![&TerminalOutcome::Success]);
    }

    /// Test that stdout lines never reach the stderr tail used for classification
    #[tokio::test]
    async fn test_stdout_not_classified() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            &dir,
            "echo 'no space left on device'
echo 'ERROR : directory not found' >&2
exit 1",
        );

        let events = collect(start_script(&script, fast_config()).await).await;

        match terminals(&events).as_slice() {
            [TerminalOutcome::Failure {
                kind: FailureKind::Process { category, .. },
                message,
            }] => {
                assert_ne!(*category, FailureCategory::DiskFull);
                assert!(!message.contains("no space left on device"));
            }
            other => panic!("unexpected terminals: {:?}", other),
        }
    }

    /// Test that a process flooding its output can still be cancelled promptly
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_during_output_flood() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "exec yes '50%'");

        let handle = start_script(&script, fast_config()).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        let cancelled_at = Instant::now();
        handle.cancel();
        let events = collect(handle).await;

        assert!(
            cancelled_at.elapsed() < Duration::from_millis(1500),
            "took {:?}",
            cancelled_at.elapsed()
        );
        assert_eq!(terminals(&events), vec![&TerminalOutcome::Cancelled]);
        assert_eq!(progress_values(&events), vec![50]);
    }

    /// Test that cancelling through the handle signals the process group
    /// without waiting for the poll loop
    #[tokio::test]
    async fn test_cancel_signals_process_group() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("terminated");
        let script = write_script(
            &dir,
            &format!(
                "trap 'touch \"{}\"; exit 0' TERM\nwhile true; do sleep 0.05; done",
                marker.display()
            ),
        );

        let handle = start_script(&script, fast_config()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!marker.exists());

        handle.cancel();
        // Block the runtime thread so the supervising task cannot run
        std::thread::sleep(Duration::from_millis(500));
        assert!(marker.exists(), "child did not receive SIGTERM");

        let events = collect(handle).await;
        assert_eq!(terminals(&events), vec![&TerminalOutcome::Cancelled]);
    }

    /// Test that output keeps the job alive past the inactivity timeout
    #[tokio::test]
    async fn test_output_refreshes_activity() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            &dir,
            "for i in 1 2 3 4 5 6; do echo \"tick $i\"; sleep 0.2; done\nexit 0",
        );
        let config = fast_config().with_inactivity_timeout(Duration::from_millis(700));

        let report = start_script(&script, config).await.wait().await;
        assert!(report.is_success(), "outcome: {:?}", report.outcome);
    }

    /// Test that repeated cancellation yields exactly one terminal event
    #[tokio::test]
    async fn test_double_cancel() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "echo '5%'\nsleep 30");

        let handle = start_script(&script, fast_config()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();
        handle.cancel();

        let token = handle.cancel_token();
        let started = Instant::now();
        let events = collect(handle).await;
        token.cancel();

        assert_eq!(terminals(&events), vec![&TerminalOutcome::Cancelled]);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    /// Test the slow-startup warning is emitted once and is not fatal
    #[tokio::test]
    async fn test_startup_warning_once() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "sleep 0.8\nexit 0");
        let config = fast_config().with_startup_timeout(Duration::from_millis(200));

        let events = collect(start_script(&script, config).await).await;

        let warnings = events
            .iter()
            .filter(|e| matches!(e, TransferEvent::Warning(_)))
            .count();
        assert_eq!(warnings, 1);
        assert_eq!(terminals(&events), vec![&TerminalOutcome::Success]);
    }

    /// Test state reporting and cancel after completion
    #[tokio::test]
    async fn test_cancel_after_finish_is_noop() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "exit 0");

        let mut handle = start_script(&script, fast_config()).await;
        let mut saw_terminal = false;
        while let Some(event) = handle.next_event().await {
            if let TransferEvent::Terminal(outcome) = event {
                assert!(outcome.is_success());
                saw_terminal = true;
            }
        }

        assert!(saw_terminal);
        assert!(handle.is_finished());
        assert_eq!(handle.state(), JobState::Completed);
        handle.cancel();
        assert!(!handle.cancel_token().is_cancelled());
    }

    /// Test that a non-executable program is a launch error
    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not-executable");
        std::fs::write(&path, "plain text").unwrap();

        let result = TransferSupervisor::start_args(
            [path.display().to_string(), "lsf".into(), "remote:".into()],
            SupervisorConfig::default(),
        );
        assert!(matches!(result, Err(SupervisorError::Spawn { .. })));
    }
}
