//! Integration tests for the transfer supervisor
//!
//! These tests drive the real supervisor against the `simulate` binary, a
//! fake rclone that prints stats lines, stalls and fails on request.

use std::process::Command;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tempfile::TempDir;

use rclone_supervisor::app::{
    FailureCategory, FailureKind, JobState, SupervisorConfig, TerminalOutcome, TransferEvent,
    TransferHandle, TransferSupervisor,
};

const SIMULATE: &str = env!("CARGO_BIN_EXE_simulate");
const SUPERVISOR: &str = env!("CARGO_BIN_EXE_rclone_supervisor");

/// Create integration test supervisor configuration
///
/// Fast polling and short grace periods keep the suite quick while still
/// exercising every timer.
fn create_test_config() -> SupervisorConfig {
    SupervisorConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_termination_grace(Duration::from_secs(2))
        .with_reader_drain_timeout(Duration::from_millis(500))
}

fn start(extra: &[&str], config: SupervisorConfig) -> TransferHandle {
    let mut args = vec![SIMULATE, "copyto", "remote:data/big.iso", "/tmp/big.iso"];
    args.extend_from_slice(extra);
    TransferSupervisor::start_args(args, config).expect("simulator should start")
}

async fn collect(handle: TransferHandle) -> Vec<TransferEvent> {
    tokio::time::timeout(Duration::from_secs(30), handle.events().collect::<Vec<_>>())
        .await
        .expect("transfer should finish")
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

fn terminal(events: &[TransferEvent]) -> &TerminalOutcome {
    let terminals: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            TransferEvent::Terminal(outcome) => Some(outcome),
            _ => None,
        })
        .collect();
    assert_eq!(terminals.len(), 1, "exactly one terminal event expected");
    assert!(
        matches!(events.last(), Some(TransferEvent::Terminal(_))),
        "terminal event must be last"
    );
    terminals[0]
}

/// Test a complete successful transfer
///
/// Progress rises without repeats and ends at 100; status snapshots carry
/// the speed and amounts.
#[tokio::test]
async fn test_successful_transfer() {
    let handle = start(&["--steps", "5", "--interval", "30ms"], create_test_config());
    let events = collect(handle).await;

    assert_eq!(terminal(&events), &TerminalOutcome::Success);

    let progress = progress_values(&events);
    assert_eq!(progress, vec![20, 40, 60, 80, 100]);

    let status = events.iter().find_map(|e| match e {
        TransferEvent::Status(snapshot) => Some(snapshot.clone()),
        _ => None,
    });
    let status = status.expect("status events expected");
    assert!(status.speed.is_some());
    assert!(status.transferred.is_some());
}

/// Test the report returned by `wait_with`
#[tokio::test]
async fn test_wait_with_builds_report() {
    let handle = start(&["--steps", "4", "--interval", "20ms"], create_test_config());
    let mut seen = 0;
    let report = handle.wait_with(|_| seen += 1).await;

    assert!(report.is_success());
    assert_eq!(report.last_progress, Some(100));
    assert_eq!(report.progress_events, 4);
    assert!(report.status_events >= 4);
    assert!(report.finished_at >= report.started_at);
    assert!(seen >= 9);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"]["outcome"], "success");
}

/// Test that a failing transfer is classified from its stderr
#[tokio::test]
async fn test_disk_full_failure() {
    let handle = start(
        &[
            "--steps",
            "2",
            "--interval",
            "20ms",
            "--exit-code",
            "1",
            "--error",
            "Failed to copy: write /tmp/big.iso: no space left on device",
        ],
        create_test_config(),
    );
    let events = collect(handle).await;

    match terminal(&events) {
        TerminalOutcome::Failure {
            kind:
                FailureKind::Process {
                    category,
                    exit_code,
                },
            message,
        } => {
            assert_eq!(*category, FailureCategory::DiskFull);
            assert_eq!(*exit_code, 1);
            assert!(message.starts_with("Insufficient disk space on destination"));
            assert!(message.contains("Suggestions:"));
            assert!(message.contains("no space left on device"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

/// Test exit-code-only classification
#[tokio::test]
async fn test_exit_code_classification() {
    let handle = start(
        &["--steps", "1", "--interval", "10ms", "--exit-code", "4"],
        create_test_config(),
    );
    let events = collect(handle).await;

    match terminal(&events) {
        TerminalOutcome::Failure {
            kind: FailureKind::Process { category, .. },
            message,
        } => {
            assert_eq!(*category, FailureCategory::FileNotFound);
            assert!(message.starts_with("File not found"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

/// Test that a stalled transfer is stopped by the inactivity timeout
#[tokio::test]
async fn test_stalled_transfer_times_out() {
    let config = create_test_config().with_inactivity_timeout(Duration::from_secs(1));
    let handle = start(
        &["--steps", "4", "--interval", "20ms", "--stall", "60s"],
        config,
    );

    let started = Instant::now();
    let events = collect(handle).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_millis(1500), "took {:?}", elapsed);

    match terminal(&events) {
        TerminalOutcome::Failure {
            kind: FailureKind::Timeout,
            message,
        } => {
            assert_eq!(message, "Transfer timed out after 1 seconds of inactivity");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let progress = progress_values(&events);
    assert!(!progress.contains(&100));
}

/// Test cancelling a transfer in flight
#[tokio::test]
async fn test_cancel_running_transfer() {
    let mut handle = start(&["--steps", "200", "--interval", "50ms"], create_test_config());

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        let is_progress = matches!(event, TransferEvent::Progress(_));
        events.push(event);
        if is_progress {
            break;
        }
    }
    assert_eq!(handle.state(), JobState::Running);

    let started = Instant::now();
    handle.cancel();
    handle.cancel();

    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(terminal(&events), &TerminalOutcome::Cancelled);
    assert_eq!(handle.state(), JobState::Cancelled);
    assert!(handle.is_finished());
}

/// Test that a cancel token moved to another task stops the transfer
#[tokio::test]
async fn test_cancel_token_from_other_task() {
    let handle = start(&["--steps", "200", "--interval", "50ms"], create_test_config());
    let token = handle.cancel_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("cancelled transfer should finish");
    assert_eq!(report.outcome, TerminalOutcome::Cancelled);
}

/// Test that the stream ends after the terminal event
#[tokio::test]
async fn test_event_stream_closes() {
    let handle = start(&["--steps", "2", "--interval", "10ms"], create_test_config());
    let description = handle.description().to_string();
    assert!(description.contains("copyto remote:data/big.iso"));
    assert!(handle.pid().is_some());

    let mut stream = Box::pin(handle.events());
    let mut last = None;
    while let Some(event) = stream.next().await {
        last = Some(event);
    }
    assert!(matches!(last, Some(TransferEvent::Terminal(_))));
}

fn write_cli_config(dir: &TempDir) -> std::path::PathBuf {
    let rclone_conf = dir.path().join("rclone.conf");
    std::fs::write(&rclone_conf, "").unwrap();

    let config_path = dir.path().join("supervisor.toml");
    let content = format!(
        r#"[tool]
rclone_path = "{}"
config_path = "{}"

[supervisor]
poll_interval = "20ms"
inactivity_timeout = "10s"
"#,
        SIMULATE,
        rclone_conf.display()
    );
    std::fs::write(&config_path, content).unwrap();
    config_path
}

/// Test the CLI end to end in JSON mode
#[test]
fn test_cli_json_transfer() {
    let dir = TempDir::new().unwrap();
    let config_path = write_cli_config(&dir);
    let destination = dir.path().join("big.iso");

    let output = Command::new(SUPERVISOR)
        .arg("--config")
        .arg(&config_path)
        .args(["transfer", "remote:data/big.iso"])
        .arg(&destination)
        .args(["--skip-checks", "--json", "--bwlimit", "256"])
        .env("SIMULATE_STEPS", "3")
        .env("SIMULATE_INTERVAL", "20ms")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert!(lines.iter().any(|l| l["type"] == "progress" && l["data"] == 100));
    let terminal = lines.iter().find(|l| l["type"] == "terminal").unwrap();
    assert_eq!(terminal["data"]["outcome"], "success");

    let report = lines.last().unwrap();
    assert_eq!(report["type"], "report");
    assert_eq!(report["data"]["last_progress"], 100);
}

/// Test that a failed transfer sets a failing exit status
#[test]
fn test_cli_failure_exit_status() {
    let dir = TempDir::new().unwrap();
    let config_path = write_cli_config(&dir);
    let destination = dir.path().join("big.iso");

    let output = Command::new(SUPERVISOR)
        .arg("--config")
        .arg(&config_path)
        .args(["transfer", "remote:data/big.iso"])
        .arg(&destination)
        .arg("--skip-checks")
        .env("SIMULATE_STEPS", "1")
        .env("SIMULATE_INTERVAL", "10ms")
        .env("SIMULATE_EXIT_CODE", "1")
        .env("SIMULATE_ERROR", "googleapi: Error 403: Rate Limit Exceeded, rateLimitExceeded")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Rate limited by remote service"));
}
