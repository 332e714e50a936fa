//! Pre-transfer checks
//!
//! Cheap probes run before a transfer is started so that common problems
//! (no network, a full disk, a mistyped remote path) are reported up front
//! instead of as a failed transfer minutes later. A check either passes,
//! passes with a warning, is skipped because it could not be performed, or
//! fails with a [`PreflightError`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::app::command::{
    is_remote_path, CommandBuilder, TransferCommand, TransferDirection, TransferRequest,
};
use crate::constants::preflight;
use crate::errors::{PreflightError, PreflightResult};

/// How a non-failing check ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Warning,
    /// The check could not be performed; the transfer may proceed
    Skipped,
}

/// Result of a single non-failing check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub check: &'static str,
    pub status: CheckStatus,
    pub message: String,
}

impl CheckReport {
    fn new(check: &'static str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            check,
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.status {
            CheckStatus::Passed => "ok",
            CheckStatus::Warning => "warning",
            CheckStatus::Skipped => "skipped",
        };
        write!(f, "[{}] {} check: {}", marker, self.check, self.message)
    }
}

/// Output of `size --json`
#[derive(Debug, Deserialize)]
struct SizeReport {
    bytes: u64,
}

/// Runs the pre-transfer checks for one tool installation
#[derive(Debug, Clone)]
pub struct Preflight {
    builder: CommandBuilder,
    network_probe: String,
    network_timeout: Duration,
    remote_timeout: Duration,
}

impl Preflight {
    pub fn new(builder: CommandBuilder) -> Self {
        Self {
            builder,
            network_probe: preflight::NETWORK_PROBE_ADDR.to_string(),
            network_timeout: preflight::NETWORK_PROBE_TIMEOUT,
            remote_timeout: preflight::REMOTE_PROBE_TIMEOUT,
        }
    }

    /// Probe a different `host:port` for connectivity
    pub fn with_network_probe(mut self, addr: impl Into<String>) -> Self {
        self.network_probe = addr.into();
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Run every check that applies to `request`
    ///
    /// Downloads from a remote additionally get the remote existence probe and
    /// a free-space check on the destination.
    pub async fn run(&self, request: &TransferRequest) -> PreflightResult<Vec<CheckReport>> {
        info!("Running pre-transfer checks for {}", request.display_name());
        let mut reports = vec![check_network(&self.network_probe, self.network_timeout).await?];

        if request.direction == TransferDirection::Download && is_remote_path(&request.source) {
            reports.push(self.check_remote_exists(&request.source).await?);
            let estimate = self.estimate_size(&request.source).await;
            reports.push(check_disk_space(Path::new(&request.destination), estimate)?);
        }

        for report in &reports {
            debug!("{}", report);
        }
        Ok(reports)
    }

    /// Confirm a remote path can be listed
    ///
    /// When the listing reports a missing directory, the parent is probed so
    /// the error can distinguish a missing file from a wrong path.
    pub async fn check_remote_exists(&self, source: &str) -> PreflightResult<CheckReport> {
        const CHECK: &str = "remote";

        let command = self.builder.listing("lsf", source)?;
        let Some(output) = run_probe(&command, &[], self.remote_timeout).await? else {
            warn!("Remote file check timed out - proceeding anyway");
            return Ok(CheckReport::new(
                CHECK,
                CheckStatus::Warning,
                "Remote file check timed out - proceeding anyway",
            ));
        };

        if output.status.success() {
            return Ok(CheckReport::new(CHECK, CheckStatus::Passed, "Remote file exists"));
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.to_lowercase().contains("directory not found") {
            let parent = remote_parent(source);
            let parent_command = self.builder.listing("lsjson", &parent)?;
            if let Some(parent_output) =
                run_probe(&parent_command, &[], self.remote_timeout).await?
            {
                if parent_output.status.success() {
                    return Err(PreflightError::RemoteNotFound {
                        source_path: source.to_string(),
                        details: "File not found in parent directory".to_string(),
                    });
                }
            }
        }

        Err(PreflightError::RemoteNotFound {
            source_path: source.to_string(),
            details: stderr,
        })
    }

    /// Total size of a remote path in bytes, if the tool can report it
    pub async fn estimate_size(&self, source: &str) -> Option<u64> {
        let command = self.builder.listing("size", source).ok()?;
        let output = match run_probe(&command, &["--json"], self.remote_timeout).await {
            Ok(Some(output)) if output.status.success() => output,
            Ok(_) => {
                debug!("Size probe for {} failed or timed out", source);
                return None;
            }
            Err(e) => {
                debug!("Size probe for {} could not run: {}", source, e);
                return None;
            }
        };

        match serde_json::from_slice::<SizeReport>(&output.stdout) {
            Ok(report) => Some(report.bytes),
            Err(e) => {
                debug!("Unexpected size output: {}", e);
                None
            }
        }
    }
}

/// Run a short-lived tool command, returning `None` on timeout
async fn run_probe(
    command: &TransferCommand,
    extra: &[&str],
    timeout: Duration,
) -> PreflightResult<Option<Output>> {
    let mut cmd = Command::new(command.program());
    cmd.args(command.tool_args())
        .args(extra)
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(output) => Ok(Some(output?)),
        Err(_) => Ok(None),
    }
}

/// Parent of a remote path: `remote:a/b` -> `remote:a`, `remote:a` -> `remote:`
fn remote_parent(source: &str) -> String {
    match source.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => match source.split_once(':') {
            Some((remote, _)) => format!("{}:", remote),
            None => source.to_string(),
        },
    }
}

/// Check that `addr` accepts TCP connections within `timeout`
pub async fn check_network(addr: &str, timeout: Duration) -> PreflightResult<CheckReport> {
    const CHECK: &str = "network";

    let started = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => {
            let elapsed = started.elapsed();
            if elapsed > preflight::SLOW_NETWORK_THRESHOLD {
                Ok(CheckReport::new(
                    CHECK,
                    CheckStatus::Warning,
                    format!(
                        "Slow network connection ({}ms). Transfers may take longer",
                        elapsed.as_millis()
                    ),
                ))
            } else {
                Ok(CheckReport::new(
                    CHECK,
                    CheckStatus::Passed,
                    format!("Network OK ({}ms)", elapsed.as_millis()),
                ))
            }
        }
        Ok(Err(e)) => Err(PreflightError::NetworkUnreachable {
            reason: e.to_string(),
        }),
        Err(_) => Err(PreflightError::NetworkUnreachable {
            reason: format!("no response from {} within {:?}", addr, timeout),
        }),
    }
}

/// Check free space at a local destination
///
/// Space that cannot be read is reported as skipped rather than failing.
pub fn check_disk_space(
    destination: &Path,
    estimated_size: Option<u64>,
) -> PreflightResult<CheckReport> {
    const CHECK: &str = "disk space";

    let dir = existing_directory(destination);
    let available = match free_space(&dir) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Could not check disk space at {}: {}", dir.display(), e);
            return Ok(CheckReport::new(
                CHECK,
                CheckStatus::Skipped,
                format!("Could not check disk space: {}", e),
            ));
        }
    };

    evaluate_space(available, estimated_size)?;
    Ok(CheckReport::new(
        CHECK,
        CheckStatus::Passed,
        format!("Disk space OK: {:.1}GB available", gib(available)),
    ))
}

/// Decide whether `available` bytes suffice
///
/// With a size estimate, 10% headroom is required on top of it. Independently,
/// less than 1 GiB free always fails.
pub fn evaluate_space(available: u64, estimated_size: Option<u64>) -> PreflightResult<()> {
    if let Some(estimate) = estimated_size.filter(|size| *size > 0) {
        let required = (estimate as f64 * preflight::SPACE_HEADROOM_FACTOR).ceil() as u64;
        if available < required {
            return Err(PreflightError::InsufficientSpace {
                required,
                available,
            });
        }
    }

    if available < preflight::MIN_FREE_SPACE_BYTES {
        return Err(PreflightError::LowSpace { available });
    }

    Ok(())
}

fn gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

/// The directory a destination will be written into
///
/// Files resolve to their parent and not-yet-created paths to their nearest
/// existing ancestor.
fn existing_directory(destination: &Path) -> PathBuf {
    let mut candidate = if destination.is_file() {
        destination.parent().unwrap_or(destination).to_path_buf()
    } else {
        destination.to_path_buf()
    };

    while !candidate.is_dir() {
        match candidate.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => candidate = parent.to_path_buf(),
            _ => return PathBuf::from("."),
        }
    }
    candidate
}

#[cfg(unix)]
fn free_space(dir: &Path) -> std::io::Result<u64> {
    let stats = nix::sys::statvfs::statvfs(dir).map_err(std::io::Error::from)?;
    Ok(stats.blocks_available() as u64 * stats.fragment_size() as u64)
}

#[cfg(not(unix))]
fn free_space(_dir: &Path) -> std::io::Result<u64> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "free space query is not supported on this platform",
    ))
}
