//! Child process launch and termination

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::app::command::TransferCommand;
use crate::errors::{SupervisorError, SupervisorResult};

/// Launch the tool with piped output and no stdin
///
/// On Unix the child leads its own process group so that termination also
/// reaches anything the tool spawns.
pub(crate) fn spawn(command: &TransferCommand) -> SupervisorResult<Child> {
    let mut cmd = Command::new(command.program());
    cmd.args(command.tool_args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    cmd.spawn().map_err(|source| SupervisorError::Spawn {
        program: command.program().to_string(),
        source,
    })
}

/// Stop the child if it is still running: graceful signal, bounded wait,
/// then a hard kill
pub(crate) async fn terminate(child: &mut Child, grace: Duration) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!("Transfer process already exited with {}", status);
            return;
        }
        Ok(None) => {}
        Err(e) => debug!("Could not query transfer process status: {}", e),
    }

    request_stop(child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!("Transfer process stopped with {}", status),
        Ok(Err(e)) => warn!("Failed waiting for transfer process: {}", e),
        Err(_) => {
            warn!(
                "Transfer process did not exit within {:?}, killing it",
                grace
            );
            force_kill(child).await;
        }
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        debug!("SIGTERM to process group {} failed: {}", pid, e);
        if let Err(e) = child.start_kill() {
            debug!("Kill request failed: {}", e);
        }
    }
}

/// Send SIGTERM to the process group led by `pid`, ignoring failures
///
/// Used on cancel so the tool starts shutting down before the poll loop
/// notices the request.
#[cfg(unix)]
pub(crate) fn signal_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        debug!("SIGTERM to process group {} failed: {}", pid, e);
    }
}

#[cfg(not(unix))]
pub(crate) fn signal_group(_pid: u32) {}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!("Kill request failed: {}", e);
    }
}

async fn force_kill(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }

    if let Err(e) = child.kill().await {
        warn!("Failed to kill transfer process: {}", e);
    }
}
