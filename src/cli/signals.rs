//! Signal handling for supervised transfers
//!
//! Ctrl+C and SIGTERM cancel the running transfer instead of killing the
//! supervisor outright, so the rclone process group is stopped cleanly.

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::CancelToken;

/// Cancel `token` when the process receives Ctrl+C or SIGTERM
///
/// The returned task should be aborted once the transfer has finished.
pub fn cancel_on_signal(token: CancelToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            match signal::ctrl_c().await {
                Ok(()) => info!("Ctrl+C signal received"),
                Err(e) => {
                    warn!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, cancelling transfer");
            },
            _ = terminate => {
                info!("Received terminate signal, cancelling transfer");
            },
        }

        token.cancel();
    })
}
