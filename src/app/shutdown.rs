//! Graceful shutdown handling.

use log::info;
use tokio_util::sync::CancellationToken;

/// Cancels `shutdown` on Ctrl-C.
///
/// Returns as soon as either the signal arrives or `shutdown` was cancelled
/// by someone else.
pub async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received Ctrl-C, finishing in-flight jobs"),
                Err(e) => log::error!("Failed to listen for Ctrl-C: {e}"),
            }
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }
}

/// Stops the background logging task and waits for it.
pub async fn shutdown_gracefully(
    cancel: CancellationToken,
    logging_task: Option<tokio::task::JoinHandle<()>>,
) {
    cancel.cancel();
    if let Some(logging_task) = logging_task {
        if let Err(e) = logging_task.await {
            log::debug!("Progress logger ended abnormally: {e}");
        }
    }
}
