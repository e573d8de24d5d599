use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels `token` on the first Ctrl-C. In-flight runs observe the token
/// through their cancellation checks and stop at the next row boundary.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    info!(target: "lifecheck::sys", "shutdown requested");
                    token.cancel();
                }
                Err(err) => warn!(
                    target: "lifecheck::sys",
                    error = %err,
                    "ctrl-c handler unavailable"
                ),
            },
        }
    });
}
