//! Process signal handling.

use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `token` on the first SIGINT or SIGTERM.
///
/// The returned task also finishes quietly if the token is cancelled by
/// someone else first.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler, relying on SIGINT only");
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received interrupt"),
                    _ = token.cancelled() => return,
                }
                token.cancel();
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received interrupt"),
            _ = terminate.recv() => info!("received terminate"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    })
}
