//! Serve-until-cancelled lifecycle.
//!
//! [`serve_until_cancelled`] binds the listener, spawns the accept loop of a
//! [`Service`] on its own task and blocks until the [`CancellationToken`]
//! fires. The accept loop receives the same cancellation as a future and is
//! expected to stop accepting and drain in-flight requests when it resolves.
//! The call returns only once the loop has exited.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{error, info};

use crate::address::{BindAddress, Listener};
use crate::error::ServeError;

/// A protocol server that can drive an accept loop on a bound listener.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Accept connections on `listener` until `shutdown` resolves, then drain
    /// in-flight requests and return.
    async fn serve(
        self: Arc<Self>,
        listener: Listener,
        shutdown: WaitForCancellationFutureOwned,
    ) -> Result<(), ServeError>;
}

/// Bind `addr` and run `service` on it until `cancel` fires.
pub async fn serve_until_cancelled<S: Service>(
    name: &str,
    service: Arc<S>,
    addr: &BindAddress,
    cancel: CancellationToken,
) -> Result<(), ServeError> {
    let listener = Listener::bind(addr).await?;
    serve_listener(name, service, listener, cancel).await
}

/// Run `service` on an already bound listener until `cancel` fires.
///
/// If the accept loop exits on its own first, its result is returned
/// without waiting for cancellation.
pub async fn serve_listener<S: Service>(
    name: &str,
    service: Arc<S>,
    listener: Listener,
    cancel: CancellationToken,
) -> Result<(), ServeError> {
    info!(server = name, address = %listener.local_addr(), "starting server");

    let mut task = tokio::spawn(service.serve(listener, cancel.clone().cancelled_owned()));

    let exited_early = tokio::select! {
        _ = cancel.cancelled() => None,
        joined = &mut task => Some(joined),
    };

    let joined = match exited_early {
        Some(joined) => joined,
        None => {
            info!(server = name, "stopping server");
            task.await
        }
    };

    let result = flatten(joined);
    if let Err(e) = &result {
        error!(server = name, error = %e, "failed to serve");
    }
    info!(server = name, "stopped server");
    result
}

fn flatten(joined: Result<Result<(), ServeError>, JoinError>) -> Result<(), ServeError> {
    joined.unwrap_or_else(|e| Err(ServeError::Aborted(e.to_string())))
}
