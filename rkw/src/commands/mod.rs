pub mod csi;
pub mod garden;
pub mod init;

use std::sync::Arc;

use anyhow::{Context, Result};
use libserve::{BindAddress, CancellationToken, Service, cancel_on_signal, serve_until_cancelled};
use tracing::{Instrument, info_span};

use crate::logging::log_key;

/// Run `service` on `addr` until SIGINT or SIGTERM.
pub(crate) async fn serve<S: Service>(name: &str, service: Arc<S>, addr: &BindAddress) -> Result<()> {
    let cancel = CancellationToken::new();
    let signals = cancel_on_signal(cancel.clone());

    let result = serve_until_cancelled(name, service, addr, cancel.clone())
        .instrument(info_span!("rkw", session = %log_key(name)))
        .await;

    cancel.cancel();
    signals.await.context("signal handler task failed")?;
    result.with_context(|| format!("problem running {name} server"))
}
