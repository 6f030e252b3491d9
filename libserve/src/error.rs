//! Errors raised while binding or running a server.

use thiserror::Error;

/// Boxed error produced by a server's accept loop.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ServeError {
    /// The configured address could not be parsed.
    #[error("invalid bind address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Binding the listener failed.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop returned an error.
    #[error("serve failed: {0}")]
    Serve(#[source] BoxError),

    /// The accept loop task panicked or was aborted.
    #[error("server task aborted: {0}")]
    Aborted(String),
}

impl ServeError {
    /// Wrap any accept-loop error.
    pub fn serve<E: Into<BoxError>>(e: E) -> Self {
        Self::Serve(e.into())
    }

    pub(crate) fn invalid(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.to_owned(),
            reason: reason.into(),
        }
    }
}
