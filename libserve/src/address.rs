//! Listen addresses and the listeners bound from them.
//!
//! Addresses are written the way the worker's flags accept them:
//!
//! ```text
//! tcp://:7777              all interfaces, port 7777
//! tcp://127.0.0.1:7788     one interface
//! unix:///tmp/csi.sock     Unix domain socket
//! /tmp/csi.sock            Unix domain socket (bare path)
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::net::{TcpListener, UnixListener};
use tracing::debug;

use crate::error::ServeError;

/// Where a server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindAddress {
    /// `host:port`, with an empty host already expanded to `0.0.0.0`.
    Tcp(String),
    /// Filesystem path of a Unix domain socket.
    Unix(PathBuf),
}

impl FromStr for BindAddress {
    type Err = ServeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("tcp://") {
            let rest = rest.trim_end_matches('/');
            let Some((host, port)) = rest.rsplit_once(':') else {
                return Err(ServeError::invalid(s, "missing port"));
            };
            if port.parse::<u16>().is_err() {
                return Err(ServeError::invalid(s, format!("invalid port {port:?}")));
            }
            let host = if host.is_empty() { "0.0.0.0" } else { host };
            return Ok(Self::Tcp(format!("{host}:{port}")));
        }

        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ServeError::invalid(s, "missing socket path"));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        if s.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(s)));
        }

        Err(ServeError::invalid(
            s,
            "expected tcp://host:port, unix:///path or an absolute socket path",
        ))
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// A bound listener, ready to hand to an accept loop.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    /// Bind `addr`. A leftover Unix socket file from a previous run is
    /// removed first.
    pub async fn bind(addr: &BindAddress) -> Result<Self, ServeError> {
        let bind_err = |source: io::Error| ServeError::Bind {
            address: addr.to_string(),
            source,
        };

        match addr {
            BindAddress::Tcp(host_port) => TcpListener::bind(host_port)
                .await
                .map(Self::Tcp)
                .map_err(bind_err),
            BindAddress::Unix(path) => {
                remove_stale_socket(path).await.map_err(bind_err)?;
                UnixListener::bind(path).map(Self::Unix).map_err(bind_err)
            }
        }
    }

    /// Human readable local address, used in logs.
    pub fn local_addr(&self) -> String {
        match self {
            Self::Tcp(l) => l
                .local_addr()
                .map(|a| format!("tcp://{a}"))
                .unwrap_or_else(|_| "tcp://<unknown>".to_owned()),
            Self::Unix(l) => l
                .local_addr()
                .ok()
                .and_then(|a| a.as_pathname().map(|p| format!("unix://{}", p.display())))
                .unwrap_or_else(|| "unix://<unnamed>".to_owned()),
        }
    }
}

async fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale socket");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
