//! # libserve: listener lifecycle shared by the rk8s worker servers
//!
//! Every protocol server in the worker (the Garden HTTP API and the CSI gRPC
//! driver) follows the same pattern: bind a listener, run the accept loop on
//! its own task, wait for a cancellation signal, drain in-flight requests and
//! only then return. This crate owns that pattern once.
//!
//! | Module | Purpose |
//! |---|---|
//! | [`address`] | [`BindAddress`] parsing and [`Listener`] binding. |
//! | [`lifecycle`] | [`Service`] trait and [`serve_until_cancelled`]. |
//! | [`signal`] | Cancel a token on SIGINT / SIGTERM. |
//! | [`error`] | [`ServeError`]. |

pub mod address;
pub mod error;
pub mod lifecycle;
pub mod signal;

pub use address::{BindAddress, Listener};
pub use error::ServeError;
pub use lifecycle::{Service, serve_listener, serve_until_cancelled};
pub use signal::cancel_on_signal;

/// Re-exported so implementors of [`Service`] name the same type.
pub use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
