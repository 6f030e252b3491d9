//! CSI error types.
//!
//! All errors in the `libcsi` crate are represented by the [`CsiError`] enum.
//! The gRPC surface turns them into [`tonic::Status`] values in exactly one
//! place, the [`From`] impl at the bottom of this file, so the status code a
//! caller sees is decided here and nowhere else.

use thiserror::Error;
use tonic::Status;

/// Unified error type for CSI operations.
#[derive(Debug, Error)]
pub enum CsiError {
    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced volume does not exist in the volume store.
    #[error("volume {0} does not exist")]
    VolumeNotFound(String),

    /// The operation is permanently not offered by this driver.
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    /// The driver is missing configuration required to answer.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The mount target exists but is not a directory.
    #[error("target path is not a directory: {0}")]
    NotADirectory(String),

    /// A bind mount failed.
    #[error("failed to mount {source_path} at {target}: {reason}")]
    MountFailed {
        /// Source of the bind mount.
        source_path: String,
        /// Filesystem path where the mount was attempted.
        target: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// An unmount operation failed.
    #[error("unmount failed at {path}: {reason}")]
    UnmountFailed {
        /// Filesystem path where the unmount was attempted.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// A local filesystem operation failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The volume store (baggageclaim) returned an error.
    #[error("volume store error: {0}")]
    BackendError(String),

    /// The driver configuration is unusable.
    #[error("invalid driver configuration: {0}")]
    InvalidConfig(String),
}

impl CsiError {
    /// Create a [`CsiError::BackendError`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn backend<E: std::fmt::Display>(e: E) -> Self {
        Self::BackendError(e.to_string())
    }

    /// Attach `context` to an I/O error.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Shorthand for [`CsiError::InvalidArgument`].
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<CsiError> for Status {
    fn from(err: CsiError) -> Self {
        let msg = err.to_string();
        match err {
            CsiError::InvalidArgument(_) => Status::invalid_argument(msg),
            CsiError::VolumeNotFound(_) => Status::not_found(msg),
            CsiError::Unimplemented(_) => Status::unimplemented(msg),
            CsiError::Unavailable(_) => Status::unavailable(msg),
            CsiError::NotADirectory(_)
            | CsiError::MountFailed { .. }
            | CsiError::UnmountFailed { .. }
            | CsiError::Io { .. }
            | CsiError::BackendError(_)
            | CsiError::InvalidConfig(_) => Status::internal(msg),
        }
    }
}
