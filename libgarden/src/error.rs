//! Garden and cluster error types.

use thiserror::Error;

use crate::container::UnsupportedOp;

/// Failures reported by a [`PodClient`](crate::PodClient).
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The named pod does not exist.
    #[error("pod {0} not found")]
    NotFound(String),

    /// Any other API server or transport failure.
    #[error("cluster request failed: {0}")]
    Api(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ClusterError {
    pub fn api<E: Into<Box<dyn std::error::Error + Send + Sync>>>(e: E) -> Self {
        Self::Api(e.into())
    }
}

/// Failures surfaced through the Garden API.
#[derive(Debug, Error)]
pub enum GardenError {
    /// No container with this handle exists.
    #[error("unknown handle: {0}")]
    ContainerNotFound(String),

    /// The operation is outside what a pod-backed worker can do.
    #[error("not supported")]
    Unsupported(UnsupportedOp),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl GardenError {
    /// Garden wire name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContainerNotFound(_) => "ContainerNotFoundError",
            Self::Unsupported(_) => "UnsupportedError",
            Self::Cluster(_) => "ServiceError",
        }
    }

    /// Container handle the error refers to, if any.
    pub fn handle(&self) -> Option<&str> {
        match self {
            Self::ContainerNotFound(handle) => Some(handle),
            _ => None,
        }
    }
}
