//! Volume store seam.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::VolumeHandle;

/// Resolves volume handles to host directories.
#[async_trait]
pub trait VolumeStore: Send + Sync {
    /// Host path of the volume named by `handle`, or `None` when the store
    /// does not know it.
    async fn lookup(&self, handle: &VolumeHandle) -> Result<Option<PathBuf>, CsiError>;
}
