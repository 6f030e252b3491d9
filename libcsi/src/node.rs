//! CSI Node service trait.
//!
//! The Node service runs on each worker node and makes volumes visible to
//! Pod containers. Only publish and unpublish carry behaviour here: the
//! source directory already lives on the node, so there is nothing to stage.

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{NodeCapability, NodeInfo, NodePublishVolumeRequest};

/// Node service: local mount / unmount operations.
#[async_trait]
pub trait CsiNode: Send + Sync {
    /// Publish a volume: bind-mount its source onto `req.target_path`.
    ///
    /// Idempotent. Publishing onto a target that is already a mount point
    /// succeeds without touching it.
    async fn publish_volume(&self, req: NodePublishVolumeRequest) -> Result<(), CsiError>;

    /// Unpublish a volume: unmount `target_path` if mounted and remove it.
    ///
    /// Idempotent. A missing target is not an error.
    async fn unpublish_volume(&self, volume_id: &str, target_path: &str) -> Result<(), CsiError>;

    /// Return information about the node on which this service is running.
    async fn get_info(&self) -> Result<NodeInfo, CsiError>;

    /// Optional node capabilities. None by default.
    async fn get_capabilities(&self) -> Result<Vec<NodeCapability>, CsiError> {
        Ok(Vec::new())
    }

    async fn stage_volume(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("NodeStageVolume"))
    }

    async fn unstage_volume(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("NodeUnstageVolume"))
    }

    async fn volume_stats(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("NodeGetVolumeStats"))
    }

    async fn expand_volume(&self) -> Result<(), CsiError> {
        Err(CsiError::Unimplemented("NodeExpandVolume"))
    }
}
