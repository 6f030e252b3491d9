//! gRPC server that runs on each worker node and dispatches incoming CSI
//! requests to the appropriate trait implementations.

use std::sync::Arc;

use async_trait::async_trait;
use libserve::{Listener, ServeError, Service, WaitForCancellationFutureOwned};
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use super::proto;
use super::proto::identity_server::{Identity, IdentityServer};
use super::proto::node_server::{Node, NodeServer};
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::node::CsiNode;
use crate::types::{
    AccessType, NodeCapability, NodePublishVolumeRequest, PluginCapability,
    VolumeCapability,
};

/// A CSI server exposing a [`CsiIdentity`] + [`CsiNode`] implementation over
/// gRPC.
pub struct CsiServer<T> {
    handler: Arc<T>,
}

impl<T> CsiServer<T>
where
    T: CsiIdentity + CsiNode + 'static,
{
    pub fn new(handler: Arc<T>) -> Self {
        Self { handler }
    }
}

/// Log the failure and turn it into a gRPC status.
fn status(rpc: &'static str, err: CsiError) -> Status {
    match &err {
        CsiError::InvalidArgument(_) | CsiError::Unimplemented(_) => {
            debug!(rpc, error = %err, "request rejected");
        }
        _ => warn!(rpc, error = %err, "request failed"),
    }
    Status::from(err)
}

// ---------------------------------------------------------------------------
// Wire conversions
// ---------------------------------------------------------------------------

impl From<proto::VolumeCapability> for VolumeCapability {
    fn from(cap: proto::VolumeCapability) -> Self {
        use proto::volume_capability::AccessType as Wire;
        let access_type = cap.access_type.map(|t| match t {
            Wire::Mount(m) => AccessType::Mount {
                fs_type: m.fs_type,
                mount_flags: m.mount_flags,
            },
            Wire::Block(_) => AccessType::Block,
        });
        Self { access_type }
    }
}

impl From<proto::NodePublishVolumeRequest> for NodePublishVolumeRequest {
    fn from(req: proto::NodePublishVolumeRequest) -> Self {
        Self {
            volume_id: req.volume_id,
            target_path: req.target_path,
            volume_capability: req.volume_capability.map(Into::into),
            volume_context: req.volume_context,
            read_only: req.readonly,
        }
    }
}

impl From<PluginCapability> for proto::PluginCapability {
    fn from(cap: PluginCapability) -> Self {
        use proto::plugin_capability::{Service, Type, service};
        let kind = match cap {
            PluginCapability::ControllerService => service::Type::ControllerService,
        };
        Self {
            r#type: Some(Type::Service(Service { r#type: kind as i32 })),
        }
    }
}

impl From<NodeCapability> for proto::NodeServiceCapability {
    fn from(cap: NodeCapability) -> Self {
        use proto::node_service_capability::{Rpc, Type, rpc};
        let kind = match cap {
            NodeCapability::StageUnstageVolume => rpc::Type::StageUnstageVolume,
            NodeCapability::GetVolumeStats => rpc::Type::GetVolumeStats,
            NodeCapability::ExpandVolume => rpc::Type::ExpandVolume,
        };
        Self {
            r#type: Some(Type::Rpc(Rpc { r#type: kind as i32 })),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[async_trait]
impl<T> Identity for CsiServer<T>
where
    T: CsiIdentity + CsiNode + 'static,
{
    async fn get_plugin_info(
        &self,
        _request: Request<proto::GetPluginInfoRequest>,
    ) -> Result<Response<proto::GetPluginInfoResponse>, Status> {
        let info = self
            .handler
            .get_plugin_info()
            .await
            .map_err(|e| status("GetPluginInfo", e))?;
        Ok(Response::new(proto::GetPluginInfoResponse {
            name: info.name,
            vendor_version: info.vendor_version,
            manifest: Default::default(),
        }))
    }

    async fn get_plugin_capabilities(
        &self,
        _request: Request<proto::GetPluginCapabilitiesRequest>,
    ) -> Result<Response<proto::GetPluginCapabilitiesResponse>, Status> {
        let caps = self
            .handler
            .get_plugin_capabilities()
            .await
            .map_err(|e| status("GetPluginCapabilities", e))?;
        Ok(Response::new(proto::GetPluginCapabilitiesResponse {
            capabilities: caps.into_iter().map(Into::into).collect(),
        }))
    }

    async fn probe(
        &self,
        _request: Request<proto::ProbeRequest>,
    ) -> Result<Response<proto::ProbeResponse>, Status> {
        let ready = self
            .handler
            .probe()
            .await
            .map_err(|e| status("Probe", e))?;
        Ok(Response::new(proto::ProbeResponse { ready: Some(ready) }))
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[async_trait]
impl<T> Node for CsiServer<T>
where
    T: CsiIdentity + CsiNode + 'static,
{
    async fn node_stage_volume(
        &self,
        _request: Request<proto::NodeStageVolumeRequest>,
    ) -> Result<Response<proto::NodeStageVolumeResponse>, Status> {
        self.handler
            .stage_volume()
            .await
            .map_err(|e| status("NodeStageVolume", e))?;
        Ok(Response::new(proto::NodeStageVolumeResponse {}))
    }

    async fn node_unstage_volume(
        &self,
        _request: Request<proto::NodeUnstageVolumeRequest>,
    ) -> Result<Response<proto::NodeUnstageVolumeResponse>, Status> {
        self.handler
            .unstage_volume()
            .await
            .map_err(|e| status("NodeUnstageVolume", e))?;
        Ok(Response::new(proto::NodeUnstageVolumeResponse {}))
    }

    async fn node_publish_volume(
        &self,
        request: Request<proto::NodePublishVolumeRequest>,
    ) -> Result<Response<proto::NodePublishVolumeResponse>, Status> {
        self.handler
            .publish_volume(request.into_inner().into())
            .await
            .map_err(|e| status("NodePublishVolume", e))?;
        Ok(Response::new(proto::NodePublishVolumeResponse {}))
    }

    async fn node_unpublish_volume(
        &self,
        request: Request<proto::NodeUnpublishVolumeRequest>,
    ) -> Result<Response<proto::NodeUnpublishVolumeResponse>, Status> {
        let req = request.into_inner();
        self.handler
            .unpublish_volume(&req.volume_id, &req.target_path)
            .await
            .map_err(|e| status("NodeUnpublishVolume", e))?;
        Ok(Response::new(proto::NodeUnpublishVolumeResponse {}))
    }

    async fn node_get_volume_stats(
        &self,
        _request: Request<proto::NodeGetVolumeStatsRequest>,
    ) -> Result<Response<proto::NodeGetVolumeStatsResponse>, Status> {
        self.handler
            .volume_stats()
            .await
            .map_err(|e| status("NodeGetVolumeStats", e))?;
        Ok(Response::new(proto::NodeGetVolumeStatsResponse::default()))
    }

    async fn node_expand_volume(
        &self,
        _request: Request<proto::NodeExpandVolumeRequest>,
    ) -> Result<Response<proto::NodeExpandVolumeResponse>, Status> {
        self.handler
            .expand_volume()
            .await
            .map_err(|e| status("NodeExpandVolume", e))?;
        Ok(Response::new(proto::NodeExpandVolumeResponse::default()))
    }

    async fn node_get_capabilities(
        &self,
        _request: Request<proto::NodeGetCapabilitiesRequest>,
    ) -> Result<Response<proto::NodeGetCapabilitiesResponse>, Status> {
        let caps = self
            .handler
            .get_capabilities()
            .await
            .map_err(|e| status("NodeGetCapabilities", e))?;
        Ok(Response::new(proto::NodeGetCapabilitiesResponse {
            capabilities: caps.into_iter().map(Into::into).collect(),
        }))
    }

    async fn node_get_info(
        &self,
        _request: Request<proto::NodeGetInfoRequest>,
    ) -> Result<Response<proto::NodeGetInfoResponse>, Status> {
        let info = self
            .handler
            .get_info()
            .await
            .map_err(|e| status("NodeGetInfo", e))?;
        Ok(Response::new(proto::NodeGetInfoResponse {
            node_id: info.node_id,
            ..Default::default()
        }))
    }
}

// ---------------------------------------------------------------------------
// Accept loop
// ---------------------------------------------------------------------------

#[async_trait]
impl<T> Service for CsiServer<T>
where
    T: CsiIdentity + CsiNode + 'static,
{
    async fn serve(
        self: Arc<Self>,
        listener: Listener,
        shutdown: WaitForCancellationFutureOwned,
    ) -> Result<(), ServeError> {
        let router = Server::builder()
            .add_service(IdentityServer::from_arc(Arc::clone(&self)))
            .add_service(NodeServer::from_arc(self));

        match listener {
            Listener::Tcp(l) => {
                router
                    .serve_with_incoming_shutdown(TcpListenerStream::new(l), shutdown)
                    .await
            }
            Listener::Unix(l) => {
                router
                    .serve_with_incoming_shutdown(UnixListenerStream::new(l), shutdown)
                    .await
            }
        }
        .map_err(ServeError::serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn publish_request_from_wire() {
        let wire = proto::NodePublishVolumeRequest {
            volume_id: "pvc-1".into(),
            target_path: "/var/lib/kubelet/pods/p/mount".into(),
            volume_capability: Some(proto::VolumeCapability {
                access_type: Some(proto::volume_capability::AccessType::Mount(
                    proto::volume_capability::MountVolume {
                        fs_type: "ext4".into(),
                        mount_flags: vec!["noatime".into()],
                    },
                )),
                access_mode: None,
            }),
            readonly: true,
            volume_context: HashMap::from([("k".to_owned(), "v".to_owned())]),
            ..Default::default()
        };

        let req = NodePublishVolumeRequest::from(wire);
        assert_eq!(req.volume_id, "pvc-1");
        assert!(req.read_only);
        assert_eq!(req.volume_context["k"], "v");
        assert_eq!(
            req.volume_capability.unwrap().access_type,
            Some(AccessType::Mount {
                fs_type: "ext4".into(),
                mount_flags: vec!["noatime".into()],
            })
        );
    }

    #[test]
    fn block_and_unset_access_types() {
        let block = VolumeCapability::from(proto::VolumeCapability {
            access_type: Some(proto::volume_capability::AccessType::Block(
                proto::volume_capability::BlockVolume {},
            )),
            access_mode: None,
        });
        assert_eq!(block.access_type, Some(AccessType::Block));

        let unset = VolumeCapability::from(proto::VolumeCapability::default());
        assert!(!unset.is_mount());
    }

    #[test]
    fn node_capability_to_wire() {
        let wire = proto::NodeServiceCapability::from(NodeCapability::GetVolumeStats);
        match wire.r#type {
            Some(proto::node_service_capability::Type::Rpc(rpc)) => {
                assert_eq!(
                    rpc.r#type,
                    proto::node_service_capability::rpc::Type::GetVolumeStats as i32
                );
            }
            other => panic!("unexpected capability {other:?}"),
        }
    }
}
