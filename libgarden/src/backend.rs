//! Container lifecycle on top of pods.
//!
//! A container handle is the name of a pod in the configured namespace.
//! Destroying a container deletes its pod; a pod that is already gone counts
//! as destroyed. Pods are never created here.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cluster::PodClient;
use crate::config::GardenConfig;
use crate::container::{ContainerOp, ContainerView, UnsupportedOp};
use crate::error::{ClusterError, GardenError};

/// Worker capacity as reported to Garden clients. Always zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capacity {
    pub memory_in_bytes: u64,
    pub disk_in_bytes: u64,
    pub max_containers: u64,
}

/// Garden backend mapping container calls onto pods.
pub struct GardenBackend {
    config: GardenConfig,
    pods: Arc<dyn PodClient>,
}

impl GardenBackend {
    pub fn new(config: GardenConfig, pods: Arc<dyn PodClient>) -> Self {
        Self { config, pods }
    }

    pub fn ping(&self) -> Result<(), GardenError> {
        Ok(())
    }

    pub fn capacity(&self) -> Result<Capacity, GardenError> {
        Ok(Capacity::default())
    }

    /// Seconds a container may stay idle before it is reaped. Never.
    pub fn grace_time(&self, _handle: &str) -> u64 {
        0
    }

    pub fn create(&self) -> Result<ContainerView, GardenError> {
        Err(GardenError::Unsupported(UnsupportedOp::Create))
    }

    /// Refuse a per-container call the worker cannot serve.
    pub fn unsupported(&self, handle: &str, op: UnsupportedOp) -> GardenError {
        debug!(handle, op = %op, "operation not supported");
        GardenError::Unsupported(op)
    }

    #[instrument(skip(self), fields(op = %ContainerOp::Lookup))]
    pub async fn lookup(&self, handle: &str) -> Result<ContainerView, GardenError> {
        match self.pods.get(handle).await {
            Ok(pod) => Ok(ContainerView::from(&pod)),
            Err(ClusterError::NotFound(_)) => Err(GardenError::ContainerNotFound(handle.to_owned())),
            Err(e) => {
                warn!(error = %e, "failed to get pod");
                Err(e.into())
            }
        }
    }

    /// Containers owned by this worker. `properties` is accepted for API
    /// compatibility and ignored: pods carry no Garden properties.
    #[instrument(skip_all, fields(op = %ContainerOp::List))]
    pub async fn list(
        &self,
        properties: &HashMap<String, String>,
    ) -> Result<Vec<ContainerView>, GardenError> {
        if !properties.is_empty() {
            debug!(?properties, "ignoring property filter");
        }
        let selector = self.config.owner_selector();
        let pods = self.pods.list(&selector).await.map_err(|e| {
            warn!(%selector, error = %e, "failed to list pods");
            GardenError::from(e)
        })?;

        Ok(pods
            .iter()
            .map(ContainerView::from)
            .filter(|view| self.owns(view))
            .collect())
    }

    fn owns(&self, view: &ContainerView) -> bool {
        view.labels.get(&self.config.owner_label) == Some(&self.config.worker_name)
    }

    #[instrument(skip(self), fields(op = %ContainerOp::Destroy))]
    pub async fn destroy(&self, handle: &str) -> Result<(), GardenError> {
        self.delete_pod(handle).await
    }

    /// Stopping a pod-backed container is deleting it. `kill` changes
    /// nothing.
    #[instrument(skip(self), fields(op = %ContainerOp::Stop))]
    pub async fn stop(&self, handle: &str, kill: bool) -> Result<(), GardenError> {
        if kill {
            debug!("kill requested, deleting pod as usual");
        }
        self.delete_pod(handle).await
    }

    async fn delete_pod(&self, handle: &str) -> Result<(), GardenError> {
        match self.pods.delete(handle).await {
            Ok(()) => {
                info!("pod deleted");
                Ok(())
            }
            Err(ClusterError::NotFound(_)) => {
                debug!("pod already gone");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to delete pod");
                Err(e.into())
            }
        }
    }

    pub fn bulk_info(&self, _handles: &[String]) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }

    pub fn bulk_metrics(&self, _handles: &[String]) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }

    /// Mark the worker's own pod with `worker_label=worker_name`.
    #[instrument(skip(self))]
    pub async fn label_worker_pod(&self, pod_name: &str) -> Result<(), ClusterError> {
        self.pods
            .label(pod_name, &self.config.worker_label, &self.config.worker_name)
            .await?;
        info!(label = %self.config.worker_label, worker = %self.config.worker_name, "labelled worker pod");
        Ok(())
    }
}
