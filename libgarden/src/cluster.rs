//! Pod access in a single namespace.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

use crate::error::ClusterError;

/// Namespaced pod operations used by the Garden backend.
#[async_trait]
pub trait PodClient: Send + Sync {
    async fn get(&self, name: &str) -> Result<Pod, ClusterError>;

    /// Pods matching a label selector such as `key=value`.
    async fn list(&self, selector: &str) -> Result<Vec<Pod>, ClusterError>;

    async fn delete(&self, name: &str) -> Result<(), ClusterError>;

    /// Add or overwrite one label on the named pod.
    async fn label(&self, name: &str, key: &str, value: &str) -> Result<(), ClusterError>;
}

/// [`PodClient`] talking to the Kubernetes API server.
#[derive(Clone)]
pub struct KubePodClient {
    pods: Api<Pod>,
}

impl KubePodClient {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            pods: Api::namespaced(client, namespace),
        }
    }

    /// Connect using the in-cluster service account, falling back to the
    /// local kubeconfig.
    pub async fn try_default(namespace: &str) -> Result<Self, ClusterError> {
        let client = Client::try_default().await.map_err(ClusterError::api)?;
        Ok(Self::new(client, namespace))
    }
}

fn map_err(name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => ClusterError::NotFound(name.to_owned()),
        other => ClusterError::api(other),
    }
}

#[async_trait]
impl PodClient for KubePodClient {
    async fn get(&self, name: &str) -> Result<Pod, ClusterError> {
        self.pods.get(name).await.map_err(|e| map_err(name, e))
    }

    async fn list(&self, selector: &str) -> Result<Vec<Pod>, ClusterError> {
        let params = ListParams::default().labels(selector);
        let pods = self.pods.list(&params).await.map_err(ClusterError::api)?;
        Ok(pods.items)
    }

    async fn delete(&self, name: &str) -> Result<(), ClusterError> {
        self.pods
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_err(name, e))?;
        Ok(())
    }

    async fn label(&self, name: &str, key: &str, value: &str) -> Result<(), ClusterError> {
        let patch = json!({ "metadata": { "labels": { key: value } } });
        self.pods
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_err(name, e))?;
        debug!(pod = name, label = key, value, "pod labelled");
        Ok(())
    }
}
