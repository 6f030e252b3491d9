//! Baggageclaim HTTP client.
//!
//! Volumes are looked up with `GET /volumes/{handle}` and listed with
//! `GET /volumes?key=value`. The client never retries; a failed request is
//! surfaced to the caller as [`CsiError::BackendError`].

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::CsiError;
use crate::types::VolumeHandle;
use crate::volume::VolumeStore;

/// Volume property carrying the CSI volume id.
pub const VOLUME_ID_PROPERTY: &str = "baggageclaim.worker.k8s.concourse-ci.org/volume-id";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// A volume as reported by baggageclaim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Volume {
    pub handle: String,
    pub path: PathBuf,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Client for a baggageclaim server.
#[derive(Debug, Clone)]
pub struct BaggageclaimClient {
    base: Url,
    http: Client,
}

impl BaggageclaimClient {
    /// Build a client for the server at `base_url`, e.g. `http://127.0.0.1:7788`.
    pub fn new(base_url: &str) -> Result<Self, CsiError> {
        let base = Url::parse(base_url)
            .map_err(|e| CsiError::InvalidConfig(format!("baggageclaim url {base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(CsiError::InvalidConfig(format!(
                "baggageclaim url {base_url} cannot be a base"
            )));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(CsiError::backend)?;
        Ok(Self { base, http })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, CsiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| CsiError::InvalidConfig("baggageclaim url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fetch a single volume, `None` on 404.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn get(&self, handle: &VolumeHandle) -> Result<Option<Volume>, CsiError> {
        let url = self.url(&["volumes", &handle.0])?;
        let resp = self.http.get(url).send().await.map_err(CsiError::backend)?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("volume not found");
            return Ok(None);
        }
        let resp = resp.error_for_status().map_err(CsiError::backend)?;
        resp.json().await.map(Some).map_err(CsiError::backend)
    }

    /// List volumes whose properties include every pair in `properties`.
    #[instrument(skip(self))]
    pub async fn list(&self, properties: &HashMap<String, String>) -> Result<Vec<Volume>, CsiError> {
        let mut url = self.url(&["volumes"])?;
        if !properties.is_empty() {
            url.query_pairs_mut().extend_pairs(properties.iter());
        }
        let resp = self.http.get(url).send().await.map_err(CsiError::backend)?;
        let resp = resp.error_for_status().map_err(CsiError::backend)?;
        resp.json().await.map_err(CsiError::backend)
    }

    /// Find the volume tagged with the given CSI volume id.
    ///
    /// More than one match is an error.
    pub async fn lookup_by_property(&self, volume_id: &str) -> Result<Option<Volume>, CsiError> {
        let filter = HashMap::from([(VOLUME_ID_PROPERTY.to_owned(), volume_id.to_owned())]);
        let mut volumes = self.list(&filter).await?;
        match volumes.len() {
            0 => Ok(None),
            1 => Ok(volumes.pop()),
            n => Err(CsiError::BackendError(format!(
                "multiple volumes found for {volume_id}: {n}"
            ))),
        }
    }

    /// Find the volume containing `path`, with the remainder of `path`
    /// relative to the volume root (empty for an exact match).
    pub async fn lookup_by_path(&self, path: &Path) -> Result<Option<(Volume, PathBuf)>, CsiError> {
        let volumes = self.list(&HashMap::new()).await?;
        Ok(volumes.into_iter().find_map(|vol| {
            let rel = relative_within(&vol.path, path)?;
            Some((vol, rel))
        }))
    }
}

#[async_trait]
impl VolumeStore for BaggageclaimClient {
    async fn lookup(&self, handle: &VolumeHandle) -> Result<Option<PathBuf>, CsiError> {
        Ok(self.get(handle).await?.map(|v| v.path))
    }
}

/// `path` relative to `root` when it lies at or below it.
fn relative_within(root: &Path, path: &Path) -> Option<PathBuf> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.components().any(|c| c == Component::ParentDir) {
        return None;
    }
    Some(rel.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::extract::{Path as UrlPath, Query};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::Router;
    use serde_json::{Value, json};

    fn volumes() -> Value {
        json!([
            {"handle": "vol-1", "path": "/data/vol-1", "properties": {VOLUME_ID_PROPERTY: "pvc-a"}},
            {"handle": "vol-2", "path": "/data/vol-2", "properties": {VOLUME_ID_PROPERTY: "pvc-b"}},
            {"handle": "vol-3", "path": "/data/vol-3", "properties": {VOLUME_ID_PROPERTY: "pvc-b"}},
        ])
    }

    async fn list(Query(filter): Query<HashMap<String, String>>) -> Json<Value> {
        let matching: Vec<Value> = volumes()
            .as_array()
            .into_iter()
            .flatten()
            .filter(|v| {
                filter
                    .iter()
                    .all(|(k, want)| v["properties"][k].as_str() == Some(want.as_str()))
            })
            .cloned()
            .collect();
        Json(Value::Array(matching))
    }

    async fn show(UrlPath(handle): UrlPath<String>) -> Result<Json<Value>, AxumStatus> {
        volumes()
            .as_array()
            .into_iter()
            .flatten()
            .find(|v| v["handle"] == handle.as_str())
            .cloned()
            .map(Json)
            .ok_or(AxumStatus::NOT_FOUND)
    }

    async fn spawn_server() -> BaggageclaimClient {
        let app = Router::new()
            .route("/volumes", get(list))
            .route("/volumes/{handle}", get(show));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        BaggageclaimClient::new(&format!("http://{addr}")).unwrap()
    }

    #[tokio::test]
    async fn lookup_resolves_path() {
        let client = spawn_server().await;
        let path = client.lookup(&"vol-1".into()).await.unwrap();
        assert_eq!(path, Some(PathBuf::from("/data/vol-1")));
    }

    #[tokio::test]
    async fn lookup_missing_is_none() {
        let client = spawn_server().await;
        assert_eq!(client.lookup(&"nope".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn lookup_by_property_cardinality() {
        let client = spawn_server().await;

        let one = client.lookup_by_property("pvc-a").await.unwrap();
        assert_eq!(one.map(|v| v.handle), Some("vol-1".to_owned()));

        assert!(client.lookup_by_property("pvc-z").await.unwrap().is_none());

        let err = client.lookup_by_property("pvc-b").await.unwrap_err();
        assert!(matches!(err, CsiError::BackendError(_)));
    }

    #[tokio::test]
    async fn lookup_by_path_returns_remainder() {
        let client = spawn_server().await;

        let (vol, rel) = client
            .lookup_by_path(Path::new("/data/vol-2/sub/dir"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vol.handle, "vol-2");
        assert_eq!(rel, PathBuf::from("sub/dir"));

        let (vol, rel) = client
            .lookup_by_path(Path::new("/data/vol-3"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vol.handle, "vol-3");
        assert_eq!(rel, PathBuf::new());

        assert!(
            client
                .lookup_by_path(Path::new("/data/vol-10"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_backend_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = BaggageclaimClient::new(&format!("http://{addr}")).unwrap();
        let err = client.lookup(&"vol-1".into()).await.unwrap_err();
        assert!(matches!(err, CsiError::BackendError(_)));
    }

    #[test]
    fn rejects_bad_url() {
        assert!(matches!(
            BaggageclaimClient::new("not a url"),
            Err(CsiError::InvalidConfig(_))
        ));
    }
}
