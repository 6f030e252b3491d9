//! Garden HTTP routes.
//!
//! Only the subset of the Garden wire protocol Concourse needs from a
//! pod-backed worker is answered with real data. Per-container routes look
//! the container up first, so an unknown handle is a 404 before anything
//! else is considered.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use libserve::{Listener, ServeError, Service, WaitForCancellationFutureOwned};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::backend::{Capacity, GardenBackend};
use crate::container::UnsupportedOp;
use crate::error::GardenError;

type Shared = Arc<GardenBackend>;
type Params = HashMap<String, String>;
type Refusal = Pin<Box<dyn Future<Output = Result<Json<Value>, GardenError>> + Send>>;

/// Garden error body.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    #[serde(rename = "Type")]
    kind: &'static str,
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Handle", skip_serializing_if = "Option::is_none")]
    handle: Option<&'a str>,
}

impl IntoResponse for GardenError {
    fn into_response(self) -> Response {
        let status = match &self {
            GardenError::ContainerNotFound(_) => StatusCode::NOT_FOUND,
            GardenError::Unsupported(_) | GardenError::Cluster(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if let GardenError::Cluster(e) = &self {
            warn!(error = %e, "garden request failed");
        }
        let body = ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
            handle: self.handle(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct StopRequest {
    #[serde(default)]
    kill: bool,
}

#[derive(Debug, Default, Deserialize)]
struct BulkQuery {
    #[serde(default)]
    handles: String,
}

impl BulkQuery {
    fn handles(&self) -> Vec<String> {
        self.handles
            .split(',')
            .filter(|h| !h.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Build the Garden router around `backend`.
pub fn router(backend: Shared) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/capacity", get(capacity))
        .route("/containers", get(list).post(create))
        .route("/containers/bulk_info", get(bulk_info))
        .route("/containers/bulk_metrics", get(bulk_metrics))
        .route("/containers/{handle}", delete(destroy))
        .route("/containers/{handle}/stop", put(stop))
        .route("/containers/{handle}/info", get(refuse(UnsupportedOp::Info)))
        .route(
            "/containers/{handle}/files",
            put(refuse(UnsupportedOp::StreamIn)).get(refuse(UnsupportedOp::StreamOut)),
        )
        .route(
            "/containers/{handle}/limits/bandwidth",
            get(refuse(UnsupportedOp::BandwidthLimits)),
        )
        .route("/containers/{handle}/limits/cpu", get(refuse(UnsupportedOp::CpuLimits)))
        .route("/containers/{handle}/limits/disk", get(refuse(UnsupportedOp::DiskLimits)))
        .route(
            "/containers/{handle}/limits/memory",
            get(refuse(UnsupportedOp::MemoryLimits)),
        )
        .route("/containers/{handle}/net/in", post(refuse(UnsupportedOp::NetIn)))
        .route("/containers/{handle}/net/out", post(refuse(UnsupportedOp::NetOut)))
        .route(
            "/containers/{handle}/net/out/bulk",
            post(refuse(UnsupportedOp::BulkNetOut)),
        )
        .route("/containers/{handle}/processes", post(refuse(UnsupportedOp::Run)))
        .route(
            "/containers/{handle}/processes/{pid}",
            get(refuse(UnsupportedOp::Attach)),
        )
        .route("/containers/{handle}/metrics", get(refuse(UnsupportedOp::Metrics)))
        .route(
            "/containers/{handle}/grace_time",
            put(refuse(UnsupportedOp::SetGraceTime)),
        )
        .route(
            "/containers/{handle}/properties",
            get(refuse(UnsupportedOp::Properties)),
        )
        .route(
            "/containers/{handle}/properties/{key}",
            get(refuse(UnsupportedOp::Property))
                .put(refuse(UnsupportedOp::SetProperty))
                .delete(refuse(UnsupportedOp::RemoveProperty)),
        )
        .with_state(backend)
}

async fn ping(State(backend): State<Shared>) -> Result<Json<Value>, GardenError> {
    backend.ping()?;
    Ok(Json(json!({})))
}

async fn capacity(State(backend): State<Shared>) -> Result<Json<Capacity>, GardenError> {
    backend.capacity().map(Json)
}

async fn create(State(backend): State<Shared>) -> Result<Json<Value>, GardenError> {
    backend.create()?;
    Ok(Json(json!({})))
}

async fn list(
    State(backend): State<Shared>,
    Query(properties): Query<Params>,
) -> Result<Json<Value>, GardenError> {
    let handles: Vec<String> = backend
        .list(&properties)
        .await?
        .into_iter()
        .map(|view| view.handle)
        .collect();
    Ok(Json(json!({ "handles": handles })))
}

async fn bulk_info(
    State(backend): State<Shared>,
    Query(query): Query<BulkQuery>,
) -> Json<Value> {
    Json(json!({ "infos": backend.bulk_info(&query.handles()) }))
}

async fn bulk_metrics(
    State(backend): State<Shared>,
    Query(query): Query<BulkQuery>,
) -> Json<Value> {
    Json(json!({ "metrics": backend.bulk_metrics(&query.handles()) }))
}

async fn destroy(
    State(backend): State<Shared>,
    Path(handle): Path<String>,
) -> Result<Json<Value>, GardenError> {
    backend.destroy(&handle).await?;
    Ok(Json(json!({})))
}

async fn stop(
    State(backend): State<Shared>,
    Path(handle): Path<String>,
    Json(req): Json<StopRequest>,
) -> Result<Json<Value>, GardenError> {
    backend.lookup(&handle).await?;
    backend.stop(&handle, req.kill).await?;
    Ok(Json(json!({})))
}

/// Handler for a per-container route the backend does not serve.
fn refuse(
    op: UnsupportedOp,
) -> impl Fn(State<Shared>, Path<Params>) -> Refusal + Clone + Send + Sync + 'static {
    move |State(backend): State<Shared>, Path(params): Path<Params>| -> Refusal {
        Box::pin(async move {
            let handle = params.get("handle").cloned().unwrap_or_default();
            backend.lookup(&handle).await?;
            Err::<Json<Value>, _>(backend.unsupported(&handle, op))
        })
    }
}

/// The Garden API server.
pub struct GardenServer {
    backend: Shared,
}

impl GardenServer {
    pub fn new(backend: Shared) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Service for GardenServer {
    async fn serve(
        self: Arc<Self>,
        listener: Listener,
        shutdown: WaitForCancellationFutureOwned,
    ) -> Result<(), ServeError> {
        let app = router(Arc::clone(&self.backend));
        match listener {
            Listener::Tcp(l) => axum::serve(l, app).with_graceful_shutdown(shutdown).await,
            Listener::Unix(l) => axum::serve(l, app).with_graceful_shutdown(shutdown).await,
        }
        .map_err(ServeError::serve)
    }
}
