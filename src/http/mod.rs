//! HTTP API (§6): a thin JSON front end over the Provisioner. Every
//! endpoint maps one-to-one onto a Provisioner operation — routing,
//! request parsing, and serialization only, no business logic.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::GscpError;
use crate::provisioner::{LaunchOptions, Provisioner};
use crate::reconciler::Reconciler;
use crate::state::records::ServerRecord;
use crate::state::{ServerState, SnapshotState};

pub struct ApiState {
    pub provisioner: Arc<Provisioner>,
    pub servers: Arc<ServerState>,
    pub snapshots: Arc<SnapshotState>,
    pub reconciler: Arc<Reconciler>,
}

pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/servers", get(list_servers).post(create_server))
        .route("/servers/{id}", get(get_server).delete(destroy_server))
        .route("/servers/{id}/pause", post(pause_server))
        .route("/servers/{id}/resume", post(resume_server))
        .route("/servers/{id}/stop", post(stop_server))
        .route("/servers/{id}/pin", post(pin_server))
        .route("/servers/{id}/unpin", post(unpin_server))
        .route("/servers/{id}/snapshot", post(snapshot_server))
        .route("/snapshots", get(list_snapshots))
        .route("/snapshots/{id}", delete(delete_snapshot))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: Arc<ApiState>, addr: SocketAddr) -> crate::error::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP API listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

impl IntoResponse for GscpError {
    fn into_response(self) -> axum::response::Response {
        let status = if self.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            match &self {
                GscpError::Config(_) => StatusCode::BAD_REQUEST,
                GscpError::CloudConflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };
        (status, Json(ApiError { error: self.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, GscpError>;

async fn list_servers(State(state): State<Arc<ApiState>>) -> ApiResult<Vec<ServerRecord>> {
    state.reconciler.auto_reconcile().await;
    Ok(Json(state.servers.list_all().await))
}

async fn get_server(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<Json<ServerRecord>, GscpError> {
    state.reconciler.auto_reconcile().await;
    state
        .servers
        .get_by_name_or_id(&id)
        .await
        .map(Json)
        .ok_or_else(|| GscpError::CloudNotFound(id))
}

#[derive(Debug, Deserialize)]
struct CreateServerRequest {
    game: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    instance_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    config: std::collections::HashMap<String, String>,
    #[serde(default)]
    from_snapshot: Option<String>,
    #[serde(default)]
    pin_ip: bool,
}

async fn create_server(State(state): State<Arc<ApiState>>, Json(req): Json<CreateServerRequest>) -> Result<Json<ServerRecord>, GscpError> {
    let opts = LaunchOptions {
        game: req.game,
        region: req.region,
        instance_type: req.instance_type,
        name: req.name,
        config_overrides: req.config,
        config_file: None,
        uploads: Vec::new(),
        from_snapshot: req.from_snapshot,
        pin_ip: req.pin_ip,
    };
    let record = state.provisioner.launch(opts, None).await?;
    Ok(Json(record))
}

async fn destroy_server(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<StatusCode, GscpError> {
    state.provisioner.destroy(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn pause_server(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<StatusCode, GscpError> {
    state.provisioner.pause(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn resume_server(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<StatusCode, GscpError> {
    state.provisioner.resume(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_server(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<StatusCode, GscpError> {
    state.provisioner.stop_container(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn pin_server(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<StatusCode, GscpError> {
    state.provisioner.pin_ip(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unpin_server(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<StatusCode, GscpError> {
    state.provisioner.unpin_ip(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn snapshot_server(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<Json<crate::state::records::SnapshotRecord>, GscpError> {
    let record = state.provisioner.snapshot(&id).await?;
    Ok(Json(record))
}

async fn list_snapshots(State(state): State<Arc<ApiState>>) -> ApiResult<Vec<crate::state::records::SnapshotRecord>> {
    Ok(Json(state.snapshots.list_all().await))
}

async fn delete_snapshot(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> Result<StatusCode, GscpError> {
    state.provisioner.delete_snapshot(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
