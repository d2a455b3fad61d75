//! Graph-builder routes

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use tracing::debug;
use uuid::Uuid;

use crate::families::graph::{self, BuildRequest};
use crate::presentation::error::ApiError;

use super::ApiState;

/// Submit a graph build. Returns the UID of an equivalent existing build
/// (for the current database version) or starts a new one.
#[utoipa::path(
    post,
    path = "/graph/builder",
    request_body = BuildRequest,
    responses(
        (status = 200, description = "UID for polling the build", body = Uuid),
        (status = 400, description = "Invalid collection or filter value")
    ),
    tag = "Graph"
)]
pub async fn builder(
    State(state): State<ApiState>,
    Json(request): Json<BuildRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let version = database_version(&state).await;
    let params = graph::normalize(request, &state.graph_config, version)?;
    super::submit(&state.graphs, params).await
}

/// Build details: requested collections, filters, status and error.
#[utoipa::path(
    get,
    path = "/graph/details/{uid}",
    params(("uid" = Uuid, Path, description = "Build UID")),
    responses(
        (status = 200, description = "Build document"),
        (status = 404, description = "No build with this UID")
    ),
    tag = "Graph"
)]
pub async fn details(
    State(state): State<ApiState>,
    Path(uid): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.graphs.status(uid).await? {
        Some(document) => Ok(Json(document)),
        None => Err(ApiError::NotFound(format!(
            "No graph with UID {} is recorded",
            uid
        ))),
    }
}

/// GraphML download of a completed build.
#[utoipa::path(
    get,
    path = "/graph/download/{uid}",
    params(("uid" = Uuid, Path, description = "Build UID")),
    responses(
        (status = 200, description = "Graph as GraphML"),
        (status = 404, description = "Unknown UID or build not completed")
    ),
    tag = "Graph"
)]
pub async fn download(
    State(state): State<ApiState>,
    Path(uid): Path<Uuid>,
) -> Result<Response, ApiError> {
    super::completed_document(&state.graphs, uid, "Graph build").await?;
    super::serve_file(&graph::artifact_path(&state.dirs, uid), "text/plain").await
}

/// Database version stamped into build requests, from the static metadata
/// file. Absent metadata just means version-less deduplication.
async fn database_version(state: &ApiState) -> Option<String> {
    let metadata_path = state.dirs.static_files.join("metadata.json");
    let raw = match tokio::fs::read_to_string(&metadata_path).await {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "No readable database metadata file");
            return None;
        }
    };
    serde_json::from_str::<serde_json::Value>(&raw)
        .ok()?
        .get("version")?
        .as_str()
        .map(String::from)
}
