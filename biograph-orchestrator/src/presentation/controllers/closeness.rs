//! Closeness routes

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::families::closeness::{self, ClosenessRequest};
use crate::presentation::error::ApiError;
use crate::presentation::models::UidQuery;

use super::ApiState;

/// Submit a closeness job. Seeds are UniProt accessions, optionally
/// `uniprot.`-prefixed.
#[utoipa::path(
    post,
    path = "/closeness/submit",
    request_body = ClosenessRequest,
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing or invalid parameter")
    ),
    tag = "Closeness"
)]
pub async fn submit(
    State(state): State<ApiState>,
    Json(request): Json<ClosenessRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let params = closeness::normalize(request)?;
    super::submit(&state.closeness, params).await
}

/// Job details: canonical parameters, status, and error or result.
#[utoipa::path(
    get,
    path = "/closeness/status",
    params(UidQuery),
    responses((status = 200, description = "Job document, or an empty mapping for an unknown UID")),
    tag = "Closeness"
)]
pub async fn status(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::status(&state.closeness, query.uid).await
}

/// Full drug ranking of a completed job.
#[utoipa::path(
    get,
    path = "/closeness/download",
    params(UidQuery),
    responses(
        (status = 200, description = "Score-ordered drug ranking (TSV)"),
        (status = 404, description = "Unknown UID or job not completed")
    ),
    tag = "Closeness"
)]
pub async fn download(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Response, ApiError> {
    super::completed_document(&state.closeness, query.uid, "Closeness").await?;
    super::serve_file(
        &closeness::artifact_path(&state.dirs, query.uid),
        "text/plain",
    )
    .await
}
