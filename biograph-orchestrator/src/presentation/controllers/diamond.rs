//! DIAMOnD routes

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::families::diamond::{self, DiamondRequest};
use crate::presentation::error::ApiError;
use crate::presentation::models::UidQuery;

use super::ApiState;

/// Submit a DIAMOnD job. Seeds should be Entrez gene IDs or UniProt
/// accessions; an equivalent prior submission returns its existing UID.
#[utoipa::path(
    post,
    path = "/diamond/submit",
    request_body = DiamondRequest,
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing or invalid parameter")
    ),
    tag = "DIAMOnD"
)]
pub async fn submit(
    State(state): State<ApiState>,
    Json(request): Json<DiamondRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let params = diamond::normalize(request)?;
    super::submit(&state.diamond, params).await
}

/// Job details: canonical parameters, status, and error or result.
#[utoipa::path(
    get,
    path = "/diamond/status",
    params(UidQuery),
    responses((status = 200, description = "Job document, or an empty mapping for an unknown UID")),
    tag = "DIAMOnD"
)]
pub async fn status(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::status(&state.diamond, query.uid).await
}

/// Ranked-node output of a completed job.
#[utoipa::path(
    get,
    path = "/diamond/download",
    params(UidQuery),
    responses(
        (status = 200, description = "Ranked module nodes (TSV)"),
        (status = 404, description = "Unknown UID or job not completed")
    ),
    tag = "DIAMOnD"
)]
pub async fn download(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Response, ApiError> {
    super::completed_document(&state.diamond, query.uid, "DIAMOnD").await?;
    super::serve_file(&diamond::artifact_path(&state.dirs, query.uid), "text/plain").await
}
