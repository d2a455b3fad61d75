//! ROBUST routes

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::families::robust::{self, RobustRequest};
use crate::presentation::error::ApiError;
use crate::presentation::models::UidQuery;

use super::ApiState;

/// Submit a ROBUST job.
#[utoipa::path(
    post,
    path = "/robust/submit",
    request_body = RobustRequest,
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing or invalid parameter")
    ),
    tag = "ROBUST"
)]
pub async fn submit(
    State(state): State<ApiState>,
    Json(request): Json<RobustRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let params = robust::normalize(request)?;
    super::submit(&state.robust, params).await
}

/// Job details: canonical parameters, status, and error or result.
#[utoipa::path(
    get,
    path = "/robust/status",
    params(UidQuery),
    responses((status = 200, description = "Job document, or an empty mapping for an unknown UID")),
    tag = "ROBUST"
)]
pub async fn status(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::status(&state.robust, query.uid).await
}

/// GraphML module of a completed job.
#[utoipa::path(
    get,
    path = "/robust/results",
    params(UidQuery),
    responses(
        (status = 200, description = "Module as GraphML"),
        (status = 404, description = "Unknown UID or job not completed")
    ),
    tag = "ROBUST"
)]
pub async fn results(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Response, ApiError> {
    super::completed_document(&state.robust, query.uid, "ROBUST").await?;
    super::serve_file(&robust::artifact_path(&state.dirs, query.uid), "text/plain").await
}
