//! DOMINO routes

use axum::extract::{Query, State};
use axum::Json;
use uuid::Uuid;

use crate::families::domino::{self, DominoRequest};
use crate::presentation::error::ApiError;
use crate::presentation::models::UidQuery;

use super::ApiState;

/// Submit a DOMINO job.
#[utoipa::path(
    post,
    path = "/domino/submit",
    request_body = DominoRequest,
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing or invalid parameter")
    ),
    tag = "DOMINO"
)]
pub async fn submit(
    State(state): State<ApiState>,
    Json(request): Json<DominoRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let params = domino::normalize(request)?;
    super::submit(&state.domino, params).await
}

/// Job details: canonical parameters, status, and error or result.
#[utoipa::path(
    get,
    path = "/domino/status",
    params(UidQuery),
    responses((status = 200, description = "Job document, or an empty mapping for an unknown UID")),
    tag = "DOMINO"
)]
pub async fn status(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::status(&state.domino, query.uid).await
}
