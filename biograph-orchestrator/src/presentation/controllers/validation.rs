//! Validation routes: joint, module-based and drug-based submissions
//! sharing one status route.

use axum::extract::{Query, State};
use axum::Json;
use uuid::Uuid;

use crate::families::validation::{
    self, DrugValidationRequest, JointValidationRequest, ModuleValidationRequest,
};
use crate::presentation::error::ApiError;
use crate::presentation::models::UidQuery;

use super::ApiState;

/// Validate a module and drug list jointly against permuted baselines.
#[utoipa::path(
    post,
    path = "/validation/joint",
    request_body = JointValidationRequest,
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing or invalid parameter")
    ),
    tag = "Validation"
)]
pub async fn submit_joint(
    State(state): State<ApiState>,
    Json(request): Json<JointValidationRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let params = validation::normalize_joint(request)?;
    super::submit(&state.validation, params).await
}

/// Validate a disease module against permuted baselines.
#[utoipa::path(
    post,
    path = "/validation/module",
    request_body = ModuleValidationRequest,
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing or invalid parameter")
    ),
    tag = "Validation"
)]
pub async fn submit_module(
    State(state): State<ApiState>,
    Json(request): Json<ModuleValidationRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let params = validation::normalize_module(request)?;
    super::submit(&state.validation, params).await
}

/// Validate a scored drug ranking against permuted baselines.
#[utoipa::path(
    post,
    path = "/validation/drug",
    request_body = DrugValidationRequest,
    responses(
        (status = 200, description = "UID for polling the job", body = Uuid),
        (status = 400, description = "Missing or invalid parameter")
    ),
    tag = "Validation"
)]
pub async fn submit_drug(
    State(state): State<ApiState>,
    Json(request): Json<DrugValidationRequest>,
) -> Result<Json<Uuid>, ApiError> {
    let params = validation::normalize_drug(request)?;
    super::submit(&state.validation, params).await
}

/// Job details for any validation variant.
#[utoipa::path(
    get,
    path = "/validation/status",
    params(UidQuery),
    responses((status = 200, description = "Job document, or an empty mapping for an unknown UID")),
    tag = "Validation"
)]
pub async fn status(
    State(state): State<ApiState>,
    Query(query): Query<UidQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::status(&state.validation, query.uid).await
}
