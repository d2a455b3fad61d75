//! HTTP error mapping
//!
//! Synchronous failures map onto status codes here; asynchronous failures
//! never reach this layer - they are recorded on the job and surface through
//! the status route.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::application::service::ServiceError;
use crate::domain::errors::ParameterError;
use crate::infrastructure::job_store::JobStoreError;
use crate::infrastructure::lock::LockError;

/// Client-visible request errors.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid parameter (400)
    BadRequest(String),
    /// Unknown UID or artifact not ready (404)
    NotFound(String),
    /// Storage or lock unavailable (503)
    Unavailable(String),
    /// Anything else (500), detail kept out of the response
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            Self::Unavailable(detail) => (StatusCode::SERVICE_UNAVAILABLE, detail),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

impl From<ParameterError> for ApiError {
    fn from(e: ParameterError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Lock(LockError::Timeout { .. }) => {
                Self::Unavailable("Busy, please retry".to_string())
            }
            ServiceError::Lock(LockError::Storage(_))
            | ServiceError::Store(JobStoreError::Storage(_))
            | ServiceError::Queue(_) => {
                error!(error = %e, "Storage backend unavailable");
                Self::Unavailable("Storage backend unavailable".to_string())
            }
            other => {
                error!(error = %other, "Unexpected service error");
                Self::Internal
            }
        }
    }
}
