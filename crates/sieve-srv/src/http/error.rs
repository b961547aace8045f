//! Management API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use sieve_core::CoreError;
use thiserror::Error;
use tracing::error;

use crate::SrvError;

/// Errors returned by management API handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("preset not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl From<SrvError> for ApiError {
    fn from(e: SrvError) -> Self {
        match e {
            SrvError::Policy(CoreError::NotFound { id }) => Self::NotFound(id),
            SrvError::Policy(CoreError::InvalidPreset(msg)) => Self::BadRequest(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Preset '{id}' not found"),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_PRESET", msg),
            Self::Internal(msg) => {
                error!(error = %msg, "Management API failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
