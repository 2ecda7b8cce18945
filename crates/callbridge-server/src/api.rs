//! Shared API types for the Callbridge server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use callbridge_core::StoreError;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName(name) => ApiError::BadRequest(format!("invalid file name: {}", name)),
            StoreError::NotFound(name) => ApiError::NotFound(format!("audio not found: {}", name)),
            StoreError::Io(e) => ApiError::InternalServerError(format!("audio read failed: {}", e)),
        }
    }
}
