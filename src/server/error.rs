//! API error type and HTTP response mapping.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::kit::KitError;
use crate::sync::SyncError;

/// Errors surfaced by the HTTP endpoints. The variants mirror the error
/// taxonomy of the original API: input validation → 400, authorization
/// → 401, unknown slug → 404, upstream subscribe failures → 422,
/// everything else → 500.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Remote subscribe call failed; carries the upstream message.
    #[error("{0}")]
    Unprocessable(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::SlugNotFound(slug) => {
                ApiError::NotFound(format!("Post \"{slug}\" not found"))
            }
            SyncError::Kit(err) => ApiError::Internal(err.into()),
        }
    }
}

impl ApiError {
    /// Subscribe-flow remote failures map to 422 with the upstream message.
    pub fn from_subscribe(err: KitError) -> Self {
        ApiError::Unprocessable(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Unauthorized" }),
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "message": message }),
            ),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": message }),
            ),
            Self::Unprocessable(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "success": false, "error": message }),
            ),
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": err.to_string() }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
