//! API error handling with the hub's structured failure shape.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::sharedfs::FsError;

/// API error kinds; behaviors, not type names.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Categorize a service-layer error by its message. Repositories and the
    /// hub service phrase their errors consistently: "... not found ..." for
    /// missing references, "invalid ..." / "... required" for bad input,
    /// anything else is a store or internal failure.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();

        if lower.contains("not found") {
            ApiError::NotFound(msg)
        } else if lower.contains("invalid")
            || lower.contains("required")
            || lower.contains("not joined")
        {
            ApiError::Validation(msg)
        } else {
            ApiError::Internal(format!("{:#}", err))
        }
    }
}

/// Failure body: `{ "success": false, "error": "<msg>" }`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        match &self {
            ApiError::Internal(msg) => {
                error!(status = %status, "API error: {}", msg);
            }
            _ => {
                tracing::debug!(status = %status, "client error: {}", message);
            }
        }

        let body = ErrorBody {
            success: false,
            error: message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::from_anyhow(err)
    }
}

impl From<FsError> for ApiError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::PathEscape | FsError::RootProtected => ApiError::Validation(err.to_string()),
            FsError::NotFound(_) => ApiError::NotFound(err.to_string()),
            FsError::NotAFile(_) | FsError::NotADirectory(_) => {
                ApiError::Validation(err.to_string())
            }
            FsError::Io(e) => ApiError::Internal(format!("shared fs: {}", e)),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
