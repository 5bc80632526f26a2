//! Request-boundary error taxonomy and HTTP mapping.
//!
//! Every handler error is converted to a JSON envelope here; the serving
//! process never crashes on a bad request. Ingestion-task errors are the
//! one deliberate exception — they stay `anyhow` and propagate to the
//! queue so the task is redelivered.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed identifiers, headers, or version strings.
    #[error("{0}")]
    Validation(String),

    /// Unknown project/variant/release/manifest.
    #[error("{0}")]
    NotFound(String),

    /// Release API or asset fetch failure, unexpected response shape.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Missing/invalid webhook signature or failed credential issuance.
    #[error("{0}")]
    Auth(String),

    /// Anything unexpected; message limited to the caught error text.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            status: status.as_u16(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
