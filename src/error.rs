//! Errors returned by the post service and rendered by the HTTP layer.
//!
//! Every failure response is a JSON object with either a `message` field
//! (not-found, conflict, bad request) or an `error` field (internal errors,
//! whose cause is logged but not exposed).

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn user_not_found() -> Self {
        Self::NotFound("User not found".to_string())
    }

    #[must_use]
    pub fn post_not_found() -> Self {
        Self::NotFound("Post not found".to_string())
    }

    /// Report any failure as a conflict, as the create endpoint does.
    #[must_use]
    pub fn into_conflict(self) -> Self {
        match self {
            Self::Internal(e) => Self::Conflict(format!("{e:#}")),
            Self::BadRequest(msg) => Self::Conflict(msg),
            other => other,
        }
    }

    /// Report internal failures as not-found, as the read and like endpoints do.
    #[must_use]
    pub fn into_not_found(self) -> Self {
        match self {
            Self::Internal(e) => Self::NotFound(format!("{e:#}")),
            other => other,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Internal(e) => {
                tracing::error!("Request failed: {e:#}");
                json!({ "error": "Internal server error" })
            }
            other => json!({ "message": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
