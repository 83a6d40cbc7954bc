use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use organizer_core::domain::DenyReason;
use organizer_core::error::{MutationError, StoreError};
use organizer_security::ValidationIssue;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed")]
    Validation(Vec<ValidationIssue>),

    #[error("Forbidden: {0}")]
    Forbidden(DenyReason),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<MutationError> for ApiError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::Validation { issues } => ApiError::Validation(issues),
            MutationError::Unauthorized { reason: DenyReason::NotFound } => {
                ApiError::NotFound("Menu not found".into())
            }
            MutationError::Unauthorized { reason } => ApiError::Forbidden(reason),
            MutationError::RateLimited { reset_at } => ApiError::RateLimited { reset_at },
            e @ MutationError::LimitReached { .. } => ApiError::Conflict(e.to_string()),
            MutationError::Store(StoreError::NotFound) => ApiError::NotFound("Menu not found".into()),
            MutationError::Store(StoreError::Conflict(msg)) => ApiError::Conflict(msg),
            MutationError::Store(e) => ApiError::Store(e.to_string()),
            MutationError::Queue(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        MutationError::Store(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_type, details) = match self {
            ApiError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized", None)
            }
            ApiError::Validation(issues) => {
                tracing::debug!("Validation failed: {} issue(s)", issues.len());
                (StatusCode::BAD_REQUEST, "ValidationError", Some(json!({ "issues": issues })))
            }
            ApiError::Forbidden(reason) => {
                tracing::warn!("Forbidden: {}", reason);
                (StatusCode::FORBIDDEN, "Forbidden", Some(json!({ "reason": reason })))
            }
            ApiError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", None)
            }
            ApiError::Conflict(msg) => {
                tracing::warn!("Conflict: {}", msg);
                (StatusCode::CONFLICT, "Conflict", None)
            }
            ApiError::RateLimited { reset_at } => {
                tracing::warn!("Rate limited until {}", reset_at);
                (StatusCode::TOO_MANY_REQUESTS, "RateLimited", Some(json!({ "resetAt": reset_at })))
            }
            ApiError::Store(msg) => {
                tracing::error!("Store error: {}", msg);
                (StatusCode::BAD_GATEWAY, "StoreError", None)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}
