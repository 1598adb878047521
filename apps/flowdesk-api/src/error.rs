use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::store::StoreError;

// ---------------------------------------------------------------------------
// Domain errors (gateway + delivery)
// ---------------------------------------------------------------------------

/// Failure taxonomy shared by the gateway and the delivery engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("authentication rejected")]
    AuthRejected,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing, or not visible to the requester. Callers cannot tell which.
    #[error("not found")]
    NotFound,

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl ChatError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Stable wire code and sanitized message for the acting connection.
    pub fn to_error_code(&self) -> (&'static str, String) {
        match self {
            ChatError::AuthRejected => ("AUTH_REJECTED", "Invalid or expired token".to_string()),
            ChatError::InvalidRequest(msg) => ("INVALID_REQUEST", msg.clone()),
            ChatError::NotFound => ("NOT_FOUND", "Not found".to_string()),
            ChatError::Persistence(_) => (
                "PERSISTENCE_FAILURE",
                "The message could not be saved".to_string(),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// REST errors
// ---------------------------------------------------------------------------

/// Structured API error returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            details: Some(details),
            ..Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation failed")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(?err, "storage error");
        Self::internal("An internal error occurred")
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::AuthRejected => Self::unauthorized("Invalid or expired token"),
            ChatError::InvalidRequest(msg) => Self::bad_request(msg),
            ChatError::NotFound => Self::not_found("Not found"),
            ChatError::Persistence(e) => e.into(),
        }
    }
}
