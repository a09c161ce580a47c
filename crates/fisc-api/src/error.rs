//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Engine errors keep their machine-readable code (`ALREADY_SUBMITTED`,
//! `NOT_CONFIGURED`, ...) and are mapped to an HTTP status here. Messages
//! of 500-class errors are logged and never returned to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fisc_client::ClientError;
use fisc_engine::{EngineError, RegistryError};
use fisc_payload::PayloadError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "NOT_READY").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),

    /// An engine operation failed. Status depends on the error kind.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    pub(crate) fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Engine(err) => (engine_status(err), err.code()),
        }
    }
}

fn engine_status(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound { .. }
        | EngineError::ReceiptNotFound { .. }
        | EngineError::Registry(RegistryError::UnknownConfig { .. }) => StatusCode::NOT_FOUND,

        EngineError::AlreadySubmitted { .. }
        | EngineError::AlreadyFinalized { .. }
        | EngineError::NotReady { .. }
        | EngineError::Lifecycle(_)
        | EngineError::ReceiptConflict(_)
        | EngineError::Registry(RegistryError::AlreadyActive { .. }) => StatusCode::CONFLICT,

        EngineError::Validation(_)
        | EngineError::Tax(_)
        | EngineError::Registry(RegistryError::NotConfigured { .. })
        | EngineError::Registry(RegistryError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,

        EngineError::Payload(PayloadError::Consistency { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::Payload(_) => StatusCode::UNPROCESSABLE_ENTITY,

        EngineError::InvalidCredentials { .. }
        | EngineError::Client(ClientError::InvalidCredentials { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineError::Client(_) => StatusCode::BAD_GATEWAY,

        EngineError::Allocation(_) | EngineError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            match status {
                StatusCode::BAD_GATEWAY => "An upstream service error occurred".to_string(),
                _ => "An internal error occurred".to_string(),
            }
        } else {
            self.to_string()
        };

        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<fisc_core::ValidationError> for AppError {
    fn from(err: fisc_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
