//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use relay_core::relay::registry::SubscribeError;
use relay_types::error::{RelayError, RepositoryError};

use crate::http::response::Envelope;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Relay cycle could not start.
    Relay(RelayError),
    /// Transcript store failure.
    Repository(RepositoryError),
    /// The thread's stream cannot be attached to.
    Subscribe(SubscribeError),
    /// Missing or malformed user identity.
    Unauthorized(String),
    /// Validation error.
    Validation(String),
    /// Resource does not exist (or is not visible to the caller).
    NotFound(String),
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        AppError::Relay(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Repository(e)
    }
}

impl From<SubscribeError> for AppError {
    fn from(e: SubscribeError) -> Self {
        AppError::Subscribe(e)
    }
}

impl AppError {
    /// Status code, machine-readable code and message.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Relay(RelayError::InvalidRequest(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Relay(RelayError::Forbidden)
            | AppError::Repository(RepositoryError::Forbidden)
            | AppError::Subscribe(SubscribeError::Forbidden) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Thread belongs to another user".to_string(),
            ),
            AppError::Relay(RelayError::Persistence(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_ERROR",
                e.to_string(),
            ),
            AppError::Relay(RelayError::Provider(e)) => {
                (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", e.to_string())
            }
            AppError::Repository(RepositoryError::NotFound) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", "Not found".to_string())
            }
            AppError::Repository(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_ERROR",
                e.to_string(),
            ),
            AppError::Subscribe(e @ SubscribeError::Busy) => {
                (StatusCode::CONFLICT, "SUBSCRIBER_CONFLICT", e.to_string())
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(%code, %message, "request failed");
        }

        let body = Envelope::failure(code, message);
        (status, axum::Json(body)).into_response()
    }
}
