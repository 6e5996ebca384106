//! Error types for saarthi-api
//!
//! `ServiceError` is what the services return; `ApiError` maps it onto HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::charts::RenderError;
use crate::services::publisher::PublishError;
use crate::services::table::TableError;

/// Failure category, independent of transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Storage,
    Publish,
    Parse,
    Internal,
}

/// Service-layer error
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No registry entry for the id
    #[error("File ID not found: {0}")]
    SessionNotFound(String),

    /// Registry entry exists but its data file is gone
    #[error("Source file missing for session {0}")]
    SourceFileMissing(String),

    /// Data file has no rows
    #[error("The file is empty")]
    EmptyFile,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to store upload: {0}")]
    StorageWrite(String),

    #[error("Session registry error: {0}")]
    Registry(String),

    #[error("Failed to parse file: {0}")]
    Parse(#[from] TableError),

    #[error("Failed to render chart: {0}")]
    Render(#[from] RenderError),

    #[error("Failed to publish asset: {0}")]
    Publish(#[from] PublishError),

    #[error("Failed to delete session: {0}")]
    Teardown(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::SessionNotFound(_) | ServiceError::SourceFileMissing(_) => {
                ErrorKind::NotFound
            }
            ServiceError::EmptyFile | ServiceError::InvalidInput(_) => ErrorKind::Validation,
            ServiceError::StorageWrite(_)
            | ServiceError::Registry(_)
            | ServiceError::Teardown(_) => ErrorKind::Storage,
            ServiceError::Publish(_) => ErrorKind::Publish,
            ServiceError::Parse(_) => ErrorKind::Parse,
            ServiceError::Render(_) | ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Internal(format!("Blocking task failed: {}", err))
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Service(ref err) => {
                let (status, code) = match err.kind() {
                    ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                    ErrorKind::Storage => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
                    ErrorKind::Publish => (StatusCode::INTERNAL_SERVER_ERROR, "PUBLISH_ERROR"),
                    ErrorKind::Parse => (StatusCode::INTERNAL_SERVER_ERROR, "PARSE_ERROR"),
                    ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
                };
                (status, code, err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::SessionNotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::SourceFileMissing("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::EmptyFile, StatusCode::BAD_REQUEST),
            (ServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::StorageWrite("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Teardown("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn empty_file_message_is_stable() {
        assert_eq!(ServiceError::EmptyFile.to_string(), "The file is empty");
        assert_eq!(ServiceError::EmptyFile.kind(), ErrorKind::Validation);
    }
}
