//! Error types for the HTTP front-end.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use codeexec_core::ExecutionError;
use serde_json::json;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned to HTTP clients instead of an execution result.
///
/// Failures caused by the submitted program are not `ApiError`s; they are
/// answered with 200 and an error body. Only request problems, auth, load
/// shedding and sandbox infrastructure failures end up here.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("invalid request body")]
    InvalidBody,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("language not specified")]
    MissingLanguage,

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("code not provided")]
    MissingCode,

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("unauthorized")]
    Unauthorized,

    /// Key checking is on but the service has no key to compare against.
    #[error("API key not set")]
    ApiKeyNotSet,

    #[error("too many concurrent executions, retry later")]
    Busy,

    #[error("{0}")]
    Execution(ExecutionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::MethodNotAllowed => 405,
            ApiError::InvalidBody
            | ApiError::MissingLanguage
            | ApiError::UnsupportedLanguage(_)
            | ApiError::MissingCode
            | ApiError::InvalidTimeout(_) => 400,
            ApiError::PayloadTooLarge => 413,
            ApiError::Unauthorized => 401,
            ApiError::Busy => 503,
            ApiError::Execution(ExecutionError::UnsupportedLanguage(_)) => 400,
            ApiError::Execution(_)
            | ApiError::ApiKeyNotSet
            | ApiError::Config(_)
            | ApiError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::InvalidBody | ApiError::PayloadTooLarge => "invalid_request",
            ApiError::MissingLanguage | ApiError::MissingCode => "missing_field",
            ApiError::UnsupportedLanguage(_) => "unsupported_language",
            ApiError::InvalidTimeout(_) => "invalid_timeout",
            ApiError::Unauthorized => "unauthorized",
            ApiError::ApiKeyNotSet => "auth_misconfigured",
            ApiError::Busy => "busy",
            ApiError::Execution(e) => e.kind().as_str(),
            ApiError::Config(_) => "config_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<ExecutionError> for ApiError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::UnsupportedLanguage(language) => ApiError::UnsupportedLanguage(language),
            other => ApiError::Execution(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("Request failed with {}: {}", status, self);
        }
        let body = json!({
            "error": self.to_string(),
            "kind": self.error_type(),
        });
        (status, Json(body)).into_response()
    }
}
