//! Request and result types shared by the engine and its adapters.

use crate::errors::{ErrorKind, ExecutionError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One-shot execution input. Built once per call by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub timeout: Duration,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ExecutionError> for ErrorDetail {
    fn from(err: &ExecutionError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Caller-facing outcome: `stdout` on success, otherwise `error`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ExecutionResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            error: None,
        }
    }

    pub fn failure(err: &ExecutionError) -> Self {
        Self {
            stdout: String::new(),
            error: Some(err.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|detail| detail.kind)
    }
}
