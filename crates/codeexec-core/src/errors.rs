//! Error types for the execution engine
//!
//! Failures are split by the layer that produces them. `ExecutionError` is the
//! caller-facing taxonomy: every variant maps to exactly one [`ErrorKind`] and
//! renders a non-empty message. `SandboxError` describes what went wrong while
//! talking to the container runtime and always surfaces to callers as
//! [`ErrorKind::InfraError`], so a broken sandbox is never reported as broken
//! user code. `ConfigError` covers loading and validating service configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Classification of a failed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedLanguage,
    SyntaxError,
    Timeout,
    MemoryExceeded,
    RuntimeError,
    InfraError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedLanguage => "unsupported_language",
            ErrorKind::SyntaxError => "syntax_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MemoryExceeded => "memory_exceeded",
            ErrorKind::RuntimeError => "runtime_error",
            ErrorKind::InfraError => "infra_error",
        }
    }

    /// True when the submitted code, not the service, caused the failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::SyntaxError
                | ErrorKind::Timeout
                | ErrorKind::MemoryExceeded
                | ErrorKind::RuntimeError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("syntax check failed: {diagnostic}")]
    SyntaxError { diagnostic: String },
    #[error("container execution timed out after {limit:?}")]
    Timeout { limit: Duration, elapsed: Duration },
    #[error("container exceeded memory limit{}", memory_suffix(.limit_bytes))]
    MemoryExceeded { limit_bytes: Option<i64> },
    #[error("{}", runtime_message(.exit_code, .stderr))]
    RuntimeError {
        exit_code: Option<i64>,
        stderr: String,
    },
    #[error("sandbox infrastructure error: {0}")]
    Infra(String),
}

fn memory_suffix(limit_bytes: &Option<i64>) -> String {
    match limit_bytes {
        Some(bytes) => format!(" of {} bytes", bytes),
        None => String::new(),
    }
}

fn runtime_message(exit_code: &Option<i64>, stderr: &str) -> String {
    match exit_code {
        Some(code) if stderr.is_empty() => {
            format!("container exited with non-zero status code: {}", code)
        }
        Some(code) => format!(
            "container exited with non-zero status code: {}\n{}",
            code, stderr
        ),
        None => format!("execution error: {}", stderr),
    }
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::UnsupportedLanguage(_) => ErrorKind::UnsupportedLanguage,
            ExecutionError::SyntaxError { .. } => ErrorKind::SyntaxError,
            ExecutionError::Timeout { .. } => ErrorKind::Timeout,
            ExecutionError::MemoryExceeded { .. } => ErrorKind::MemoryExceeded,
            ExecutionError::RuntimeError { .. } => ErrorKind::RuntimeError,
            ExecutionError::Infra(_) => ErrorKind::InfraError,
        }
    }

    pub fn infra(msg: impl Into<String>) -> Self {
        ExecutionError::Infra(msg.into())
    }
}

/// Failures of the sandbox runtime client itself.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("container runtime error: {0}")]
    Runtime(#[from] bollard::errors::Error),
    #[error("I/O error while staging sandbox: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not stage source file: {0}")]
    Staging(String),
    #[error("wait stream for container {0} ended before the container exited")]
    WaitInterrupted(String),
    #[error("container {0} reported no state")]
    MissingState(String),
    #[error("{0}")]
    Unavailable(String),
}

impl From<SandboxError> for ExecutionError {
    fn from(err: SandboxError) -> Self {
        ExecutionError::Infra(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
