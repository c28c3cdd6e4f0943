//! Building blocks of the `codeexec` command-line tool.
//!
//! The binary talks to an [`ExecutionClient`]: either the engine in-process
//! ([`LocalClient`], Docker on this machine) or a running `codeexec-server`
//! ([`RemoteClient`]). Both report results the same way, so output formatting
//! and exit codes do not depend on where the code ran.

pub mod local_client;
pub mod remote_client;

pub use local_client::LocalClient;
pub use remote_client::RemoteClient;

use anyhow::Result;
use async_trait::async_trait;
use codeexec_core::{ErrorKind, ExecutionResult};
use codeexec_server::LanguageInfo;
use std::time::Duration;

/// Exit status when the submitted code failed (syntax, runtime, timeout, memory).
pub const EXIT_USER_ERROR: i32 = 1;
pub const EXIT_UNSUPPORTED_LANGUAGE: i32 = 2;
/// Exit status when the sandbox or the server could not do its job.
pub const EXIT_INFRA_ERROR: i32 = 3;

#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// `None` uses the executor's configured default timeout.
    async fn execute(
        &self,
        code: &str,
        language: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult>;

    async fn languages(&self) -> Result<Vec<LanguageInfo>>;
}

pub fn exit_code(result: &ExecutionResult) -> i32 {
    match result.error_kind() {
        None => 0,
        Some(ErrorKind::UnsupportedLanguage) => EXIT_UNSUPPORTED_LANGUAGE,
        Some(ErrorKind::InfraError) => EXIT_INFRA_ERROR,
        Some(_) => EXIT_USER_ERROR,
    }
}

/// `error[kind]: message`, the line printed to stderr for a failed run.
pub fn render_error(result: &ExecutionResult) -> Option<String> {
    result
        .error
        .as_ref()
        .map(|detail| format!("error[{}]: {}", detail.kind, detail.message))
}
