//! Syntax validation in a disposable sandbox.
//!
//! The check runs the profile's parse-only command against the staged source in
//! its own instance, separate from the run phase. A non-zero exit means the code
//! does not parse. Anything that prevents the check from producing an answer is
//! an infrastructure failure and is returned as `Err`, so "your code is broken"
//! and "the sandbox is broken" never look alike.

use crate::errors::ExecutionError;
use crate::languages::LanguageProfile;
use crate::sandbox::{
    SandboxInstance, SandboxPurpose, SandboxRuntime, SourceFile, StageRequest, TerminalState,
};
use std::sync::Arc;
use std::time::Duration;

/// Cap on diagnostic text read back from a failed check.
const DIAGNOSTIC_LIMIT: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub ok: bool,
    pub diagnostic: String,
}

impl ValidationResult {
    pub fn passed() -> Self {
        Self {
            ok: true,
            diagnostic: String::new(),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            ok: false,
            diagnostic: diagnostic.into(),
        }
    }

    /// Convert a failed check into the caller-facing error.
    pub fn into_result(self) -> Result<(), ExecutionError> {
        if self.ok {
            Ok(())
        } else {
            Err(ExecutionError::SyntaxError {
                diagnostic: self.diagnostic,
            })
        }
    }
}

pub struct SyntaxValidator {
    runtime: Arc<dyn SandboxRuntime>,
    timeout: Duration,
    network_disabled: bool,
}

impl SyntaxValidator {
    pub fn new(runtime: Arc<dyn SandboxRuntime>, timeout: Duration) -> Self {
        Self {
            runtime,
            timeout,
            network_disabled: true,
        }
    }

    pub fn with_network_disabled(mut self, disabled: bool) -> Self {
        self.network_disabled = disabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn check(
        &self,
        code: &str,
        profile: &LanguageProfile,
    ) -> Result<ValidationResult, ExecutionError> {
        let source = SourceFile::new(profile.file_name(), code);
        let request = StageRequest {
            purpose: SandboxPurpose::SyntaxCheck,
            image: profile.image.clone(),
            command: profile.syntax_check.render(&source.path_in_sandbox()),
            source,
            limits: None,
            network_disabled: self.network_disabled,
        };

        let mut instance = SandboxInstance::stage(Arc::clone(&self.runtime), &request).await?;
        let outcome = self.run_check(&mut instance).await;
        instance.release().await;
        outcome
    }

    async fn run_check(
        &self,
        instance: &mut SandboxInstance,
    ) -> Result<ValidationResult, ExecutionError> {
        instance.start().await?;

        let exit_code = match instance.await_completion(self.timeout).await? {
            TerminalState::Exited { exit_code } => exit_code,
            TerminalState::DeadlineElapsed => {
                if let Err(e) = instance.force_stop().await {
                    log::warn!("Failed to stop syntax check sandbox {}: {}", instance.id(), e);
                }
                return Err(ExecutionError::infra(format!(
                    "syntax check did not finish within {:?}",
                    self.timeout
                )));
            }
        };

        if exit_code == 0 {
            return Ok(ValidationResult::passed());
        }

        let output = instance.collect_output(DIAGNOSTIC_LIMIT).await?;
        Ok(ValidationResult::failed(diagnostic_from(
            &output.stderr,
            &output.stdout,
            exit_code,
        )))
    }
}

fn diagnostic_from(stderr: &str, stdout: &str, exit_code: i64) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    format!("syntax checker exited with status {}", exit_code)
}
