//! Maps raw sandbox signals into the caller-facing outcome. No I/O.

use crate::errors::ExecutionError;
use crate::sandbox::{CapturedOutput, ExitInspection};
use crate::types::ExecutionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationPolicy {
    /// Treat any stderr output as a failure even when the process exits 0.
    pub fail_on_stderr: bool,
    /// Reported in the memory-exceeded message.
    pub memory_limit_bytes: Option<i64>,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            fail_on_stderr: true,
            memory_limit_bytes: None,
        }
    }
}

/// Classify a run that completed before its deadline.
///
/// Only the runtime's OOM flag yields `MemoryExceeded`. A process killed for
/// memory without that flag (exit 137, or an interpreter's own MemoryError)
/// is reported as a runtime error with its exit code.
pub fn classify(
    waited_exit_code: i64,
    inspection: &ExitInspection,
    output: &CapturedOutput,
    policy: &ClassificationPolicy,
) -> Result<String, ExecutionError> {
    if inspection.oom_killed {
        return Err(ExecutionError::MemoryExceeded {
            limit_bytes: policy.memory_limit_bytes,
        });
    }

    let exit_code = inspection.exit_code.unwrap_or(waited_exit_code);
    let stderr = output.stderr.trim();
    if exit_code != 0 {
        return Err(ExecutionError::RuntimeError {
            exit_code: Some(exit_code),
            stderr: stderr.to_string(),
        });
    }

    if policy.fail_on_stderr && !stderr.is_empty() {
        return Err(ExecutionError::RuntimeError {
            exit_code: None,
            stderr: stderr.to_string(),
        });
    }

    Ok(output.stdout.trim().to_string())
}

/// Collapse an engine outcome into exactly one caller-facing payload.
pub fn normalize(outcome: Result<String, ExecutionError>) -> ExecutionResult {
    match outcome {
        Ok(stdout) => ExecutionResult::success(stdout),
        Err(err) => ExecutionResult::failure(&err),
    }
}
