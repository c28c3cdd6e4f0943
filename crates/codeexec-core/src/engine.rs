//! The execution pipeline.
//!
//! `resolve -> validate -> stage -> start -> wait (raced against the deadline)
//! -> inspect -> collect -> classify`, with every staged instance released on
//! every path. Each call is independent: nothing about one execution is
//! visible to another.

use crate::errors::ExecutionError;
use crate::languages::{LanguageProfile, LanguageRegistry};
use crate::normalizer::{self, ClassificationPolicy};
use crate::sandbox::{
    CapturedOutput, ResourceLimits, SandboxInstance, SandboxPurpose, SandboxRuntime, SourceFile,
    StageRequest, TerminalState,
};
use crate::types::{ExecutionRequest, ExecutionResult};
use crate::validator::{SyntaxValidator, ValidationResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SYNTAX_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub limits: ResourceLimits,
    pub syntax_check_timeout: Duration,
    /// Per-stream cap on captured stdout and stderr.
    pub max_output_bytes: usize,
    pub fail_on_stderr: bool,
    pub network_disabled: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            limits: ResourceLimits::default(),
            syntax_check_timeout: DEFAULT_SYNTAX_CHECK_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            fail_on_stderr: true,
            network_disabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Validating,
    Staging,
    Running,
    Collecting,
}

pub struct ExecutionEngine {
    registry: Arc<LanguageRegistry>,
    runtime: Arc<dyn SandboxRuntime>,
    validator: SyntaxValidator,
    settings: EngineSettings,
}

impl ExecutionEngine {
    pub fn new(
        registry: Arc<LanguageRegistry>,
        runtime: Arc<dyn SandboxRuntime>,
        settings: EngineSettings,
    ) -> Self {
        let validator = SyntaxValidator::new(Arc::clone(&runtime), settings.syntax_check_timeout)
            .with_network_disabled(settings.network_disabled);
        Self {
            registry,
            runtime,
            validator,
            settings,
        }
    }

    /// Engine with the built-in languages and default limits.
    pub fn with_defaults(runtime: Arc<dyn SandboxRuntime>) -> Self {
        Self::new(
            Arc::new(LanguageRegistry::with_defaults()),
            runtime,
            EngineSettings::default(),
        )
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn runtime(&self) -> &Arc<dyn SandboxRuntime> {
        &self.runtime
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run `code` and return its trimmed stdout, or the classified failure.
    pub async fn execute_code(
        &self,
        code: &str,
        language: &str,
        timeout: Duration,
    ) -> Result<String, ExecutionError> {
        self.execute_request(&ExecutionRequest::new(code, language, timeout))
            .await
    }

    /// Like [`execute_code`](Self::execute_code) but folded into one payload.
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        normalizer::normalize(self.execute_request(request).await)
    }

    /// Only the syntax check, for callers that want to lint without running.
    pub async fn check_syntax(
        &self,
        code: &str,
        language: &str,
    ) -> Result<ValidationResult, ExecutionError> {
        let profile = self.registry.resolve(language)?;
        self.validator.check(code, profile).await
    }

    async fn execute_request(&self, request: &ExecutionRequest) -> Result<String, ExecutionError> {
        let execution_id = Uuid::new_v4();
        let started = Instant::now();
        let outcome = self.pipeline(execution_id, request).await;
        match &outcome {
            Ok(stdout) => log::info!(
                "Execution {} [{}] succeeded in {:?} ({} bytes of output)",
                execution_id,
                request.language,
                started.elapsed(),
                stdout.len()
            ),
            Err(e) if e.kind().is_user_error() => log::info!(
                "Execution {} [{}] finished with {} in {:?}",
                execution_id,
                request.language,
                e.kind(),
                started.elapsed()
            ),
            Err(e) => log::error!(
                "Execution {} [{}] failed: {}",
                execution_id,
                request.language,
                e
            ),
        }
        outcome
    }

    async fn pipeline(
        &self,
        execution_id: Uuid,
        request: &ExecutionRequest,
    ) -> Result<String, ExecutionError> {
        let profile = self.registry.resolve(&request.language)?;

        log::debug!("Execution {}: {:?} as {}", execution_id, Phase::Validating, profile.id);
        self.validator
            .check(&request.code, profile)
            .await?
            .into_result()?;

        log::debug!("Execution {}: {:?} {}", execution_id, Phase::Staging, profile.image);
        let stage_request = self.run_stage_request(&request.code, profile);
        let mut instance = SandboxInstance::stage(Arc::clone(&self.runtime), &stage_request).await?;
        let outcome = self
            .run_staged(execution_id, &mut instance, request.timeout)
            .await;
        instance.release().await;
        outcome
    }

    fn run_stage_request(&self, code: &str, profile: &LanguageProfile) -> StageRequest {
        let source = SourceFile::new(profile.file_name(), code);
        StageRequest {
            purpose: SandboxPurpose::Run,
            image: profile.image.clone(),
            command: profile.run.render(&source.path_in_sandbox()),
            source,
            limits: Some(self.settings.limits),
            network_disabled: self.settings.network_disabled,
        }
    }

    async fn run_staged(
        &self,
        execution_id: Uuid,
        instance: &mut SandboxInstance,
        timeout: Duration,
    ) -> Result<String, ExecutionError> {
        log::debug!("Execution {}: {:?} in {}", execution_id, Phase::Running, instance.id());
        instance.start().await?;
        let started = Instant::now();

        let exit_code = match instance.await_completion(timeout).await? {
            TerminalState::Exited { exit_code } => exit_code,
            TerminalState::DeadlineElapsed => {
                let elapsed = started.elapsed();
                if let Err(e) = instance.force_stop().await {
                    log::warn!("Failed to kill timed out sandbox {}: {}", instance.id(), e);
                }
                return Err(ExecutionError::Timeout {
                    limit: timeout,
                    elapsed,
                });
            }
        };

        log::debug!(
            "Execution {}: {:?} after exit {}",
            execution_id,
            Phase::Collecting,
            exit_code
        );
        let inspection = instance.inspect().await?;
        let output = if inspection.oom_killed {
            CapturedOutput::default()
        } else {
            instance.collect_output(self.settings.max_output_bytes).await?
        };
        if output.truncated {
            log::warn!(
                "Execution {}: output truncated at {} bytes per stream",
                execution_id,
                self.settings.max_output_bytes
            );
        }

        normalizer::classify(exit_code, &inspection, &output, &self.policy())
    }

    fn policy(&self) -> ClassificationPolicy {
        ClassificationPolicy {
            fail_on_stderr: self.settings.fail_on_stderr,
            memory_limit_bytes: Some(self.settings.limits.memory_bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::sandbox::{FakeRun, FakeSandbox};

    fn engine(fake: &Arc<FakeSandbox>) -> ExecutionEngine {
        ExecutionEngine::with_defaults(fake.clone())
    }

    #[tokio::test]
    async fn test_hello_world_python() {
        let fake = Arc::new(FakeSandbox::passing_check(FakeRun::success(
            "Hello, World!\n",
        )));
        let stdout = engine(&fake)
            .execute_code("print('Hello, World!')", "python", DEFAULT_TIMEOUT)
            .await
            .unwrap();

        assert_eq!(stdout, "Hello, World!");
        assert_eq!(fake.stage_count(), 2);
        assert_eq!(fake.destroy_count(), 2);
        assert_eq!(fake.live_instances(), 0);

        let staged = fake.staged();
        assert_eq!(staged[0].purpose, SandboxPurpose::SyntaxCheck);
        assert_eq!(staged[1].purpose, SandboxPurpose::Run);
        assert_eq!(staged[1].limits, Some(ResourceLimits::default()));
        assert_eq!(
            staged[1].command,
            vec!["python".to_string(), "/app/code.py".to_string()]
        );
    }

    #[tokio::test]
    async fn test_javascript_alias_runs_node() {
        let fake = Arc::new(FakeSandbox::passing_check(FakeRun::success("Hi\n")));
        let result = engine(&fake)
            .execute(&ExecutionRequest::new(
                "console.log('Hi')",
                "JS",
                DEFAULT_TIMEOUT,
            ))
            .await;

        assert!(result.is_success());
        assert_eq!(result.stdout, "Hi");
        let staged = fake.staged();
        assert_eq!(staged[1].image, "node:20-alpine");
        assert_eq!(staged[1].source.file_name, "code.js");
    }

    #[tokio::test]
    async fn test_syntax_error_never_runs() {
        let fake = Arc::new(FakeSandbox::by_purpose(
            FakeRun::exit(1, "SyntaxError: unterminated string literal (detected at line 1)"),
            FakeRun::success("should not run"),
        ));
        let err = engine(&fake)
            .execute_code("print('Hello, World!", "python", DEFAULT_TIMEOUT)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert!(err.to_string().contains("unterminated string literal"));
        assert_eq!(fake.stage_count(), 1);
        assert_eq!(fake.destroy_count(), 1);
        assert_eq!(fake.start_count(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_language_stages_nothing() {
        let fake = Arc::new(FakeSandbox::always(FakeRun::default()));
        let result = engine(&fake)
            .execute(&ExecutionRequest::new("puts 1", "ruby", DEFAULT_TIMEOUT))
            .await;

        assert_eq!(result.error_kind(), Some(ErrorKind::UnsupportedLanguage));
        assert_eq!(
            result.error.unwrap().message,
            "unsupported language: ruby"
        );
        assert_eq!(fake.stage_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_kills_and_destroys() {
        let fake = Arc::new(FakeSandbox::passing_check(
            FakeRun::success("never").lasting(Duration::from_secs(30)),
        ));
        let started = Instant::now();
        let err = engine(&fake)
            .execute_code("while True: pass", "python", Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            ExecutionError::Timeout { limit, elapsed } => {
                assert_eq!(limit, Duration::from_millis(50));
                assert!(elapsed >= limit);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(fake.kill_count(), 1);
        assert_eq!(fake.destroy_count(), 2);
        assert_eq!(fake.live_instances(), 0);
    }

    #[tokio::test]
    async fn test_run_finishing_inside_deadline_succeeds() {
        let fake = Arc::new(FakeSandbox::passing_check(
            FakeRun::success("done\n").lasting(Duration::from_millis(20)),
        ));
        let stdout = engine(&fake)
            .execute_code("import time; time.sleep(0.02)", "python", Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(stdout, "done");
        assert_eq!(fake.kill_count(), 0);
    }

    #[tokio::test]
    async fn test_oom_is_memory_exceeded() {
        let fake = Arc::new(FakeSandbox::passing_check(FakeRun::oom()));
        let err = engine(&fake)
            .execute_code("x = ' ' * 10**9", "python", DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MemoryExceeded);
        assert!(err.to_string().starts_with("container exceeded memory limit"));
        assert_eq!(fake.destroy_count(), 2);
    }

    #[tokio::test]
    async fn test_kill_signal_without_oom_flag_is_runtime_error() {
        let fake = Arc::new(FakeSandbox::passing_check(FakeRun::exit(137, "")));
        let err = engine(&fake)
            .execute_code("import os; os.kill(os.getpid(), 9)", "python", DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::RuntimeError {
                exit_code: Some(137),
                stderr: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_runtime_error_keeps_stderr_out_of_stdout() {
        let fake = Arc::new(FakeSandbox::passing_check(
            FakeRun::exit(1, "ZeroDivisionError: division by zero\n"),
        ));
        let result = engine(&fake)
            .execute(&ExecutionRequest::new("1/0", "python", DEFAULT_TIMEOUT))
            .await;

        assert!(result.stdout.is_empty());
        let detail = result.error.unwrap();
        assert_eq!(detail.kind, ErrorKind::RuntimeError);
        assert!(detail.message.contains("status code: 1"));
        assert!(detail.message.contains("division by zero"));
    }

    #[tokio::test]
    async fn test_stderr_on_clean_exit() {
        let run = FakeRun::success("42\n").with_stderr("warning: deprecated\n");

        let strict = Arc::new(FakeSandbox::passing_check(run.clone()));
        let err = engine(&strict)
            .execute_code("print(42)", "python", DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "execution error: warning: deprecated");

        let lenient = Arc::new(FakeSandbox::passing_check(run));
        let settings = EngineSettings {
            fail_on_stderr: false,
            ..Default::default()
        };
        let engine = ExecutionEngine::new(
            Arc::new(LanguageRegistry::with_defaults()),
            lenient.clone(),
            settings,
        );
        let stdout = engine
            .execute_code("print(42)", "python", DEFAULT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(stdout, "42");
    }

    #[tokio::test]
    async fn test_infra_failure_is_distinct_and_cleaned_up() {
        let fake = Arc::new(FakeSandbox::passing_check(FakeRun::inspect_failure(
            "daemon went away",
        )));
        let err = engine(&fake)
            .execute_code("print(1)", "python", DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InfraError);
        assert!(err.to_string().contains("daemon went away"));
        assert_eq!(fake.destroy_count(), 2);
    }

    #[tokio::test]
    async fn test_stage_failure_is_infra() {
        let fake = Arc::new(FakeSandbox::passing_check(FakeRun::stage_failure(
            "no such image",
        )));
        let err = engine(&fake)
            .execute_code("print(1)", "python", DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InfraError);
        // The check instance was created and destroyed; the run never existed.
        assert_eq!(fake.destroy_count(), 1);
        assert_eq!(fake.live_instances(), 0);
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let fake = Arc::new(FakeSandbox::passing_check(FakeRun::success("x".repeat(64))));
        let settings = EngineSettings {
            max_output_bytes: 16,
            ..Default::default()
        };
        let engine = ExecutionEngine::new(
            Arc::new(LanguageRegistry::with_defaults()),
            fake.clone(),
            settings,
        );
        let stdout = engine
            .execute_code("print('x' * 64)", "python", DEFAULT_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(stdout.len(), 16);
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_isolated() {
        let fake = Arc::new(FakeSandbox::new(|request| match request.purpose {
            SandboxPurpose::SyntaxCheck => FakeRun::default(),
            SandboxPurpose::Run => FakeRun::success(request.source.contents.clone())
                .lasting(Duration::from_millis(100)),
        }));
        let engine = Arc::new(engine(&fake));

        let started = Instant::now();
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine
                        .execute_code(&format!("out-{}", i), "python", DEFAULT_TIMEOUT)
                        .await
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap().unwrap(), format!("out-{}", i));
        }
        assert!(started.elapsed() < Duration::from_millis(800));
        assert_eq!(fake.stage_count(), 16);
        assert_eq!(fake.live_instances(), 0);
    }

    #[tokio::test]
    async fn test_check_syntax_only() {
        let fake = Arc::new(FakeSandbox::always(FakeRun::default()));
        let result = engine(&fake).check_syntax("print(1)", "py").await.unwrap();
        assert!(result.ok);
        assert_eq!(fake.stage_count(), 1);

        let err = engine(&fake).check_syntax("x", "cobol").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedLanguage);
    }
}
