use crate::ExecutionClient;
use anyhow::Result;
use async_trait::async_trait;
use codeexec_core::{
    DockerSandbox, ExecutionEngine, ExecutionRequest, ExecutionResult, SandboxRuntime,
    ServiceConfig, ValidationResult,
};
use codeexec_server::LanguageInfo;
use std::sync::Arc;
use std::time::Duration;

/// Runs the engine in-process against a sandbox runtime on this machine.
pub struct LocalClient {
    engine: ExecutionEngine,
    default_timeout: Duration,
}

impl LocalClient {
    pub fn new(config: &ServiceConfig, runtime: Arc<dyn SandboxRuntime>) -> Self {
        Self {
            engine: ExecutionEngine::new(
                Arc::new(config.language_registry()),
                runtime,
                config.execution.engine_settings(),
            ),
            default_timeout: config.execution.default_timeout(),
        }
    }

    /// Connect to the local Docker daemon.
    pub fn docker(config: &ServiceConfig) -> Result<Self> {
        let runtime = DockerSandbox::connect()?;
        Ok(Self::new(config, Arc::new(runtime)))
    }

    pub async fn check(&self, code: &str, language: &str) -> ExecutionResult {
        match self
            .engine
            .check_syntax(code, language)
            .await
            .and_then(ValidationResult::into_result)
        {
            Ok(()) => ExecutionResult::success(""),
            Err(e) => ExecutionResult::failure(&e),
        }
    }
}

#[async_trait]
impl ExecutionClient for LocalClient {
    async fn execute(
        &self,
        code: &str,
        language: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecutionResult> {
        let request =
            ExecutionRequest::new(code, language, timeout.unwrap_or(self.default_timeout));
        Ok(self.engine.execute(&request).await)
    }

    async fn languages(&self) -> Result<Vec<LanguageInfo>> {
        Ok(self
            .engine
            .registry()
            .languages()
            .iter()
            .map(|profile| LanguageInfo {
                id: profile.id.clone(),
                aliases: profile.aliases.clone(),
                image: profile.image.clone(),
            })
            .collect())
    }
}
