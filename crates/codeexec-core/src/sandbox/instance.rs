//! Scoped ownership of one sandbox instance.

use super::{
    await_completion, CapturedOutput, ExitInspection, ResourceLimits, SandboxHandle,
    SandboxPurpose, SandboxRuntime, SandboxState, StageRequest, TerminalState,
};
use crate::errors::SandboxError;
use std::sync::Arc;
use std::time::Duration;

/// A staged instance that is destroyed when its owner is done with it.
///
/// Call [`SandboxInstance::release`] on every path. If the guard is dropped
/// without a release (panic, or the owning future was cancelled) the destroy is
/// scheduled on the current tokio runtime instead.
pub struct SandboxInstance {
    runtime: Arc<dyn SandboxRuntime>,
    handle: Option<SandboxHandle>,
    purpose: SandboxPurpose,
    limits: Option<ResourceLimits>,
    state: SandboxState,
}

impl SandboxInstance {
    pub async fn stage(
        runtime: Arc<dyn SandboxRuntime>,
        request: &StageRequest,
    ) -> Result<Self, SandboxError> {
        let handle = runtime.stage(request).await?;
        log::debug!(
            "Staged {} sandbox {} from image {}",
            request.purpose.as_str(),
            handle.id(),
            request.image
        );
        Ok(Self {
            runtime,
            handle: Some(handle),
            purpose: request.purpose,
            limits: request.limits,
            state: SandboxState::Created,
        })
    }

    pub fn id(&self) -> &str {
        self.handle
            .as_ref()
            .map(SandboxHandle::id)
            .unwrap_or("<released>")
    }

    pub fn state(&self) -> SandboxState {
        self.state
    }

    pub fn purpose(&self) -> SandboxPurpose {
        self.purpose
    }

    pub fn limits(&self) -> Option<&ResourceLimits> {
        self.limits.as_ref()
    }

    fn handle(&self) -> Result<&SandboxHandle, SandboxError> {
        self.handle
            .as_ref()
            .ok_or_else(|| SandboxError::Unavailable("sandbox instance already released".to_string()))
    }

    pub async fn start(&mut self) -> Result<(), SandboxError> {
        let handle = self.handle()?;
        self.runtime.run(handle).await?;
        self.state = SandboxState::Running;
        Ok(())
    }

    pub async fn await_completion(
        &mut self,
        deadline: Duration,
    ) -> Result<TerminalState, SandboxError> {
        let handle = self.handle()?;
        let terminal = await_completion(self.runtime.as_ref(), handle, deadline).await?;
        if let TerminalState::Exited { .. } = terminal {
            self.state = SandboxState::Exited;
        }
        Ok(terminal)
    }

    /// Kill the instance after its deadline elapsed.
    pub async fn force_stop(&mut self) -> Result<(), SandboxError> {
        let handle = self.handle()?;
        let result = self.runtime.kill(handle).await;
        self.state = SandboxState::TimedOut;
        result
    }

    pub async fn inspect(&mut self) -> Result<ExitInspection, SandboxError> {
        let handle = self.handle()?;
        let inspection = self.runtime.inspect(handle).await?;
        if inspection.oom_killed {
            self.state = SandboxState::OomKilled;
        }
        Ok(inspection)
    }

    pub async fn collect_output(&self, limit: usize) -> Result<CapturedOutput, SandboxError> {
        let handle = self.handle()?;
        self.runtime.collect_output(handle, limit).await
    }

    /// Destroy the instance. Failures are logged, never returned.
    ///
    /// The destroy runs as its own task, so it completes even when the caller's
    /// future is dropped while waiting for it.
    pub async fn release(mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let id = handle.id().to_string();
        let runtime = Arc::clone(&self.runtime);
        let teardown = tokio::spawn(async move { runtime.destroy(handle).await });
        match teardown.await {
            Ok(Ok(())) => log::debug!("Destroyed {} sandbox {}", self.purpose.as_str(), id),
            Ok(Err(e)) => log::warn!("Failed to destroy sandbox {}: {}", id, e),
            Err(e) => log::error!("Destroy task for sandbox {} did not finish: {}", id, e),
        }
    }
}

impl Drop for SandboxInstance {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let id = handle.id().to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                log::warn!("Sandbox {} dropped without release, destroying in background", id);
                let runtime = Arc::clone(&self.runtime);
                rt.spawn(async move {
                    if let Err(e) = runtime.destroy(handle).await {
                        log::error!("Background destroy of sandbox {} failed: {}", id, e);
                    }
                });
            }
            Err(_) => {
                log::error!("Sandbox {} leaked: no async runtime to destroy it", id);
            }
        }
    }
}
