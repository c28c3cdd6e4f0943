//! In-memory sandbox runtime for tests.
//!
//! `FakeSandbox` never touches a container daemon. Each staged instance gets a
//! scripted [`FakeRun`] chosen from the stage request, and every call is
//! counted so tests can assert how many instances were created and destroyed.

use super::{
    CapturedOutput, ExitInspection, OutputCollector, SandboxHandle, SandboxPurpose, SandboxRuntime,
    StageRequest,
};
use crate::errors::SandboxError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted behaviour of one fake instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FakeRun {
    pub exit_code: i64,
    pub oom_killed: bool,
    pub stdout: String,
    pub stderr: String,
    /// How long `wait` takes to resolve.
    pub duration: Duration,
    pub fail_stage: Option<String>,
    pub fail_start: Option<String>,
    pub fail_inspect: Option<String>,
    /// How long `destroy` takes before the instance is gone.
    pub teardown: Duration,
}

impl FakeRun {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    pub fn exit(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn oom() -> Self {
        Self {
            exit_code: 137,
            oom_killed: true,
            ..Default::default()
        }
    }

    pub fn stage_failure(message: impl Into<String>) -> Self {
        Self {
            fail_stage: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn start_failure(message: impl Into<String>) -> Self {
        Self {
            fail_start: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn inspect_failure(message: impl Into<String>) -> Self {
        Self {
            fail_inspect: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn lasting(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_teardown(mut self, teardown: Duration) -> Self {
        self.teardown = teardown;
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }
}

type Script = dyn Fn(&StageRequest) -> FakeRun + Send + Sync;

pub struct FakeSandbox {
    script: Box<Script>,
    next_id: AtomicUsize,
    instances: Mutex<HashMap<String, FakeRun>>,
    staged: Mutex<Vec<StageRequest>>,
    started: AtomicUsize,
    killed: AtomicUsize,
    destroyed: AtomicUsize,
}

impl FakeSandbox {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&StageRequest) -> FakeRun + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            next_id: AtomicUsize::new(1),
            instances: Mutex::new(HashMap::new()),
            staged: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            killed: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
        }
    }

    /// Same behaviour for every instance.
    pub fn always(run: FakeRun) -> Self {
        Self::new(move |_| run.clone())
    }

    /// A passing syntax check followed by `run` for the execution phase.
    pub fn passing_check(run: FakeRun) -> Self {
        Self::by_purpose(FakeRun::default(), run)
    }

    pub fn by_purpose(check: FakeRun, run: FakeRun) -> Self {
        Self::new(move |request| match request.purpose {
            SandboxPurpose::SyntaxCheck => check.clone(),
            SandboxPurpose::Run => run.clone(),
        })
    }

    /// Every stage request received, in order.
    pub fn staged(&self) -> Vec<StageRequest> {
        self.staged.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn stage_count(&self) -> usize {
        self.staged().len()
    }

    pub fn start_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn kill_count(&self) -> usize {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Instances staged and not yet destroyed.
    pub fn live_instances(&self) -> usize {
        self.instances.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn run_for(&self, handle: &SandboxHandle) -> Result<FakeRun, SandboxError> {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(handle.id())
            .cloned()
            .ok_or_else(|| SandboxError::Unavailable(format!("no such container: {}", handle.id())))
    }
}

#[async_trait]
impl SandboxRuntime for FakeSandbox {
    async fn stage(&self, request: &StageRequest) -> Result<SandboxHandle, SandboxError> {
        self.staged
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let run = (self.script)(request);
        if let Some(message) = &run.fail_stage {
            return Err(SandboxError::Unavailable(message.clone()));
        }

        let id = format!(
            "fake-{}-{}",
            request.purpose.as_str(),
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), run);
        Ok(SandboxHandle::new(id))
    }

    async fn run(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        let run = self.run_for(handle)?;
        if let Some(message) = run.fail_start {
            return Err(SandboxError::Unavailable(message));
        }
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&self, handle: &SandboxHandle) -> Result<i64, SandboxError> {
        let run = self.run_for(handle)?;
        if !run.duration.is_zero() {
            tokio::time::sleep(run.duration).await;
        }
        Ok(run.exit_code)
    }

    async fn kill(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        self.run_for(handle)?;
        self.killed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn inspect(&self, handle: &SandboxHandle) -> Result<ExitInspection, SandboxError> {
        let run = self.run_for(handle)?;
        if let Some(message) = run.fail_inspect {
            return Err(SandboxError::Unavailable(message));
        }
        Ok(ExitInspection {
            oom_killed: run.oom_killed,
            exit_code: Some(run.exit_code),
        })
    }

    async fn collect_output(
        &self,
        handle: &SandboxHandle,
        limit: usize,
    ) -> Result<CapturedOutput, SandboxError> {
        let run = self.run_for(handle)?;
        let mut collector = OutputCollector::new(limit);
        collector.push_stdout(run.stdout.as_bytes());
        collector.push_stderr(run.stderr.as_bytes());
        Ok(collector.finish())
    }

    async fn destroy(&self, handle: SandboxHandle) -> Result<(), SandboxError> {
        let teardown = self
            .instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(handle.id())
            .map(|run| run.teardown)
            .unwrap_or_default();
        if !teardown.is_zero() {
            tokio::time::sleep(teardown).await;
        }
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(handle.id());
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn image_available(&self, _image: &str) -> Result<bool, SandboxError> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake"
    }
}
