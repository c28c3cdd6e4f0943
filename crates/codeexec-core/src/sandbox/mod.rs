//! Sandbox runtime abstraction.
//!
//! A sandbox instance is one disposable, resource-bounded container used for a
//! single syntax check or a single run. The [`SandboxRuntime`] trait exposes only
//! lifecycle primitives (stage, run, wait, kill, inspect, collect, destroy); all
//! policy such as deadlines and failure classification lives in the engine.

use crate::errors::SandboxError;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tempfile::TempDir;

pub mod docker;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
mod instance;

pub use docker::DockerSandbox;
#[cfg(any(test, feature = "test-util"))]
pub use fake::{FakeRun, FakeSandbox};
pub use instance::SandboxInstance;

/// Working directory inside every sandbox; the source file is staged here.
pub const SANDBOX_WORK_DIR: &str = "/app";

/// CPU/memory ceilings applied when a run-phase instance is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    /// Hard memory cap. Swap is pinned to the same value so it cannot be exceeded.
    pub memory_bytes: i64,
    /// Fraction of one core, e.g. `0.5`.
    pub cpu_share: f64,
    pub pids_limit: Option<i64>,
}

impl ResourceLimits {
    pub const CPU_PERIOD_MICROS: i64 = 100_000;

    pub fn cpu_quota_micros(&self) -> i64 {
        (self.cpu_share * Self::CPU_PERIOD_MICROS as f64).round() as i64
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: 64 * 1024 * 1024,
            cpu_share: 0.5,
            pids_limit: Some(64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxPurpose {
    SyntaxCheck,
    Run,
}

impl SandboxPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxPurpose::SyntaxCheck => "check",
            SandboxPurpose::Run => "run",
        }
    }
}

/// The user's code, staged as a single file in [`SANDBOX_WORK_DIR`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub file_name: String,
    pub contents: String,
}

impl SourceFile {
    pub fn new(file_name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }

    pub fn path_in_sandbox(&self) -> String {
        format!("{}/{}", SANDBOX_WORK_DIR, self.file_name)
    }
}

/// Everything needed to create one instance. Fixed for the instance's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRequest {
    pub purpose: SandboxPurpose,
    pub image: String,
    pub command: Vec<String>,
    pub source: SourceFile,
    /// `None` leaves the instance unbounded (syntax checks only parse).
    pub limits: Option<ResourceLimits>,
    pub network_disabled: bool,
}

/// Opaque reference to a staged instance.
///
/// Owns whatever host-side staging the runtime created for the instance, so
/// destroying (or dropping) the handle also removes the staged source.
pub struct SandboxHandle {
    id: String,
    workspace: Option<TempDir>,
}

impl SandboxHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            workspace: None,
        }
    }

    pub fn with_workspace(id: impl Into<String>, workspace: TempDir) -> Self {
        Self {
            id: id.into(),
            workspace: Some(workspace),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn workspace(&self) -> Option<&std::path::Path> {
        self.workspace.as_ref().map(|dir| dir.path())
    }
}

impl fmt::Debug for SandboxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxHandle")
            .field("id", &self.id)
            .field("workspace", &self.workspace())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Created,
    Running,
    Exited,
    TimedOut,
    OomKilled,
}

/// How the race between completion and the deadline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Exited { exit_code: i64 },
    DeadlineElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitInspection {
    pub oom_killed: bool,
    pub exit_code: Option<i64>,
}

/// Demultiplexed output of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    /// Set when either stream hit the collection limit.
    pub truncated: bool,
}

/// Accumulates raw log bytes per stream and decodes them once at the end.
///
/// Runtimes may split a single write into several frames at arbitrary byte
/// offsets, so frames are never decoded on their own.
#[derive(Debug, Clone, Default)]
pub struct OutputCollector {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl OutputCollector {
    /// Keep at most `limit` bytes of each stream.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn push_stdout(&mut self, chunk: &[u8]) {
        self.truncated |= append_bounded(&mut self.stdout, chunk, self.limit);
    }

    pub fn push_stderr(&mut self, chunk: &[u8]) {
        self.truncated |= append_bounded(&mut self.stderr, chunk, self.limit);
    }

    pub fn finish(self) -> CapturedOutput {
        CapturedOutput {
            stdout: decode(self.stdout),
            stderr: decode(self.stderr),
            truncated: self.truncated,
        }
    }
}

/// Append up to `limit` total bytes. Returns true if the chunk was cut.
fn append_bounded(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    let remaining = limit.saturating_sub(buf.len());
    let take = chunk.len().min(remaining);
    buf.extend_from_slice(&chunk[..take]);
    take < chunk.len()
}

/// Lossy decode, minus a multi-byte sequence left unfinished by truncation.
fn decode(mut bytes: Vec<u8>) -> String {
    let complete = complete_prefix_len(&bytes);
    bytes.truncate(complete);
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn complete_prefix_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let start = bytes.len() - back;
        let lead = bytes[start];
        if lead & 0xC0 == 0x80 {
            continue;
        }
        let width = match lead {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { start } else { bytes.len() };
    }
    bytes.len()
}

/// Lifecycle primitives of a container runtime.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Create an instance with the source staged and limits applied. Does not start it.
    async fn stage(&self, request: &StageRequest) -> Result<SandboxHandle, SandboxError>;

    async fn run(&self, handle: &SandboxHandle) -> Result<(), SandboxError>;

    /// Resolve with the exit code once the instance stops. No timeout of its own.
    async fn wait(&self, handle: &SandboxHandle) -> Result<i64, SandboxError>;

    /// Force-stop a running instance.
    async fn kill(&self, handle: &SandboxHandle) -> Result<(), SandboxError>;

    async fn inspect(&self, handle: &SandboxHandle) -> Result<ExitInspection, SandboxError>;

    async fn collect_output(
        &self,
        handle: &SandboxHandle,
        limit: usize,
    ) -> Result<CapturedOutput, SandboxError>;

    async fn destroy(&self, handle: SandboxHandle) -> Result<(), SandboxError>;

    /// Check that the runtime daemon answers.
    async fn ping(&self) -> Result<(), SandboxError>;

    async fn image_available(&self, image: &str) -> Result<bool, SandboxError>;

    fn name(&self) -> &str;
}

/// Race `wait` against `deadline`. The caller must kill the instance on `DeadlineElapsed`.
pub async fn await_completion(
    runtime: &dyn SandboxRuntime,
    handle: &SandboxHandle,
    deadline: Duration,
) -> Result<TerminalState, SandboxError> {
    match tokio::time::timeout(deadline, runtime.wait(handle)).await {
        Ok(Ok(exit_code)) => Ok(TerminalState::Exited { exit_code }),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(TerminalState::DeadlineElapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_quota_from_share() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.cpu_quota_micros(), 50_000);
        let two_cores = ResourceLimits {
            cpu_share: 2.0,
            ..limits
        };
        assert_eq!(two_cores.cpu_quota_micros(), 200_000);
    }

    #[test]
    fn test_source_path_is_under_work_dir() {
        let source = SourceFile::new("code.py", "print(1)");
        assert_eq!(source.path_in_sandbox(), "/app/code.py");
    }

    #[test]
    fn test_output_is_bounded_per_stream() {
        let mut collector = OutputCollector::new(8);
        collector.push_stdout(b"hello ");
        collector.push_stdout(b"world");
        collector.push_stderr(b"ok");
        let output = collector.finish();
        assert_eq!(output.stdout, "hello wo");
        assert_eq!(output.stderr, "ok");
        assert!(output.truncated);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let mut collector = OutputCollector::new(2);
        collector.push_stdout("h\u{e9}llo".as_bytes());
        let output = collector.finish();
        assert_eq!(output.stdout, "h");
        assert!(output.truncated);
    }

    #[test]
    fn test_multibyte_char_split_across_frames() {
        let euro = "\u{20ac}".as_bytes();
        let mut collector = OutputCollector::new(1024);
        collector.push_stdout(b"price: ");
        collector.push_stdout(&euro[..2]);
        collector.push_stdout(&euro[2..]);
        collector.push_stdout(b"5\n");
        let output = collector.finish();
        assert_eq!(output.stdout, "price: \u{20ac}5\n");
        assert!(!output.truncated);
    }

    #[test]
    fn test_invalid_bytes_are_replaced_not_dropped() {
        let mut collector = OutputCollector::new(1024);
        collector.push_stderr(&[b'a', 0xFF, b'b']);
        assert_eq!(collector.finish().stderr, "a\u{FFFD}b");
    }

    #[test]
    fn test_four_byte_char_cut_by_limit() {
        let crab = "ab\u{1F980}".as_bytes();
        let mut collector = OutputCollector::new(4);
        collector.push_stdout(crab);
        let output = collector.finish();
        assert_eq!(output.stdout, "ab");
        assert!(output.truncated);
    }
}
