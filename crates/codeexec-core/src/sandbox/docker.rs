// src/sandbox/docker.rs
use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions as BollardCreateContainerOptionsQuery,
    InspectContainerOptions as BollardInspectContainerOptionsQuery,
    KillContainerOptions as BollardKillContainerOptionsQuery,
    LogsOptions as BollardLogsOptionsQuery,
    RemoveContainerOptions as BollardRemoveContainerOptionsQuery,
    StartContainerOptions as BollardStartContainerOptionsQuery,
    WaitContainerOptions as BollardWaitContainerOptionsQuery,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use tempfile::Builder;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::{
    CapturedOutput, ExitInspection, OutputCollector, SandboxHandle, SandboxRuntime, StageRequest,
    SANDBOX_WORK_DIR,
};
use crate::errors::SandboxError;

const PURPOSE_LABEL: &str = "codeexec.purpose";

/// Sandbox runtime backed by the Docker Engine API.
///
/// The source file is written to a private temporary directory on the host and
/// bind mounted read-only at `/app`, so the daemon must share the host's
/// filesystem (the usual local-socket setup).
pub struct DockerSandbox {
    docker: Docker,
}

impl DockerSandbox {
    /// Connect using `DOCKER_HOST` or the platform's default socket.
    pub fn connect() -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    async fn write_source(workspace: &Path, request: &StageRequest) -> Result<(), SandboxError> {
        let host_script_path = workspace.join(&request.source.file_name);
        let mut file = fs::File::create(&host_script_path).await?;
        file.write_all(request.source.contents.as_bytes()).await?;
        file.flush().await?; // Ensure data is written

        // Images may run as a non-root user; the mount is read-only anyway.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(workspace, std::fs::Permissions::from_mode(0o755)).await?;
            fs::set_permissions(&host_script_path, std::fs::Permissions::from_mode(0o644))
                .await?;
        }
        Ok(())
    }

    fn container_config(request: &StageRequest, host_dir: &str) -> ContainerCreateBody {
        let mut host_config = HostConfig {
            binds: Some(vec![format!("{}:{}:ro", host_dir, SANDBOX_WORK_DIR)]),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            auto_remove: Some(false),
            ..Default::default()
        };
        if request.network_disabled {
            host_config.network_mode = Some("none".to_string());
        }
        if let Some(limits) = &request.limits {
            host_config.memory = Some(limits.memory_bytes);
            host_config.memory_swap = Some(limits.memory_bytes);
            host_config.cpu_period = Some(super::ResourceLimits::CPU_PERIOD_MICROS);
            host_config.cpu_quota = Some(limits.cpu_quota_micros());
            host_config.pids_limit = limits.pids_limit;
        }

        let mut labels = HashMap::new();
        labels.insert(PURPOSE_LABEL.to_string(), request.purpose.as_str().to_string());

        ContainerCreateBody {
            image: Some(request.image.clone()),
            cmd: Some(request.command.clone()),
            working_dir: Some(SANDBOX_WORK_DIR.to_string()),
            network_disabled: Some(request.network_disabled),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        }
    }
}

fn is_status(err: &BollardError, status: u16) -> bool {
    matches!(err, BollardError::DockerResponseServerError { status_code, .. } if *status_code == status)
}

#[async_trait]
impl SandboxRuntime for DockerSandbox {
    async fn stage(&self, request: &StageRequest) -> Result<SandboxHandle, SandboxError> {
        let workspace = Builder::new().prefix("codeexec-").tempdir()?;
        Self::write_source(workspace.path(), request).await?;

        let host_dir = workspace
            .path()
            .to_str()
            .ok_or_else(|| SandboxError::Staging("temporary directory path is not valid UTF-8".to_string()))?
            .to_string();

        let options = Some(BollardCreateContainerOptionsQuery {
            name: Some(format!(
                "codeexec-{}-{}",
                request.purpose.as_str(),
                Uuid::new_v4()
            )),
            ..Default::default()
        });
        let config = Self::container_config(request, &host_dir);

        let container = self.docker.create_container(options, config).await?;
        Ok(SandboxHandle::with_workspace(container.id, workspace))
    }

    async fn run(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        self.docker
            .start_container(handle.id(), None::<BollardStartContainerOptionsQuery>)
            .await?;
        Ok(())
    }

    async fn wait(&self, handle: &SandboxHandle) -> Result<i64, SandboxError> {
        // wait_container returns a stream. We need to await the next item for the result.
        let mut wait_stream = self
            .docker
            .wait_container(handle.id(), None::<BollardWaitContainerOptionsQuery>);

        match wait_stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error carrying the status code
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(SandboxError::Runtime(e)),
            None => Err(SandboxError::WaitInterrupted(handle.id().to_string())),
        }
    }

    async fn kill(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        match self
            .docker
            .kill_container(handle.id(), None::<BollardKillContainerOptionsQuery>)
            .await
        {
            Ok(()) => Ok(()),
            // Already stopped between the deadline and the kill
            Err(e) if is_status(&e, 409) => Ok(()),
            Err(e) => Err(SandboxError::Runtime(e)),
        }
    }

    async fn inspect(&self, handle: &SandboxHandle) -> Result<ExitInspection, SandboxError> {
        let info = self
            .docker
            .inspect_container(handle.id(), None::<BollardInspectContainerOptionsQuery>)
            .await?;
        let state = info
            .state
            .ok_or_else(|| SandboxError::MissingState(handle.id().to_string()))?;
        Ok(ExitInspection {
            oom_killed: state.oom_killed.unwrap_or(false),
            exit_code: state.exit_code,
        })
    }

    async fn collect_output(
        &self,
        handle: &SandboxHandle,
        limit: usize,
    ) -> Result<CapturedOutput, SandboxError> {
        let mut output_stream = self.docker.logs(
            handle.id(),
            Some(BollardLogsOptionsQuery {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mut collector = OutputCollector::new(limit);
        while let Some(log_result) = output_stream.next().await {
            match log_result? {
                LogOutput::StdOut { message } => collector.push_stdout(&message),
                LogOutput::StdErr { message } => collector.push_stderr(&message),
                _ => {}
            }
        }
        Ok(collector.finish())
    }

    async fn destroy(&self, handle: SandboxHandle) -> Result<(), SandboxError> {
        let result = self
            .docker
            .remove_container(
                handle.id(),
                Some(BollardRemoveContainerOptionsQuery {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await;
        // The staged workspace is removed when `handle` drops below.
        match result {
            Ok(()) => Ok(()),
            Err(e) if is_status(&e, 404) => Ok(()),
            Err(e) => Err(SandboxError::Runtime(e)),
        }
    }

    async fn ping(&self) -> Result<(), SandboxError> {
        self.docker.ping().await?;
        Ok(())
    }

    async fn image_available(&self, image: &str) -> Result<bool, SandboxError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 404) => Ok(false),
            Err(e) => Err(SandboxError::Runtime(e)),
        }
    }

    fn name(&self) -> &str {
        "docker"
    }
}
