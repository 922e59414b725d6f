//! Docker implementation of the container runtime adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::body_full;
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, KillContainerOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions,
    WaitContainerOptions,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use uuid::Uuid;

use super::{ContainerRuntime, ContainerSpec};
use crate::errors::RuntimeError;

/// Container runtime backed by a local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect over the given Unix socket path.
    pub fn new(socket: &str) -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_unix(
            &format!("unix://{socket}"),
            120,
            bollard::API_DEFAULT_VERSION,
        )?;
        Ok(Self { docker })
    }

    /// Connect using the environment's default daemon location.
    pub fn from_defaults() -> Result<Self, RuntimeError> {
        Ok(Self {
            docker: Docker::connect_with_local_defaults()?,
        })
    }
}

fn is_gone(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 || *status_code == 409
    )
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        log::info!("Pulling image {image}");
        let options = CreateImageOptions {
            from_image: Some(image.to_string()),
            ..Default::default()
        };
        let mut pull = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = pull.next().await {
            let info = progress?;
            log::debug!("Pull progress for {image}: {:?}", info.status);
        }
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let network_disabled = spec.network_mode.is_none();
        let network_mode = spec
            .network_mode
            .clone()
            .unwrap_or_else(|| "none".to_string());

        let mut tmpfs = HashMap::new();
        tmpfs.insert("/work".to_string(), format!("size={}m", spec.disk_mb));
        tmpfs.insert("/tmp".to_string(), "size=100m".to_string());

        let host_config = HostConfig {
            memory: Some(spec.memory_mb as i64 * 1024 * 1024),
            cpu_shares: Some(spec.cpu_shares as i64),
            network_mode: Some(network_mode),
            dns: Some(spec.dns_servers.clone()),
            tmpfs: Some(tmpfs),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                spec.command.clone(),
            ]),
            working_dir: Some("/work".to_string()),
            env: Some(spec.env.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            open_stdin: Some(spec.open_stdin),
            stdin_once: Some(spec.open_stdin),
            network_disabled: Some(network_disabled),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: Some(format!("pyexec-{}", Uuid::new_v4())),
            ..Default::default()
        };

        let created = self.docker.create_container(Some(options), body).await?;
        Ok(created.id)
    }

    async fn copy_in(&self, handle: &str, path: &str, tar: Vec<u8>) -> Result<(), RuntimeError> {
        let options = UploadToContainerOptions {
            path: path.to_string(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(handle, Some(options), body_full(tar.into()))
            .await?;
        Ok(())
    }

    async fn start(&self, handle: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(handle, None::<StartContainerOptions>)
            .await?;
        Ok(())
    }

    async fn wait(&self, handle: &str) -> Result<i64, RuntimeError> {
        let mut wait = self
            .docker
            .wait_container(handle, None::<WaitContainerOptions>);
        match wait.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // A non-zero exit is reported as a wait error by the engine
            // client; it is still an ordinary exit code for us.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Err(RuntimeError::Other(
                "wait stream ended before container exit".to_string(),
            )),
        }
    }

    async fn kill(&self, handle: &str) -> Result<(), RuntimeError> {
        let options = KillContainerOptions {
            signal: "SIGKILL".to_string(),
            ..Default::default()
        };
        match self.docker.kill_container(handle, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_gone(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn logs(&self, handle: &str) -> Result<(String, String), RuntimeError> {
        let options = LogsOptions {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut stream = self.docker.logs(handle, Some(options));

        let mut stdout = String::new();
        let mut stderr = String::new();
        while let Some(frame) = stream.next().await {
            match frame? {
                LogOutput::StdOut { message } => {
                    stdout.push_str(&String::from_utf8_lossy(&message));
                }
                LogOutput::StdErr { message } => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                // Frames from other stream ids carry nothing we report.
                _ => {}
            }
        }
        Ok((stdout, stderr))
    }

    async fn remove(&self, handle: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        match self.docker.remove_container(handle, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_gone(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
