use std::collections::HashMap;
use std::time::Duration;

use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, RemoveContainerOptions,
    StartContainerOptions, UploadToContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::service::HostConfig;
use bollard::Docker;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;

use crate::{Error, Result, WORKSPACE};

// Docker's default CFS scheduling period, in microseconds. CPU limits
// are expressed as a fraction of one core and converted to a quota
// against this period.
const CPU_PERIOD_US: i64 = 100_000;

/// Everything needed to create one sandbox container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub memory_bytes: i64,
    /// Fraction of a single core, e.g. 0.5 or 2.0.
    pub cpu_limit: f64,
}

/// An owned container identity. The full id addresses the runtime; the
/// short id shows up in logs.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    pub id: String,
    pub short_id: String,
}

/// Demuxed output of one in-container execution.
#[derive(Debug)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: Bytes,
    pub stderr: Bytes,
}

/// Thin wrapper over the Docker Engine API: create, exec, archive
/// put/get, remove. All operations are async; none block the caller's
/// task.
#[derive(Clone)]
pub struct DockerDriver {
    docker: Docker,
}

impl DockerDriver {
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    /// Make sure `image` is available locally, pulling only when it is
    /// absent. Subsequent startups with a present image never re-pull.
    pub async fn ensure_image(&self, image: &str) -> Result<()> {
        match self.docker.inspect_image(image).await {
            Ok(_) => {
                tracing::info!(%image, "using local sandbox image");
                return Ok(());
            }
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => (),
            Err(err) => return Err(err.into()),
        }

        tracing::info!(%image, "pulling sandbox image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut pull = self.docker.create_image(Some(options), None, None);
        while let Some(msg) = pull.next().await {
            let msg = msg.map_err(|err| Error::ImagePull {
                image: image.to_string(),
                detail: err.to_string(),
            })?;
            if let Some(error) = msg.error {
                return Err(Error::ImagePull {
                    image: image.to_string(),
                    detail: error,
                });
            }
            if let Some(status) = msg.status {
                tracing::debug!(%image, %status, "image pull progress");
            }
        }
        Ok(())
    }

    /// Create and start one pooled container: resource caps, bridged
    /// network with a host alias, `/workspace` working directory, and a
    /// `sleep infinity` command so it idles until exec'd into.
    pub async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        let host_config = HostConfig {
            memory: Some(spec.memory_bytes),
            cpu_period: Some(CPU_PERIOD_US),
            cpu_quota: Some((spec.cpu_limit * CPU_PERIOD_US as f64) as i64),
            network_mode: Some("bridge".to_string()),
            extra_hosts: Some(vec!["host.docker.internal:host-gateway".to_string()]),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            working_dir: Some(WORKSPACE.to_string()),
            open_stdin: Some(true),
            labels: Some(HashMap::from([(
                "pool".to_string(),
                "sandbox".to_string(),
            )])),
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await?;
        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await?;

        let short_id = created.id.chars().take(12).collect();
        Ok(ContainerHandle {
            id: created.id,
            short_id,
        })
    }

    /// Run `argv` inside the container and collect demuxed output.
    ///
    /// The whole execution runs under `timeout`; on breach the result is
    /// the synthetic `(-1, "", "Execution timed out after N seconds")`
    /// after a best-effort kill of the in-container process tree matched
    /// by the argv head.
    pub async fn exec(
        &self,
        container: &ContainerHandle,
        argv: Vec<String>,
        workdir: Option<&str>,
        timeout: Duration,
    ) -> Result<ExecOutput> {
        let head = argv.first().cloned().unwrap_or_default();

        match tokio::time::timeout(timeout, self.exec_inner(container, argv, workdir)).await {
            Ok(output) => output,
            Err(_elapsed) => {
                self.kill_matching(container, &head).await;
                Ok(ExecOutput {
                    exit_code: -1,
                    stdout: Bytes::new(),
                    stderr: Bytes::from(format!(
                        "Execution timed out after {} seconds",
                        timeout.as_secs()
                    )),
                })
            }
        }
    }

    async fn exec_inner(
        &self,
        container: &ContainerHandle,
        argv: Vec<String>,
        workdir: Option<&str>,
    ) -> Result<ExecOutput> {
        let options = CreateExecOptions {
            cmd: Some(argv),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            working_dir: workdir.map(str::to_string),
            ..Default::default()
        };
        let exec = self.docker.create_exec(&container.id, options).await?;

        let mut stdout = BytesMut::new();
        let mut stderr = BytesMut::new();
        match self.docker.start_exec(&exec.id, None).await? {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(msg) = output.next().await {
                    use bollard::container::LogOutput;
                    match msg? {
                        LogOutput::StdOut { message } => stdout.extend_from_slice(&message),
                        LogOutput::StdErr { message } => stderr.extend_from_slice(&message),
                        _ => (),
                    }
                }
            }
            StartExecResults::Detached => (),
        }

        let inspected = self.docker.inspect_exec(&exec.id).await?;
        Ok(ExecOutput {
            exit_code: inspected.exit_code.unwrap_or(-1),
            stdout: stdout.freeze(),
            stderr: stderr.freeze(),
        })
    }

    // Best-effort: terminate whatever a timed-out exec left running.
    async fn kill_matching(&self, container: &ContainerHandle, argv_head: &str) {
        if argv_head.is_empty() {
            return;
        }
        let argv = vec!["pkill".to_string(), "-f".to_string(), argv_head.to_string()];
        if let Err(err) = self.exec_inner(container, argv, None).await {
            tracing::warn!(
                container = %container.short_id,
                error = %err,
                "failed to kill timed-out process"
            );
        }
    }

    /// Fetch `path` from the container as a tar stream.
    pub async fn archive_get(&self, container: &ContainerHandle, path: &str) -> Result<Bytes> {
        let options = DownloadFromContainerOptions {
            path: path.to_string(),
        };
        let mut stream = self
            .docker
            .download_from_container(&container.id, Some(options));

        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => buf.extend_from_slice(&bytes),
                Err(DockerError::DockerResponseServerError {
                    status_code: 404, ..
                }) => return Err(Error::NotFound(path.to_string())),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(buf.freeze())
    }

    /// Unpack a tar stream into `parent_dir` inside the container.
    pub async fn archive_put(
        &self,
        container: &ContainerHandle,
        parent_dir: &str,
        tar_bytes: Vec<u8>,
    ) -> Result<()> {
        let options = UploadToContainerOptions {
            path: parent_dir.to_string(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(&container.id, Some(options), tar_bytes.into())
            .await?;
        Ok(())
    }

    /// Remove the container. A 404 maps to `NotFound`; other failures
    /// propagate.
    pub async fn remove(&self, container: &ContainerHandle, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        match self
            .docker
            .remove_container(&container.id, Some(options))
            .await
        {
            Ok(()) => Ok(()),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(Error::NotFound(container.id.clone())),
            Err(err) => Err(err.into()),
        }
    }
}
