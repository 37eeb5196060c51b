use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::driver::{ContainerHandle, ContainerSpec, DockerDriver};
use crate::{archive, language, Error, Result, TRUNCATION_MARKER, WORKSPACE};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub image: String,
    pub pool_size: usize,
    /// Default per-exec deadline, overridable per call.
    pub exec_timeout: Duration,
    /// Per-stream output cap in bytes.
    pub max_output_size: usize,
    pub memory_bytes: i64,
    pub cpu_limit: f64,
}

/// Structured result of one `exec_code` call.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeExecResult {
    pub stdout: String,
    pub stderr: String,
    /// `-1` is reserved for "timed out".
    pub exit_code: i64,
    /// Set when either stream was clipped at the configured cap.
    pub truncated: bool,
}

/// A fixed set of pre-warmed containers, handed out one caller at a
/// time.
///
/// `acquire` suspends while no container is idle and is cancel-safe: a
/// caller that gives up while waiting takes nothing, and a caller that
/// holds a [`PooledContainer`] returns it when the guard drops, on
/// success and failure paths alike. The workspace is intentionally
/// not cleaned between releases so write-then-read workflows spanning
/// several calls keep working; callers wanting isolation ask for
/// [`SandboxPool::reset_workspace`].
pub struct SandboxPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    driver: DockerDriver,
    config: PoolConfig,
    idle: Mutex<VecDeque<ContainerHandle>>,
    available: Semaphore,
    owned: Mutex<Vec<ContainerHandle>>,
}

/// RAII guard over an acquired container. Dereferences to the handle and
/// re-enqueues it on drop.
pub struct PooledContainer {
    inner: Arc<PoolInner>,
    handle: Option<ContainerHandle>,
}

impl Deref for PooledContainer {
    type Target = ContainerHandle;

    fn deref(&self) -> &ContainerHandle {
        self.handle.as_ref().expect("handle present until drop")
    }
}

impl Drop for PooledContainer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.inner.idle.lock().unwrap().push_back(handle);
            self.inner.available.add_permits(1);
        }
    }
}

impl SandboxPool {
    pub fn new(driver: DockerDriver, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                driver,
                config,
                idle: Mutex::new(VecDeque::new()),
                available: Semaphore::new(0),
                owned: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Ensure the image is present, then create and enqueue all
    /// containers. If creation of container k fails, containers 0..k-1
    /// are rolled back and the error propagates: the pool is all-or-
    /// nothing.
    pub async fn start(&self) -> Result<()> {
        let config = &self.inner.config;
        self.inner.driver.ensure_image(&config.image).await?;

        let spec = ContainerSpec {
            image: config.image.clone(),
            memory_bytes: config.memory_bytes,
            cpu_limit: config.cpu_limit,
        };

        let mut created: Vec<ContainerHandle> = Vec::with_capacity(config.pool_size);
        for i in 0..config.pool_size {
            tracing::info!(
                index = i + 1,
                total = config.pool_size,
                "creating sandbox container"
            );
            let result = self.create_one(&spec).await;
            match result {
                Ok(handle) => created.push(handle),
                Err(err) => {
                    tracing::error!(error = %err, "container creation failed, rolling back pool");
                    for handle in &created {
                        if let Err(remove_err) = self.inner.driver.remove(handle, true).await {
                            tracing::warn!(
                                container = %handle.short_id,
                                error = %remove_err,
                                "rollback removal failed"
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }

        {
            let mut owned = self.inner.owned.lock().unwrap();
            let mut idle = self.inner.idle.lock().unwrap();
            for handle in created {
                owned.push(handle.clone());
                idle.push_back(handle);
            }
        }
        self.inner.available.add_permits(config.pool_size);

        tracing::info!(pool_size = config.pool_size, "sandbox pool ready");
        Ok(())
    }

    async fn create_one(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        let handle = self.inner.driver.create(spec).await?;
        // The image may not ship a /workspace; make sure it exists.
        self.inner
            .driver
            .exec(
                &handle,
                vec!["mkdir".into(), "-p".into(), WORKSPACE.into()],
                None,
                self.inner.config.exec_timeout,
            )
            .await?;
        Ok(handle)
    }

    /// Force-remove every owned container and drain the idle queue.
    /// Individual removal failures are logged, never propagated.
    pub async fn shutdown(&self) {
        self.inner.available.close();

        let owned: Vec<ContainerHandle> = self.inner.owned.lock().unwrap().drain(..).collect();
        for handle in owned {
            tracing::info!(container = %handle.short_id, "removing sandbox container");
            if let Err(err) = self.inner.driver.remove(&handle, true).await {
                tracing::error!(
                    container = %handle.short_id,
                    error = %err,
                    "failed to remove container"
                );
            }
        }
        self.inner.idle.lock().unwrap().clear();
        tracing::info!("sandbox pool shut down");
    }

    /// Take a container no other caller holds, waiting as long as the
    /// caller's own deadline allows.
    pub async fn acquire(&self) -> Result<PooledContainer> {
        let permit = self
            .inner
            .available
            .acquire()
            .await
            .map_err(|_| Error::PoolClosed)?;
        permit.forget();

        let handle = self
            .inner
            .idle
            .lock()
            .unwrap()
            .pop_front()
            .expect("idle queue holds one handle per permit");
        Ok(PooledContainer {
            inner: self.inner.clone(),
            handle: Some(handle),
        })
    }

    /// Containers currently idle. Primarily interesting to tests.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().unwrap().len()
    }

    /// Containers owned by the pool, idle or held.
    pub fn owned_count(&self) -> usize {
        self.inner.owned.lock().unwrap().len()
    }

    /// Best-effort removal of everything under `/workspace`, dotfiles
    /// included. Failure is logged, not raised.
    pub async fn reset_workspace(&self, container: &ContainerHandle) {
        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            "rm -rf /workspace/* /workspace/.* 2>/dev/null || true".to_string(),
        ];
        if let Err(err) = self
            .inner
            .driver
            .exec(container, argv, None, self.inner.config.exec_timeout)
            .await
        {
            tracing::error!(
                container = %container.short_id,
                error = %err,
                "failed to clean workspace"
            );
        }
    }

    /// Run `code` inside the container using the language's one-shot
    /// invocation, returning a structured result.
    ///
    /// An unsupported language tag yields `exit_code = 1` with a stderr
    /// naming the supported set, without touching the container. A
    /// timeout yields `exit_code = -1`.
    pub async fn exec_code(
        &self,
        container: &ContainerHandle,
        code: &str,
        language: &str,
        timeout: Option<Duration>,
    ) -> Result<CodeExecResult> {
        let timeout = timeout.unwrap_or(self.inner.config.exec_timeout);

        let Some(command) = language::language_command(language) else {
            return Ok(CodeExecResult {
                stdout: String::new(),
                stderr: format!(
                    "Unsupported language: {language}. Supported: {}",
                    language::supported_languages().join(", ")
                ),
                exit_code: 1,
                truncated: false,
            });
        };

        let argv = vec![
            command[0].to_string(),
            command[1].to_string(),
            code.to_string(),
        ];
        let output = self
            .inner
            .driver
            .exec(container, argv, Some(WORKSPACE), timeout)
            .await?;

        let cap = self.inner.config.max_output_size;
        let (stdout, stdout_truncated) =
            clip_output(String::from_utf8_lossy(&output.stdout).into_owned(), cap);
        let (stderr, stderr_truncated) =
            clip_output(String::from_utf8_lossy(&output.stderr).into_owned(), cap);

        Ok(CodeExecResult {
            stdout,
            stderr,
            exit_code: output.exit_code,
            truncated: stdout_truncated || stderr_truncated,
        })
    }

    /// Read raw file bytes out of the container through the archive
    /// channel.
    pub async fn file_read(&self, container: &ContainerHandle, path: &str) -> Result<Vec<u8>> {
        let tar_bytes = self.inner.driver.archive_get(container, path).await?;
        archive::unwrap_file(&tar_bytes, path)
    }

    /// Write a file into the container, creating parent directories as
    /// needed. Returns the number of bytes written.
    pub async fn file_write(
        &self,
        container: &ContainerHandle,
        path: &str,
        content: &[u8],
    ) -> Result<usize> {
        let (parent, name) = match path.rsplit_once('/') {
            Some(("", name)) => ("/", name),
            Some((parent, name)) => (parent, name),
            None => ("/", path),
        };

        self.inner
            .driver
            .exec(
                container,
                vec!["mkdir".into(), "-p".into(), parent.into()],
                None,
                self.inner.config.exec_timeout,
            )
            .await?;

        let tar_bytes = archive::wrap_file(name, content)?;
        self.inner
            .driver
            .archive_put(container, parent, tar_bytes)
            .await?;
        Ok(content.len())
    }

    /// Long-form directory listing, hidden entries included, as produced
    /// by the container's own `ls`.
    pub async fn file_list(&self, container: &ContainerHandle, path: &str) -> Result<String> {
        let argv = vec!["ls".to_string(), "-la".to_string(), path.to_string()];
        let output = self
            .inner
            .driver
            .exec(container, argv, None, self.inner.config.exec_timeout)
            .await?;

        if output.exit_code != 0 {
            return Err(Error::ListFailed {
                path: path.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// Clip one decoded stream to `cap` bytes (on a char boundary) and mark
// it. Output at exactly the cap is left alone.
fn clip_output(mut text: String, cap: usize) -> (String, bool) {
    if text.len() <= cap {
        return (text, false);
    }
    let mut end = cap;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str(TRUNCATION_MARKER);
    (text, true)
}
