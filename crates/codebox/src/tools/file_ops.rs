//! File I/O tools over the sandbox workspace.
//!
//! Every path is validated against `/workspace` before a container is
//! touched; the acquire → operate → release envelope is the guard's
//! drop, so containers come back on every exit path.

use std::sync::Arc;

use mcp::{input_schema_for, parse_arguments, RequestContext, ToolHandler, ToolRegistry};
use sandbox::{workspace_path, SandboxPool, WORKSPACE};

pub fn register(registry: &mut ToolRegistry, pool: Arc<SandboxPool>) {
    registry.register(Arc::new(ReadFile { pool: pool.clone() }));
    registry.register(Arc::new(WriteFile { pool: pool.clone() }));
    registry.register(Arc::new(ListFiles { pool }));
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct ReadFileParams {
    /// File path, relative to /workspace or absolute within it.
    path: String,
}

struct ReadFile {
    pool: Arc<SandboxPool>,
}

#[async_trait::async_trait]
impl ToolHandler for ReadFile {
    fn name(&self) -> &'static str {
        "sandbox_read_file"
    }

    fn description(&self) -> &'static str {
        "Read a file from the sandbox's /workspace directory and return its \
         contents as text."
    }

    fn input_schema(&self) -> serde_json::Value {
        input_schema_for::<ReadFileParams>()
    }

    async fn call(
        &self,
        arguments: serde_json::Value,
        _context: &RequestContext,
    ) -> anyhow::Result<String> {
        let params: ReadFileParams = parse_arguments(self.name(), arguments)?;
        let resolved = workspace_path(&params.path)?;

        let container = self.pool.acquire().await?;
        tracing::debug!(container = %container.short_id, path = %resolved, "reading file");
        let content = self.pool.file_read(&container, &resolved).await?;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct WriteFileParams {
    /// File path, relative to /workspace or absolute within it. Parent
    /// directories are created as needed.
    path: String,
    /// Text content to write.
    content: String,
}

struct WriteFile {
    pool: Arc<SandboxPool>,
}

#[async_trait::async_trait]
impl ToolHandler for WriteFile {
    fn name(&self) -> &'static str {
        "sandbox_write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file in the sandbox's /workspace directory, creating \
         parent directories as needed."
    }

    fn input_schema(&self) -> serde_json::Value {
        input_schema_for::<WriteFileParams>()
    }

    async fn call(
        &self,
        arguments: serde_json::Value,
        _context: &RequestContext,
    ) -> anyhow::Result<String> {
        let params: WriteFileParams = parse_arguments(self.name(), arguments)?;
        let resolved = workspace_path(&params.path)?;

        let container = self.pool.acquire().await?;
        tracing::debug!(container = %container.short_id, path = %resolved, "writing file");
        let written = self
            .pool
            .file_write(&container, &resolved, params.content.as_bytes())
            .await?;
        Ok(format!("Wrote {written} bytes to {resolved}"))
    }
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct ListFilesParams {
    /// Directory path, within /workspace.
    #[serde(default = "default_list_path")]
    path: String,
}

fn default_list_path() -> String {
    WORKSPACE.to_string()
}

struct ListFiles {
    pool: Arc<SandboxPool>,
}

#[async_trait::async_trait]
impl ToolHandler for ListFiles {
    fn name(&self) -> &'static str {
        "sandbox_list_files"
    }

    fn description(&self) -> &'static str {
        "List directory contents inside the sandbox (long form, hidden entries \
         included). Defaults to /workspace."
    }

    fn input_schema(&self) -> serde_json::Value {
        input_schema_for::<ListFilesParams>()
    }

    async fn call(
        &self,
        arguments: serde_json::Value,
        _context: &RequestContext,
    ) -> anyhow::Result<String> {
        let params: ListFilesParams = parse_arguments(self.name(), arguments)?;
        let resolved = workspace_path(&params.path)?;

        let container = self.pool.acquire().await?;
        tracing::debug!(container = %container.short_id, path = %resolved, "listing directory");
        let listing = self.pool.file_list(&container, &resolved).await?;
        Ok(listing)
    }
}
