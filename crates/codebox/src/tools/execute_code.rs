//! Run code in a pooled sandbox container.

use std::sync::Arc;

use mcp::{input_schema_for, parse_arguments, RequestContext, ToolHandler, ToolRegistry};
use sandbox::{CodeExecResult, SandboxPool};

pub fn register(registry: &mut ToolRegistry, pool: Arc<SandboxPool>) {
    registry.register(Arc::new(ExecuteCode { pool }));
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct ExecuteCodeParams {
    /// The source code to execute.
    code: String,
    /// Programming language to use (python, bash, sh, node, javascript).
    #[serde(default = "default_language")]
    language: String,
}

fn default_language() -> String {
    "python".to_string()
}

struct ExecuteCode {
    pool: Arc<SandboxPool>,
}

#[async_trait::async_trait]
impl ToolHandler for ExecuteCode {
    fn name(&self) -> &'static str {
        "execute_code"
    }

    fn description(&self) -> &'static str {
        "Execute code in an isolated Docker sandbox with network access. The sandbox \
         has a /workspace directory for file operations. Supported languages: \
         python, bash, sh, node, javascript."
    }

    fn input_schema(&self) -> serde_json::Value {
        input_schema_for::<ExecuteCodeParams>()
    }

    // This tool never raises: anything that goes wrong lands in the
    // [stderr] section with a non-zero [exit_code], so the caller can
    // observe it and retry with corrective context.
    async fn call(
        &self,
        arguments: serde_json::Value,
        _context: &RequestContext,
    ) -> anyhow::Result<String> {
        let params: ExecuteCodeParams = parse_arguments(self.name(), arguments)?;
        tracing::info!(
            language = %params.language,
            code_length = params.code.len(),
            "execute_code request"
        );

        let result = match self.run(&params).await {
            Ok(result) => result,
            Err(err) => CodeExecResult {
                stdout: String::new(),
                stderr: format!("Error: {err:#}"),
                exit_code: 1,
                truncated: false,
            },
        };

        tracing::info!(
            exit_code = result.exit_code,
            truncated = result.truncated,
            "execute_code finished"
        );
        Ok(format_exec_result(&result))
    }
}

impl ExecuteCode {
    async fn run(&self, params: &ExecuteCodeParams) -> anyhow::Result<CodeExecResult> {
        let container = self.pool.acquire().await?;
        tracing::debug!(container = %container.short_id, "acquired container");
        let result = self
            .pool
            .exec_code(&container, &params.code, &params.language, None)
            .await?;
        Ok(result)
    }
}

/// Format a structured execution result as the multi-section text the
/// caller sees.
fn format_exec_result(result: &CodeExecResult) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !result.stdout.is_empty() {
        parts.push(format!("[stdout]\n{}", result.stdout));
    }
    if !result.stderr.is_empty() {
        parts.push(format!("[stderr]\n{}", result.stderr));
    }
    parts.push(format!("[exit_code] {}", result.exit_code));
    if result.truncated {
        parts.push("[note] Output was truncated due to size limits.".to_string());
    }
    parts.join("\n")
}
