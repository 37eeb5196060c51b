//! Tool implementations and surface assembly.
//!
//! Two surfaces exist: the full set (code execution + sandbox file
//! tools + third-party API tools) and a restricted set carrying the
//! third-party API tools only.

use std::sync::Arc;

use mcp::ToolRegistry;
use sandbox::SandboxPool;

mod common;
mod execute_code;
mod file_ops;
mod github;
mod graph;

const FULL_INSTRUCTIONS: &str = "This server provides sandboxed code execution. \
    Use the execute_code tool to run Python, Bash, or Node.js code in an isolated \
    Docker container with network access. It has no access to the host system and \
    all file operations are confined to the /workspace directory. Use the sandbox \
    file tools (sandbox_read_file, sandbox_write_file, sandbox_list_files) to \
    interact with the /workspace directory inside the sandbox.";

const RESTRICTED_INSTRUCTIONS: &str = "This server does not expose code execution \
    tools. Use the /mcp endpoint for code execution and sandbox file operations.";

/// The full tool surface, mounted at `/mcp`.
pub fn full_registry(pool: Arc<SandboxPool>, http: reqwest::Client) -> ToolRegistry {
    let mut registry = ToolRegistry::new("codebox", FULL_INSTRUCTIONS);
    execute_code::register(&mut registry, pool.clone());
    file_ops::register(&mut registry, pool);
    github::register(&mut registry, http.clone());
    graph::register(&mut registry, http);
    registry
}

/// The restricted surface, mounted at `/mcp-no-code-execute`: no code
/// execution, no sandbox file I/O.
pub fn restricted_registry(http: reqwest::Client) -> ToolRegistry {
    let mut registry = ToolRegistry::new("codebox-no-execute", RESTRICTED_INSTRUCTIONS);
    github::register(&mut registry, http.clone());
    graph::register(&mut registry, http);
    registry
}
