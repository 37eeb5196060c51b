//! Sandboxed code execution on a pool of pre-warmed Docker containers.
//!
//! The pool owns a fixed set of containers created at startup. Callers
//! acquire a container, run code or move files through it, and the
//! container returns to the idle queue when the guard drops. `/workspace`
//! is the only writable surface exposed to callers, and every
//! caller-supplied path is validated against it before any container
//! operation runs.

pub mod archive;
mod driver;
mod guard;
mod language;
mod pool;

pub use driver::{ContainerHandle, ContainerSpec, DockerDriver, ExecOutput};
pub use guard::workspace_path;
pub use language::{language_command, supported_languages};
pub use pool::{CodeExecResult, PoolConfig, PooledContainer, SandboxPool};

/// The single writable directory visible to sandbox callers.
pub const WORKSPACE: &str = "/workspace";

/// Marker appended to an output stream that was clipped at the
/// configured cap.
pub const TRUNCATION_MARKER: &str = "... [output truncated]";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file not found in sandbox: {0}")]
    NotFound(String),
    #[error("path is a directory: {0}")]
    IsDirectory(String),
    #[error("cannot list path: {path}: {detail}")]
    ListFailed { path: String, detail: String },
    #[error("path '{0}' resolves outside the sandbox workspace. All paths must be within /workspace.")]
    Traversal(String),
    #[error("sandbox pool is shut down")]
    PoolClosed,
    #[error("failed to pull image '{image}': {detail}")]
    ImagePull { image: String, detail: String },
    #[error(transparent)]
    Docker(#[from] bollard::errors::Error),
    #[error("failed to {0} archive")]
    Archive(&'static str, #[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
