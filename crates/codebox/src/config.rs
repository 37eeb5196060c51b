use std::time::Duration;

use clap::Parser;

use crate::logging::LogArgs;

/// Sandboxed code execution service for LLM agents.
///
/// Serves a streaming JSON-RPC tool surface backed by a pool of
/// pre-warmed Docker containers, plus an authenticating proxy for
/// third-party APIs.
#[derive(Debug, Parser)]
#[command(about, version)]
pub struct Cli {
    /// Container image used for sandbox containers.
    #[arg(long, default_value = "python:3.12-slim", env = "SANDBOX_IMAGE")]
    pub sandbox_image: String,

    /// Number of pre-warmed sandbox containers.
    #[arg(long, default_value_t = 2, env = "POOL_SIZE")]
    pub pool_size: usize,

    /// Default per-execution timeout. Accepts bare seconds ("30") or a
    /// humantime duration ("2min").
    #[arg(long, default_value = "30", env = "EXEC_TIMEOUT", value_parser = parse_duration)]
    pub exec_timeout: Duration,

    /// Per-stream output cap in bytes; longer output is clipped and
    /// marked as truncated.
    #[arg(long, default_value_t = 50_000, env = "MAX_OUTPUT_SIZE")]
    pub max_output_size: usize,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0", env = "MCP_HOST")]
    pub mcp_host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000, env = "MCP_PORT")]
    pub mcp_port: u16,

    /// Memory cap per container, docker-style ("256m", "1g").
    #[arg(long, default_value = "256m", env = "CONTAINER_MEMORY_LIMIT", value_parser = parse_memory_limit)]
    pub container_memory_limit: i64,

    /// CPU cap per container as a fraction of one core.
    #[arg(long, default_value_t = 1.0, env = "CONTAINER_CPU_LIMIT")]
    pub container_cpu_limit: f64,

    /// Connection URL of the credential KV store.
    #[arg(long, default_value = "redis://127.0.0.1:6379/0", env = "REDIS_URL")]
    pub redis_url: String,

    /// Optional token attached to proxied GitHub requests; without it
    /// the public API is used unauthenticated.
    #[arg(long, env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,

    /// Timeout applied to every forwarded upstream request.
    #[arg(long, default_value = "30", env = "UPSTREAM_TIMEOUT", value_parser = parse_duration)]
    pub upstream_timeout: Duration,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Cli {
    pub fn pool_config(&self) -> sandbox::PoolConfig {
        sandbox::PoolConfig {
            image: self.sandbox_image.clone(),
            pool_size: self.pool_size,
            exec_timeout: self.exec_timeout,
            max_output_size: self.max_output_size,
            memory_bytes: self.container_memory_limit,
            cpu_limit: self.container_cpu_limit,
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    if let Ok(seconds) = value.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }
    humantime::parse_duration(value).map_err(|err| err.to_string())
}

// Docker-style memory strings: a number with an optional b/k/m/g suffix,
// case-insensitive, powers of 1024.
fn parse_memory_limit(value: &str) -> Result<i64, String> {
    let value = value.trim();
    let split = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let (digits, suffix) = value.split_at(split);
    let number: i64 = digits
        .parse()
        .map_err(|_| format!("invalid memory limit '{value}'"))?;
    let multiplier: i64 = match suffix.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        _ => return Err(format!("invalid memory limit '{value}'")),
    };
    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("memory limit '{value}' overflows"))
}
