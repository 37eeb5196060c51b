//! The codebox service: a sandboxed code-execution tool surface for LLM
//! agents, plus an authenticating proxy for third-party APIs.
//!
//! One HTTP server carries everything: the full tool surface at `/mcp`,
//! a restricted surface without code execution at
//! `/mcp-no-code-execute`, the credential proxy under `/graph` and
//! `/github`, and the `/health` and `/tools` conveniences.

use std::sync::Arc;

use anyhow::Context as _;
use axum::routing::get;
use axum::{Json, Router};
use mcp::ToolRegistry;

mod config;
pub mod context;
mod logging;
pub mod tools;

pub use config::Cli;
pub use logging::{init_logging, LogArgs};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    // Bind our port before we do anything expensive.
    let addr = format!("{}:{}", cli.mcp_host, cli.mcp_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    let driver = sandbox::DockerDriver::connect().context("connecting to the container runtime")?;
    let pool = Arc::new(sandbox::SandboxPool::new(driver, cli.pool_config()));

    // A bad store URL is fatal here; an unreachable store only fails the
    // proxied requests that need it.
    let store = credential_proxy::RedisStore::open(&cli.redis_url)?;
    let proxy = credential_proxy::routes(
        Arc::new(store),
        credential_proxy::ProxyConfig {
            github_token: cli.github_token.clone(),
            upstream_timeout: cli.upstream_timeout,
            ..Default::default()
        },
    )?;

    let http = reqwest::Client::builder()
        .timeout(cli.upstream_timeout)
        .build()
        .context("building http client")?;
    let full = Arc::new(tools::full_registry(pool.clone(), http.clone()));
    let restricted = Arc::new(tools::restricted_registry(http));

    let mcp_url = format!("http://{addr}/mcp");
    let app = router(full, restricted, proxy, mcp_url.clone());

    tracing::info!(
        image = %cli.sandbox_image,
        pool_size = cli.pool_size,
        "starting sandbox pool"
    );
    pool.start().await.context("starting sandbox pool")?;

    tracing::info!(url = %mcp_url, "tool surface ready");
    tracing::info!(url = %format!("http://{addr}/mcp-no-code-execute"), "restricted surface ready");

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tracing::info!("shutting down sandbox pool");
    pool.shutdown().await;

    serve_result.context("serving")
}

/// Assemble the service router. The request-context middleware wraps
/// every route, so tool handlers on both surfaces observe exactly the
/// headers of the request they serve.
pub fn router(
    full: Arc<ToolRegistry>,
    restricted: Arc<ToolRegistry>,
    proxy: Router,
    mcp_url: String,
) -> Router {
    let enumerated = full.clone();

    Router::new()
        .merge(mcp::routes("/mcp", full))
        .merge(mcp::routes("/mcp-no-code-execute", restricted))
        .merge(proxy)
        .route(
            "/health",
            get(move || {
                let mcp_url = mcp_url.clone();
                async move { Json(serde_json::json!({"status": "ok", "mcp_url": mcp_url})) }
            }),
        )
        .route(
            "/tools",
            get(move || {
                let registry = enumerated.clone();
                async move {
                    let tools: Vec<serde_json::Value> = registry
                        .descriptors()
                        .into_iter()
                        .map(|tool| {
                            serde_json::json!({
                                "name": tool.name,
                                "description": tool.description,
                                "parameters": tool.input_schema,
                            })
                        })
                        .collect();
                    Json(serde_json::json!({ "tools": tools }))
                }
            }),
        )
        .layer(axum::middleware::from_fn(context::attach_request_context))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

// Gracefully exit on either SIGINT (ctrl-c) or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigint = signal(SignalKind::interrupt()).expect("installing SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
    tokio::select! {
        _ = sigint.recv() => (),
        _ = sigterm.recv() => (),
    }
    tracing::info!("caught signal to exit");
}
