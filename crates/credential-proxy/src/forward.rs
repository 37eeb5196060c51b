use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;

use crate::store::CredentialStore;

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const GITHUB_BASE_URL: &str = "https://api.github.com";

const PROXY_ID_HEADER: &str = "x-proxy-id";

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream base for `/graph/...`, no trailing slash.
    pub graph_base: String,
    /// Upstream base for `/github/...`, no trailing slash.
    pub github_base: String,
    /// Optional fixed token attached to GitHub requests; without it the
    /// public API is used unauthenticated.
    pub github_token: Option<String>,
    /// Single timeout applied to every forwarded request.
    pub upstream_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            graph_base: GRAPH_BASE_URL.to_string(),
            github_base: GITHUB_BASE_URL.to_string(),
            github_token: None,
            upstream_timeout: Duration::from_secs(30),
        }
    }
}

struct ProxyState {
    client: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    config: ProxyConfig,
}

/// Routes for both upstreams, GET and POST.
pub fn routes(store: Arc<dyn CredentialStore>, config: ProxyConfig) -> anyhow::Result<Router> {
    let client = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()?;
    let state = Arc::new(ProxyState {
        client,
        store,
        config,
    });
    Ok(Router::new()
        .route("/graph/*path", any(graph))
        .route("/github/*path", any(github))
        .with_state(state))
}

/// Forward to Microsoft Graph, swapping the caller's opaque id for the
/// bearer credential bound to it.
#[tracing::instrument(skip_all, fields(%method, %path))]
async fn graph(
    State(state): State<Arc<ProxyState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !matches!(method, Method::GET | Method::POST) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let Some(proxy_id) = headers
        .get(PROXY_ID_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return (StatusCode::UNAUTHORIZED, "unknown request, cannot continue!").into_response();
    };

    let token = match state.store.get(proxy_id).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            return (StatusCode::UNAUTHORIZED, "invalid proxy ID, cannot continue!")
                .into_response();
        }
        Err(err) => {
            // Nothing of the original request leaks into this reply.
            tracing::error!(error = %err, "credential store lookup failed");
            return (StatusCode::SERVICE_UNAVAILABLE, "credential store unavailable")
                .into_response();
        }
    };

    let mut outbound: Vec<(&str, String)> = vec![("authorization", format!("Bearer {token}"))];
    if let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        outbound.push(("content-type", content_type.to_string()));
    }

    forward(
        &state,
        method,
        &state.config.graph_base,
        &path,
        query,
        outbound,
        body,
    )
    .await
}

/// Forward to the GitHub API. No opaque-id lookup: a fixed accept
/// header, plus the configured token when present.
#[tracing::instrument(skip_all, fields(%method, %path))]
async fn github(
    State(state): State<Arc<ProxyState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !matches!(method, Method::GET | Method::POST) {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let mut outbound: Vec<(&str, String)> =
        vec![("accept", "application/vnd.github.v3+json".to_string())];
    if let Some(token) = &state.config.github_token {
        outbound.push(("authorization", format!("Bearer {token}")));
    }
    if let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        outbound.push(("content-type", content_type.to_string()));
    }

    forward(
        &state,
        method,
        &state.config.github_base,
        &path,
        query,
        outbound,
        body,
    )
    .await
}

// Rebuild the request against the upstream base and relay status,
// content-type, and body bytes back unchanged. Responses are never
// cached, and header values are never logged.
async fn forward(
    state: &ProxyState,
    method: Method,
    base: &str,
    path: &str,
    query: Option<String>,
    headers: Vec<(&str, String)>,
    body: Bytes,
) -> Response {
    let mut target = format!("{}/{}", base.trim_end_matches('/'), path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target = format!("{target}?{query}");
    }
    tracing::info!(method = %method, url = %target, "forwarding upstream request");

    // The server and client stacks disagree on http crate versions, so
    // methods convert through their byte representation.
    let outbound_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .expect("inbound method is valid");

    let mut request = state.client.request(outbound_method, &target);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    if !body.is_empty() {
        request = request.body(body);
    }

    let upstream = match request.send().await {
        Ok(upstream) => upstream,
        Err(err) if err.is_timeout() => {
            return (StatusCode::GATEWAY_TIMEOUT, "upstream request timed out").into_response();
        }
        Err(err) => {
            tracing::warn!(error = %err, "upstream request failed");
            return (StatusCode::BAD_GATEWAY, "upstream request failed").into_response();
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| HeaderValue::from_bytes(value.as_bytes()).ok());

    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(err) if err.is_timeout() => {
            return (StatusCode::GATEWAY_TIMEOUT, "upstream request timed out").into_response();
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed reading upstream body");
            return (StatusCode::BAD_GATEWAY, "upstream request failed").into_response();
        }
    };

    let mut response = Response::builder().status(status);
    if let Some(content_type) = content_type {
        response = response.header(CONTENT_TYPE, content_type);
    }
    response
        .body(axum::body::Body::from(bytes))
        .expect("static response parts are valid")
}
