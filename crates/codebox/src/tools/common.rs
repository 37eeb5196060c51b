//! Shared helpers for the third-party API tool wrappers.

use anyhow::Context as _;
use mcp::RequestContext;

pub(crate) const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub(crate) const GITHUB_BASE_URL: &str = "https://api.github.com";

/// Resolve a Microsoft Graph bearer token: explicit argument, then the
/// request context, then the process environment.
pub(crate) fn resolve_graph_token(
    explicit: Option<&str>,
    context: &RequestContext,
) -> anyhow::Result<String> {
    if let Some(token) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    if let Some(token) = context.graph_token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    for var in ["MICROSOFT_GRAPH_TOKEN", "GRAPH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.is_empty() {
                return Ok(token);
            }
        }
    }
    anyhow::bail!(
        "Microsoft Graph token is required. Provide the token argument, send an \
         X-Microsoft-Graph-Token header, or set MICROSOFT_GRAPH_TOKEN/GRAPH_TOKEN."
    )
}

/// GET a JSON payload, failing on non-success statuses.
pub(crate) async fn get_json(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    bearer: Option<&str>,
    accept: Option<&str>,
) -> anyhow::Result<serde_json::Value> {
    let mut request = http.get(url);
    if !query.is_empty() {
        request = request.query(query);
    }
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    if let Some(accept) = accept {
        request = request.header(reqwest::header::ACCEPT, accept);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("request to {url} failed with status {status}");
    }
    response
        .json()
        .await
        .with_context(|| format!("decoding response from {url}"))
}

/// Collect Graph-style paginated resources: `value` arrays chained by
/// `@odata.nextLink`, up to `max_pages`.
pub(crate) async fn collect_graph_values(
    http: &reqwest::Client,
    first_url: String,
    token: &str,
    max_pages: usize,
) -> anyhow::Result<Vec<serde_json::Value>> {
    let mut results = Vec::new();
    let mut next = Some(first_url);
    let mut page = 0;

    while let Some(url) = next {
        if page >= max_pages {
            break;
        }
        let payload = get_json(http, &url, &[], Some(token), None).await?;
        if let Some(items) = payload.get("value").and_then(|v| v.as_array()) {
            results.extend(items.iter().cloned());
        }
        next = payload
            .get("@odata.nextLink")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        page += 1;
    }

    Ok(results)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn explicit_token_wins_over_context() {
        let context = RequestContext {
            graph_token: Some("from-header".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_graph_token(Some("explicit"), &context).unwrap(),
            "explicit"
        );
        assert_eq!(resolve_graph_token(None, &context).unwrap(), "from-header");
        // Blank arguments do not shadow the context.
        assert_eq!(
            resolve_graph_token(Some("  "), &context).unwrap(),
            "from-header"
        );
    }

    #[test]
    fn exhausted_sources_name_every_expected_source() {
        let err = resolve_graph_token(None, &RequestContext::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("token is required"));
        assert!(message.contains("X-Microsoft-Graph-Token"));
        assert!(message.contains("MICROSOFT_GRAPH_TOKEN"));
    }
}
