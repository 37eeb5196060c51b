//! Per-request context extraction.
//!
//! A middleware reads credential-bearing headers off every inbound
//! request and stores a [`RequestContext`] in the request's extensions.
//! Tool handlers receive the context as an explicit argument from the
//! dispatch layer, so one request's values are unreachable from any
//! other request, and everything is torn down with the request itself.

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use mcp::RequestContext;

pub async fn attach_request_context(mut request: Request, next: Next) -> Response {
    let context = context_from_headers(request.headers());
    request.extensions_mut().insert(context);
    next.run(request).await
}

fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    let header = |name: &str| -> Option<String> {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    // `Authorization: Bearer <x>` is the fallback credential when no
    // dedicated Graph header is present.
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .get(..7)
                .filter(|prefix| prefix.eq_ignore_ascii_case("bearer "))
                .map(|_| value[7..].trim().to_string())
        })
        .filter(|token| !token.is_empty());

    RequestContext {
        graph_token: header("x-microsoft-graph-token")
            .or_else(|| header("x-graph-token"))
            .or(bearer),
        github_username: header("x-github-username"),
        request_id: header("x-request-id"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn dedicated_graph_header_wins_over_alias_and_bearer() {
        let context = context_from_headers(&headers(&[
            ("authorization", "Bearer fallback"),
            ("x-graph-token", "alias"),
            ("x-microsoft-graph-token", "preferred"),
        ]));
        assert_eq!(context.graph_token.as_deref(), Some("preferred"));
    }

    #[test]
    fn alias_header_beats_the_bearer_fallback() {
        let context = context_from_headers(&headers(&[
            ("authorization", "Bearer fallback"),
            ("x-graph-token", "alias"),
        ]));
        assert_eq!(context.graph_token.as_deref(), Some("alias"));
    }

    #[test]
    fn bearer_fallback_is_case_insensitive_and_trimmed() {
        let context =
            context_from_headers(&headers(&[("authorization", "bearer  tok-123 ")]));
        assert_eq!(context.graph_token.as_deref(), Some("tok-123"));

        // Non-bearer schemes are not credentials for tools.
        let context = context_from_headers(&headers(&[("authorization", "Basic abc")]));
        assert_eq!(context.graph_token, None);
    }

    #[test]
    fn user_and_request_id_headers_bind_directly() {
        let context = context_from_headers(&headers(&[
            ("x-github-username", "octocat"),
            ("x-request-id", "r-42"),
        ]));
        assert_eq!(context.github_username.as_deref(), Some("octocat"));
        assert_eq!(context.request_id.as_deref(), Some("r-42"));
    }

    #[test]
    fn absent_and_empty_headers_bind_nothing() {
        let context = context_from_headers(&headers(&[("x-request-id", "  ")]));
        assert_eq!(context, RequestContext::default());
    }
}
