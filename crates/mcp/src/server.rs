use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde_json::json;

use crate::context::RequestContext;
use crate::protocol::{
    CallToolRequestParams, Implementation, InitializeResult, JSONRPCMessage, JSONRPCRequest,
    ListToolsResult, RequestId, ServerCapabilities, ToolsCapability, INVALID_PARAMS,
    JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::registry::ToolRegistry;

/// Mount one registry at `path` (and `path/`), POST only. Each request
/// is decoded, dispatched, and answered with a single JSON payload; the
/// surface holds no session state.
pub fn routes(path: &str, registry: Arc<ToolRegistry>) -> Router {
    Router::new()
        .route(path, post(handle))
        .route(&format!("{path}/"), post(handle))
        .with_state(registry)
}

async fn handle(
    State(registry): State<Arc<ToolRegistry>>,
    context: Option<Extension<RequestContext>>,
    body: axum::body::Bytes,
) -> Response {
    let context = context.map(|Extension(c)| c).unwrap_or_default();

    let message: JSONRPCMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(error_body(None, PARSE_ERROR, &err.to_string())),
            )
                .into_response();
        }
    };

    match message {
        // Notifications produce no payload; acknowledge receipt.
        JSONRPCMessage::Notification(notification) => {
            tracing::debug!(method = %notification.method, "notification received");
            StatusCode::ACCEPTED.into_response()
        }
        JSONRPCMessage::Request(request) => {
            Json(handle_request(&registry, &context, request).await).into_response()
        }
    }
}

async fn handle_request(
    registry: &ToolRegistry,
    context: &RequestContext,
    request: JSONRPCRequest,
) -> serde_json::Value {
    let JSONRPCRequest {
        id, method, params, ..
    } = request;

    match method.as_str() {
        "initialize" => {
            let result = InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability {
                        list_changed: false,
                    }),
                },
                server_info: Implementation {
                    name: registry.server_name().to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                instructions: Some(registry.instructions().to_string()),
            };
            result_body(id, serde_json::to_value(result).expect("serializes"))
        }
        "ping" => result_body(id, json!({})),
        "tools/list" => {
            let result = ListToolsResult {
                tools: registry.descriptors(),
            };
            result_body(id, serde_json::to_value(result).expect("serializes"))
        }
        "tools/call" => {
            let params: CallToolRequestParams =
                match serde_json::from_value(params.unwrap_or(serde_json::Value::Null)) {
                    Ok(params) => params,
                    Err(err) => {
                        return error_body(
                            Some(id),
                            INVALID_PARAMS,
                            &format!("invalid tools/call params: {err}"),
                        );
                    }
                };
            let result = registry.dispatch(params, context).await;
            result_body(id, serde_json::to_value(result).expect("serializes"))
        }
        other => error_body(
            Some(id),
            METHOD_NOT_FOUND,
            &format!("method not found: {other}"),
        ),
    }
}

fn result_body(id: RequestId, result: serde_json::Value) -> serde_json::Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

fn error_body(id: Option<RequestId>, code: i64, message: &str) -> serde_json::Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": code,
            "message": message,
        },
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::{input_schema_for, parse_arguments, ToolHandler};
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    #[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
    struct ShoutParams {
        message: String,
    }

    struct Shout;

    #[async_trait::async_trait]
    impl ToolHandler for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }
        fn description(&self) -> &'static str {
            "Uppercase a message."
        }
        fn input_schema(&self) -> serde_json::Value {
            input_schema_for::<ShoutParams>()
        }
        async fn call(
            &self,
            arguments: serde_json::Value,
            _context: &RequestContext,
        ) -> anyhow::Result<String> {
            let params: ShoutParams = parse_arguments(self.name(), arguments)?;
            Ok(params.message.to_uppercase())
        }
    }

    fn test_routes() -> Router {
        let mut registry = ToolRegistry::new("test-server", "instructions");
        registry.register(Arc::new(Shout));
        routes("/mcp", Arc::new(registry))
    }

    async fn post_json(router: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::post("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn initialize_reports_capabilities_and_instructions() {
        let (status, body) = post_json(
            test_routes(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "capabilities": {},
                "clientInfo": {"name": "c", "version": "0"},
                "protocolVersion": PROTOCOL_VERSION,
            }}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], json!(1));
        assert_eq!(body["result"]["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(body["result"]["serverInfo"]["name"], json!("test-server"));
        assert_eq!(body["result"]["instructions"], json!("instructions"));
    }

    #[tokio::test]
    async fn tools_call_returns_a_single_payload() {
        let (status, body) = post_json(
            test_routes(),
            json!({"jsonrpc": "2.0", "id": "call-1", "method": "tools/call", "params": {
                "name": "shout",
                "arguments": {"message": "hi"},
            }}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["result"],
            json!({
                "content": [{"type": "text", "text": "HI"}],
                "isError": false,
            })
        );
    }

    #[tokio::test]
    async fn tools_list_enumerates_the_surface() {
        let (_, body) = post_json(
            test_routes(),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        )
        .await;
        assert_eq!(body["result"]["tools"][0]["name"], json!("shout"));
        assert!(body["result"]["tools"][0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn notification_is_acknowledged_without_payload() {
        let (status, body) = post_json(
            test_routes(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn unknown_method_and_malformed_body_are_rpc_errors() {
        let (status, body) = post_json(
            test_routes(),
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], json!(METHOD_NOT_FOUND));

        let response = test_routes()
            .oneshot(
                Request::post("/mcp")
                    .body(Body::from("this is not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn trailing_slash_serves_the_same_surface() {
        let response = test_routes()
            .oneshot(
                Request::post("/mcp/")
                    .body(Body::from(
                        json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_is_not_allowed() {
        let response = test_routes()
            .oneshot(Request::get("/mcp").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
