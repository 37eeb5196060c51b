//! Wire types for the JSON-RPC dialect, camelCase on the wire.

use serde::{Deserialize, Serialize};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2025-06-18";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// JSON-RPC request ids may be integers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Integer(i64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JSONRPCRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JSONRPCNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// An inbound message: the presence of `id` separates requests from
/// notifications.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JSONRPCMessage {
    Request(JSONRPCRequest),
    Notification(JSONRPCNotification),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    pub list_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

/// A tool as enumerated to callers: name, description, and the JSON
/// Schema of its parameter object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolRequestParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
}

/// The single structured payload of a tool call, with a first-class
/// error marker alongside the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl CallToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserialize_initialize_request() {
        let raw = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "capabilities": {},
                "clientInfo": { "name": "acme-client", "version": "1.2.3" },
                "protocolVersion": "2025-06-18"
            }
        }"#;

        let msg: JSONRPCMessage = serde_json::from_str(raw).unwrap();
        let JSONRPCMessage::Request(request) = msg else {
            panic!("expected a request");
        };
        assert_eq!(request.id, RequestId::Integer(1));
        assert_eq!(request.method, "initialize");
        assert!(request.params.is_some());
    }

    #[test]
    fn message_without_id_is_a_notification() {
        let raw = r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#;
        let msg: JSONRPCMessage = serde_json::from_str(raw).unwrap();
        let JSONRPCMessage::Notification(notification) = msg else {
            panic!("expected a notification");
        };
        assert_eq!(notification.method, "notifications/initialized");
    }

    #[test]
    fn request_ids_round_trip_both_shapes() {
        let int: RequestId = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(int, RequestId::Integer(7));
        let string: RequestId = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(string, RequestId::String("abc".to_string()));
        assert_eq!(serde_json::to_value(&int).unwrap(), json!(7));
    }

    #[test]
    fn call_tool_result_wire_shape() {
        let result = CallToolResult::text("hi");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "content": [{"type": "text", "text": "hi"}],
                "isError": false,
            })
        );

        let result = CallToolResult::error("Error: nope");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "content": [{"type": "text", "text": "Error: nope"}],
                "isError": true,
            })
        );
    }

    #[test]
    fn call_params_tolerate_missing_arguments() {
        let params: CallToolRequestParams =
            serde_json::from_value(json!({"name": "execute_code"})).unwrap();
        assert_eq!(params.name, "execute_code");
        assert_eq!(params.arguments, None);
    }
}
