use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context as _;
use serde::de::DeserializeOwned;

use crate::context::RequestContext;
use crate::protocol::{CallToolRequestParams, CallToolResult, Tool};

/// One invokable tool: a name, a human description, a parameter schema,
/// and the async handler itself.
///
/// Handlers return the tool's text payload. A returned error becomes an
/// `isError` result whose text keeps the stable `Error` prefix, so
/// LLM-side consumers can recognize failed calls either way.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> serde_json::Value;
    async fn call(
        &self,
        arguments: serde_json::Value,
        context: &RequestContext,
    ) -> anyhow::Result<String>;
}

/// A named, ordered set of tools mounted together on one endpoint.
pub struct ToolRegistry {
    server_name: &'static str,
    instructions: String,
    tools: BTreeMap<&'static str, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new(server_name: &'static str, instructions: impl Into<String>) -> Self {
        Self {
            server_name,
            instructions: instructions.into(),
            tools: BTreeMap::new(),
        }
    }

    pub fn server_name(&self) -> &'static str {
        self.server_name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) {
        let previous = self.tools.insert(tool.name(), tool);
        debug_assert!(previous.is_none(), "duplicate tool registration");
    }

    /// Descriptors for tools/list and the plain enumeration endpoint.
    pub fn descriptors(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|tool| Tool {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Route one tools/call to its handler. Never fails: unknown tools,
    /// rejected parameters, and handler errors all come back as
    /// `isError` results the caller can observe and react to.
    #[tracing::instrument(skip_all, fields(tool = %params.name))]
    pub async fn dispatch(
        &self,
        params: CallToolRequestParams,
        context: &RequestContext,
    ) -> CallToolResult {
        let Some(tool) = self.tools.get(params.name.as_str()) else {
            return CallToolResult::error(format!("Error: unknown tool '{}'", params.name));
        };

        let arguments = params
            .arguments
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));

        match tool.call(arguments, context).await {
            Ok(text) => CallToolResult::text(text),
            Err(err) => {
                tracing::warn!(tool = %params.name, error = ?err, "tool call failed");
                CallToolResult::error(format!("Error: {err:#}"))
            }
        }
    }
}

/// Deserialize a tool's arguments into its typed parameter struct,
/// reporting schema violations as a validation error rather than a
/// failure inside the handler.
pub fn parse_arguments<T: DeserializeOwned>(
    tool: &str,
    arguments: serde_json::Value,
) -> anyhow::Result<T> {
    serde_json::from_value(arguments)
        .with_context(|| format!("invalid parameters for tool '{tool}'"))
}

/// JSON Schema for a tool's parameter struct.
pub fn input_schema_for<T: schemars::JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).expect("schemas serialize to JSON")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::ContentBlock;
    use serde_json::json;

    #[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
    struct EchoParams {
        message: String,
    }

    struct Echo;

    #[async_trait::async_trait]
    impl ToolHandler for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn description(&self) -> &'static str {
            "Echo a message back."
        }
        fn input_schema(&self) -> serde_json::Value {
            input_schema_for::<EchoParams>()
        }
        async fn call(
            &self,
            arguments: serde_json::Value,
            context: &RequestContext,
        ) -> anyhow::Result<String> {
            let params: EchoParams = parse_arguments(self.name(), arguments)?;
            match &context.request_id {
                Some(id) => Ok(format!("{} ({id})", params.message)),
                None => Ok(params.message),
            }
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new("test-server", "test instructions");
        registry.register(Arc::new(Echo));
        registry
    }

    fn text_of(result: &CallToolResult) -> &str {
        let [ContentBlock::Text { text }] = result.content.as_slice() else {
            panic!("expected one text block");
        };
        text
    }

    #[tokio::test]
    async fn dispatch_routes_to_the_named_tool() {
        let result = registry()
            .dispatch(
                CallToolRequestParams {
                    name: "echo".to_string(),
                    arguments: Some(json!({"message": "hi"})),
                },
                &RequestContext::default(),
            )
            .await;
        assert!(!result.is_error);
        assert_eq!(text_of(&result), "hi");
    }

    #[tokio::test]
    async fn dispatch_sees_the_request_context() {
        let context = RequestContext {
            request_id: Some("r-1".to_string()),
            ..Default::default()
        };
        let result = registry()
            .dispatch(
                CallToolRequestParams {
                    name: "echo".to_string(),
                    arguments: Some(json!({"message": "hi"})),
                },
                &context,
            )
            .await;
        assert_eq!(text_of(&result), "hi (r-1)");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let result = registry()
            .dispatch(
                CallToolRequestParams {
                    name: "nope".to_string(),
                    arguments: None,
                },
                &RequestContext::default(),
            )
            .await;
        assert!(result.is_error);
        assert_eq!(text_of(&result), "Error: unknown tool 'nope'");
    }

    #[tokio::test]
    async fn schema_violation_surfaces_as_validation_error() {
        let result = registry()
            .dispatch(
                CallToolRequestParams {
                    name: "echo".to_string(),
                    arguments: Some(json!({"wrong": 1})),
                },
                &RequestContext::default(),
            )
            .await;
        assert!(result.is_error);
        assert!(
            text_of(&result).starts_with("Error: invalid parameters for tool 'echo'"),
            "got: {}",
            text_of(&result)
        );
    }

    #[test]
    fn descriptors_are_name_ordered_and_carry_schemas() {
        let registry = registry();
        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "echo");
        let schema = &descriptors[0].input_schema;
        assert_eq!(schema["type"], json!("object"));
        assert!(schema["properties"]["message"].is_object());
    }
}
