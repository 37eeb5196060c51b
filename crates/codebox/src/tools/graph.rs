//! Microsoft Graph tool wrappers.
//!
//! Each tool resolves its bearer token from the explicit argument, the
//! request context, or the environment, and returns pretty-printed JSON
//! text for the model to read.

use std::sync::Arc;

use mcp::{input_schema_for, parse_arguments, RequestContext, ToolHandler, ToolRegistry};

use super::common::{collect_graph_values, get_json, resolve_graph_token, GRAPH_BASE_URL};

pub fn register(registry: &mut ToolRegistry, http: reqwest::Client) {
    registry.register(Arc::new(GetUserInformation {
        http: http.clone(),
        base: GRAPH_BASE_URL.to_string(),
    }));
    for &(name, description, path) in LIST_TOOLS {
        registry.register(Arc::new(GraphList {
            name,
            description,
            path,
            http: http.clone(),
            base: GRAPH_BASE_URL.to_string(),
        }));
    }
}

const LIST_TOOLS: &[(&str, &str, &str)] = &[
    (
        "list_user_mail_folders",
        "List the signed-in user's mail folders.",
        "/me/mailFolders",
    ),
    (
        "list_mailbox_messages",
        "List messages in the signed-in user's mailbox, newest first.",
        "/me/messages",
    ),
    (
        "list_user_meetings",
        "List events on the signed-in user's calendar.",
        "/me/events",
    ),
    (
        "list_user_chats",
        "List the signed-in user's Teams chats.",
        "/me/chats",
    ),
    (
        "list_joined_teams",
        "List the Teams the signed-in user is a member of.",
        "/me/joinedTeams",
    ),
];

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct GraphParams {
    /// Explicit bearer token; falls back to request headers, then the
    /// environment.
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct GraphListParams {
    /// Explicit bearer token; falls back to request headers, then the
    /// environment.
    #[serde(default)]
    token: Option<String>,
    /// Maximum pages to traverse.
    #[serde(default = "default_max_pages")]
    max_pages: usize,
}

fn default_max_pages() -> usize {
    10
}

/// GET /me: profile of the signed-in user.
struct GetUserInformation {
    http: reqwest::Client,
    base: String,
}

#[async_trait::async_trait]
impl ToolHandler for GetUserInformation {
    fn name(&self) -> &'static str {
        "get_user_information"
    }

    fn description(&self) -> &'static str {
        "Get profile information for the signed-in Microsoft Graph user."
    }

    fn input_schema(&self) -> serde_json::Value {
        input_schema_for::<GraphParams>()
    }

    async fn call(
        &self,
        arguments: serde_json::Value,
        context: &RequestContext,
    ) -> anyhow::Result<String> {
        let params: GraphParams = parse_arguments(self.name(), arguments)?;
        let token = resolve_graph_token(params.token.as_deref(), context)?;

        let url = format!("{}/me", self.base);
        let payload = get_json(&self.http, &url, &[], Some(&token), None).await?;
        Ok(serde_json::to_string_pretty(&payload)?)
    }
}

/// A Graph collection endpoint surfaced as one list tool.
struct GraphList {
    name: &'static str,
    description: &'static str,
    path: &'static str,
    http: reqwest::Client,
    base: String,
}

#[async_trait::async_trait]
impl ToolHandler for GraphList {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn input_schema(&self) -> serde_json::Value {
        input_schema_for::<GraphListParams>()
    }

    async fn call(
        &self,
        arguments: serde_json::Value,
        context: &RequestContext,
    ) -> anyhow::Result<String> {
        let params: GraphListParams = parse_arguments(self.name, arguments)?;
        let token = resolve_graph_token(params.token.as_deref(), context)?;

        let first_url = format!("{}{}", self.base, self.path);
        let values =
            collect_graph_values(&self.http, first_url, &token, params.max_pages).await?;
        Ok(serde_json::to_string_pretty(&serde_json::Value::Array(
            values,
        ))?)
    }
}
