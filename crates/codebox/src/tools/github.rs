//! GitHub tool wrappers over the public API; no token required.

use std::sync::Arc;

use mcp::{input_schema_for, parse_arguments, RequestContext, ToolHandler, ToolRegistry};

use super::common::{get_json, GITHUB_BASE_URL};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

pub fn register(registry: &mut ToolRegistry, http: reqwest::Client) {
    registry.register(Arc::new(ListUserRepositories {
        http: http.clone(),
        base: GITHUB_BASE_URL.to_string(),
    }));
    registry.register(Arc::new(ListAuthoredSearch {
        name: "list_pull_requests_opened_by_user",
        description: "List pull requests authored by a GitHub user.",
        search_type: "pr",
        http: http.clone(),
        base: GITHUB_BASE_URL.to_string(),
    }));
    registry.register(Arc::new(ListAuthoredSearch {
        name: "list_issues_opened_by_user",
        description: "List issues opened by a GitHub user.",
        search_type: "issue",
        http,
        base: GITHUB_BASE_URL.to_string(),
    }));
}

fn resolve_username(explicit: Option<&str>, context: &RequestContext) -> anyhow::Result<String> {
    if let Some(username) = explicit.map(str::trim).filter(|u| !u.is_empty()) {
        return Ok(username.to_string());
    }
    if let Some(username) = context.github_username.as_deref().filter(|u| !u.is_empty()) {
        return Ok(username.to_string());
    }
    anyhow::bail!(
        "GitHub username is required. Provide the username argument or send an \
         X-GitHub-Username header."
    )
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct ListRepositoriesParams {
    /// GitHub username; falls back to the X-GitHub-Username header.
    #[serde(default)]
    username: Option<String>,
    /// Repository type filter: all, owner, or member.
    #[serde(default = "default_type_filter")]
    type_filter: String,
    /// Sort field: created, updated, pushed, or full_name.
    #[serde(default = "default_sort")]
    sort: String,
    /// Results per page, up to 100.
    #[serde(default = "default_per_page")]
    per_page: usize,
    /// Maximum pages to fetch.
    #[serde(default = "default_max_pages")]
    max_pages: usize,
}

fn default_type_filter() -> String {
    "owner".to_string()
}

fn default_sort() -> String {
    "updated".to_string()
}

fn default_per_page() -> usize {
    100
}

fn default_max_pages() -> usize {
    5
}

struct ListUserRepositories {
    http: reqwest::Client,
    base: String,
}

#[async_trait::async_trait]
impl ToolHandler for ListUserRepositories {
    fn name(&self) -> &'static str {
        "list_user_repositories"
    }

    fn description(&self) -> &'static str {
        "List public repositories owned by or associated with a GitHub user."
    }

    fn input_schema(&self) -> serde_json::Value {
        input_schema_for::<ListRepositoriesParams>()
    }

    async fn call(
        &self,
        arguments: serde_json::Value,
        context: &RequestContext,
    ) -> anyhow::Result<String> {
        let params: ListRepositoriesParams = parse_arguments(self.name(), arguments)?;
        let username = resolve_username(params.username.as_deref(), context)?;
        let per_page = params.per_page.clamp(1, 100);

        let url = format!("{}/users/{username}/repos", self.base);
        let mut repositories: Vec<serde_json::Value> = Vec::new();
        for page in 1..=params.max_pages.max(1) {
            let payload = get_json(
                &self.http,
                &url,
                &[
                    ("type", params.type_filter.clone()),
                    ("sort", params.sort.clone()),
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                ],
                None,
                Some(GITHUB_ACCEPT),
            )
            .await?;

            let Some(items) = payload.as_array() else {
                break;
            };
            repositories.extend(items.iter().cloned());
            if items.len() < per_page {
                break;
            }
        }

        Ok(serde_json::to_string_pretty(&serde_json::Value::Array(
            repositories,
        ))?)
    }
}

#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct ListAuthoredParams {
    /// GitHub username; falls back to the X-GitHub-Username header.
    #[serde(default)]
    username: Option<String>,
    /// Results per page, up to 100.
    #[serde(default = "default_per_page")]
    per_page: usize,
    /// Maximum pages to fetch.
    #[serde(default = "default_max_pages")]
    max_pages: usize,
}

/// Issue-search-backed listing of a user's authored PRs or issues.
struct ListAuthoredSearch {
    name: &'static str,
    description: &'static str,
    search_type: &'static str,
    http: reqwest::Client,
    base: String,
}

#[async_trait::async_trait]
impl ToolHandler for ListAuthoredSearch {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn input_schema(&self) -> serde_json::Value {
        input_schema_for::<ListAuthoredParams>()
    }

    async fn call(
        &self,
        arguments: serde_json::Value,
        context: &RequestContext,
    ) -> anyhow::Result<String> {
        let params: ListAuthoredParams = parse_arguments(self.name, arguments)?;
        let username = resolve_username(params.username.as_deref(), context)?;
        let per_page = params.per_page.clamp(1, 100);

        let url = format!("{}/search/issues", self.base);
        let mut items: Vec<serde_json::Value> = Vec::new();
        for page in 1..=params.max_pages.max(1) {
            let payload = get_json(
                &self.http,
                &url,
                &[
                    ("q", format!("type:{} author:{username}", self.search_type)),
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                ],
                None,
                Some(GITHUB_ACCEPT),
            )
            .await?;

            let Some(page_items) = payload.get("items").and_then(|v| v.as_array()) else {
                break;
            };
            items.extend(page_items.iter().cloned());
            if page_items.len() < per_page {
                break;
            }
        }

        Ok(serde_json::to_string_pretty(&serde_json::Value::Array(
            items,
        ))?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::extract::{Path, RawQuery};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn parse_query(query: Option<String>) -> std::collections::HashMap<String, String> {
        query
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.replace('+', " ")))
            .collect()
    }

    async fn spawn_github_fixture() -> String {
        async fn repos(
            Path(user): Path<String>,
            RawQuery(query): RawQuery,
        ) -> Json<serde_json::Value> {
            let query = parse_query(query);
            let page: usize = query["page"].parse().unwrap();
            // Two full pages of one repo each, then nothing.
            let per_page: usize = query["per_page"].parse().unwrap();
            if page <= 2 && per_page == 1 {
                Json(json!([{"name": format!("{user}-repo-{page}")}]))
            } else {
                Json(json!([]))
            }
        }

        async fn search(RawQuery(query): RawQuery) -> Json<serde_json::Value> {
            let query = parse_query(query);
            Json(json!({"items": [{"title": query["q"].clone()}]}))
        }

        let router = Router::new()
            .route("/users/:user/repos", get(repos))
            .route("/search/issues", get(search));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn repositories_paginate_until_a_short_page() {
        let base = spawn_github_fixture().await;
        let tool = ListUserRepositories {
            http: reqwest::Client::new(),
            base,
        };

        let output = tool
            .call(
                json!({"username": "octocat", "per_page": 1, "max_pages": 5}),
                &RequestContext::default(),
            )
            .await
            .unwrap();
        let repos: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(
            repos,
            json!([{"name": "octocat-repo-1"}, {"name": "octocat-repo-2"}])
        );
    }

    #[tokio::test]
    async fn username_falls_back_to_the_request_context() {
        let base = spawn_github_fixture().await;
        let tool = ListAuthoredSearch {
            name: "list_pull_requests_opened_by_user",
            description: "",
            search_type: "pr",
            http: reqwest::Client::new(),
            base,
        };

        let context = RequestContext {
            github_username: Some("octocat".to_string()),
            ..Default::default()
        };
        let output = tool.call(json!({}), &context).await.unwrap();
        let items: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(items[0]["title"], json!("type:pr author:octocat"));
    }

    #[tokio::test]
    async fn missing_username_names_both_sources() {
        let tool = ListUserRepositories {
            http: reqwest::Client::new(),
            base: "http://127.0.0.1:1".to_string(),
        };
        let err = tool
            .call(json!({}), &RequestContext::default())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("username is required"));
        assert!(message.contains("X-GitHub-Username"));
    }
}
