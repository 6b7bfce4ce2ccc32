//! 联网搜索工具（Tavily）
//!
//! 限制结果条数、使用 basic 深度，关闭答案合成 / 原始正文 / 图片，以降低延迟与返回体积。
//! 任何失败（未配置密钥、网络错误、非 2xx、响应无法解析）都降级为 `{"error": "..."}`，
//! 保证编排器总能拿到一段合法 JSON 作为 tool 消息内容。

use async_trait::async_trait;
use reqwest::Client;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::SearchSection;
use crate::tools::Tool;

pub const SEARCH_TOOL_NAME: &str = "searchWeb";

const SEARCH_TOOL_DESCRIPTION: &str =
    "Search the internet for real-time information, news, or specific facts.";

const SEARCH_FAILED: &str = "Failed to search.";

#[allow(dead_code)]
#[derive(Debug, Deserialize, JsonSchema)]
struct SearchArgs {
    /// The search query string.
    query: String,
}

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub content: String,
    pub url: String,
}

/// 搜索结果或错误标记；两者都序列化为合法 JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    Results(Vec<SearchResult>),
    Error { error: String },
}

impl SearchOutcome {
    fn failed() -> Self {
        Self::Error {
            error: SEARCH_FAILED.to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!(r#"{{"error":"{SEARCH_FAILED}"}}"#))
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

/// Search 工具：持有 HTTP 客户端（超时由配置决定）与查询参数
pub struct SearchTool {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    max_results: u32,
    search_depth: String,
}

impl SearchTool {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        max_results: u32,
        search_depth: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            max_results,
            search_depth: search_depth.into(),
        }
    }

    pub fn from_config(section: &SearchSection) -> Self {
        let api_key = section.resolve_api_key();
        if api_key.is_none() {
            tracing::warn!("TAVILY_API_KEY not set, web search will report failures to the model");
        }
        Self::new(
            section.endpoint.clone(),
            api_key,
            section.max_results,
            section.search_depth.clone(),
            section.timeout_secs,
        )
    }

    /// 未配置密钥的实例：工具声明照常提供，调用时返回错误结果
    pub fn unconfigured() -> Self {
        let section = SearchSection::default();
        Self::new(
            section.endpoint,
            None,
            section.max_results,
            section.search_depth,
            section.timeout_secs,
        )
    }

    /// 执行搜索；从不返回 Err，失败降级为 SearchOutcome::Error
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return SearchOutcome::failed();
        };
        match self.fetch(api_key, query).await {
            Ok(results) => {
                tracing::info!(results = results.len(), "web search done");
                SearchOutcome::Results(results)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Tavily search error");
                SearchOutcome::failed()
            }
        }
    }

    async fn fetch(&self, api_key: &str, query: &str) -> Result<Vec<SearchResult>, String> {
        let body = json!({
            "query": query,
            "search_depth": self.search_depth,
            "max_results": self.max_results,
            "include_answer": false,
            "include_raw_content": false,
            "include_images": false,
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let parsed: TavilyResponse = resp
            .json()
            .await
            .map_err(|e| format!("Read body: {}", e))?;
        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                content: r.content,
                url: r.url,
            })
            .collect())
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        SEARCH_TOOL_DESCRIPTION
    }

    /// `{"type": "object", "properties": {"query": {...}}, "required": ["query"]}`
    fn parameters_schema(&self) -> Value {
        let mut schema = serde_json::to_value(schema_for!(SearchArgs)).unwrap_or_else(|_| json!({}));
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }
        schema
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if query.is_empty() {
            return Ok(SearchOutcome::Error {
                error: "Missing query".to_string(),
            }
            .to_json());
        }
        tracing::info!(query_len = query.len(), "search tool call");
        Ok(self.search(query).await.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};

    type Captured = Arc<Mutex<Option<(Option<String>, Value)>>>;

    /// 启动进程内的假 Tavily 服务，返回 endpoint 与捕获到的（Authorization, 请求体）
    async fn spawn_fake_tavily(status: StatusCode, reply: Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(None));
        let handler = {
            let captured = captured.clone();
            move |headers: HeaderMap, Json(req): Json<Value>| {
                let captured = captured.clone();
                let reply = reply.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    *captured.lock().unwrap() = Some((auth, req));
                    (status, Json(reply))
                }
            }
        };
        let app = Router::new().route("/search", post(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/search", addr), captured)
    }

    #[tokio::test]
    async fn test_search_maps_results_and_constrains_query() {
        let (endpoint, captured) = spawn_fake_tavily(
            StatusCode::OK,
            json!({
                "query": "Tokyo weather today",
                "answer": null,
                "results": [
                    {"title": "Tokyo Forecast", "url": "https://example.com/tokyo", "content": "Sunny, 21C", "score": 0.9},
                    {"title": "JMA", "url": "https://example.com/jma", "content": "Clear skies"}
                ]
            }),
        )
        .await;
        let tool = SearchTool::new(endpoint, Some("tvly-test".into()), 5, "basic", 5);

        let outcome = tool.search("Tokyo weather today").await;
        assert_eq!(
            outcome,
            SearchOutcome::Results(vec![
                SearchResult {
                    title: "Tokyo Forecast".into(),
                    content: "Sunny, 21C".into(),
                    url: "https://example.com/tokyo".into(),
                },
                SearchResult {
                    title: "JMA".into(),
                    content: "Clear skies".into(),
                    url: "https://example.com/jma".into(),
                },
            ])
        );

        let (auth, req) = captured.lock().unwrap().clone().unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer tvly-test"));
        assert_eq!(req["query"], "Tokyo weather today");
        assert_eq!(req["max_results"], 5);
        assert_eq!(req["search_depth"], "basic");
        assert_eq!(req["include_answer"], false);
        assert_eq!(req["include_raw_content"], false);
        assert_eq!(req["include_images"], false);
    }

    #[tokio::test]
    async fn test_provider_error_degrades_to_error_object() {
        let (endpoint, _) =
            spawn_fake_tavily(StatusCode::UNAUTHORIZED, json!({"detail": "bad key"})).await;
        let tool = SearchTool::new(endpoint, Some("tvly-bad".into()), 5, "basic", 5);
        let out = tool.execute(json!({"query": "anything"})).await.unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value, json!({"error": "Failed to search."}));
    }

    #[tokio::test]
    async fn test_unreachable_provider_degrades() {
        let tool = SearchTool::new("http://127.0.0.1:1/search", Some("k".into()), 5, "basic", 2);
        assert_eq!(tool.search("q").await, SearchOutcome::failed());
    }

    #[tokio::test]
    async fn test_missing_key_and_missing_query() {
        let tool = SearchTool::unconfigured();
        assert_eq!(tool.search("q").await, SearchOutcome::failed());
        let out = tool.execute(json!({})).await.unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&out).unwrap(),
            json!({"error": "Missing query"})
        );
    }

    #[test]
    fn test_tool_schema_requires_query() {
        let def = SearchTool::unconfigured().definition();
        assert_eq!(def.function.name, "searchWeb");
        let params = &def.function.parameters;
        assert_eq!(params["type"], "object");
        assert_eq!(params["required"], json!(["query"]));
        assert_eq!(params["properties"]["query"]["type"], "string");
        assert_eq!(
            params["properties"]["query"]["description"],
            "The search query string."
        );
        assert!(params.get("$schema").is_none());
    }
}
