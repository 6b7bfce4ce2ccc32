//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url），如火山方舟、DeepSeek、OpenAI。
//! 使用 byot（自带类型）接口：请求体按需拼装（附带 reasoning_effort），
//! 响应分片解析为本地的 ChatCompletionChunk，以保留标准类型中没有的 reasoning_content。

use std::pin::Pin;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::Client;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};

use crate::config::LlmSection;
use crate::llm::{ChatCompletionChunk, EventStream, GenerationEvent, GenerationRequest, LlmClient, LlmError};

/// OpenAI 兼容客户端：持有 Client、model 名与推理强度提示
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    reasoning_effort: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            reasoning_effort: None,
        }
    }

    pub fn with_reasoning_effort(mut self, effort: Option<String>) -> Self {
        self.reasoning_effort = effort.filter(|e| !e.is_empty());
        self
    }

    /// 从 [llm] 配置创建；未配置 API Key 时返回 None（由 HTTP 层返回 500）
    pub fn from_config(section: &LlmSection) -> Option<Self> {
        let api_key = section.resolve_api_key()?;
        let model = section.resolve_model();
        tracing::info!(model = %model, base_url = %section.base_url, "Using OpenAI-compatible LLM");
        Some(
            Self::new(&section.base_url, &model, &api_key)
                .with_reasoning_effort(section.reasoning_effort.clone()),
        )
    }

    /// 组装请求体：有工具时附带 tools 与 tool_choice=auto，无工具时两者都不发送
    pub fn request_body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": true,
        });
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
            body["tool_choice"] = json!("auto");
        }
        if let Some(effort) = &self.reasoning_effort {
            body["reasoning_effort"] = json!(effort);
        }
        body
    }
}

type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, OpenAIError>> + Send>>;

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn stream_chat(&self, request: &GenerationRequest) -> Result<EventStream, LlmError> {
        let body = self.request_body(request);
        tracing::debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            "opening generation stream"
        );

        let chunks: ChunkStream = self
            .client
            .chat()
            .create_stream_byot(body)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let events = chunks.map(|item| {
            item.map(GenerationEvent::from)
                .map_err(|e| LlmError::Stream(e.to_string()))
        });
        Ok(Box::pin(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use crate::tools::{SearchTool, Tool};

    fn client() -> OpenAiClient {
        OpenAiClient::new("http://localhost:1/v1", "test-model", "sk-test")
            .with_reasoning_effort(Some("medium".into()))
    }

    #[test]
    fn test_request_body_with_tools() {
        let request = GenerationRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            tools: vec![SearchTool::unconfigured().definition()],
        };
        let body = client().request_body(&request);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], true);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["reasoning_effort"], "medium");
        assert_eq!(body["tools"][0]["function"]["name"], "searchWeb");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_request_body_without_tools_omits_tool_choice() {
        let request = GenerationRequest {
            messages: vec![ChatMessage::user("hi")],
            tools: vec![],
        };
        let body = OpenAiClient::new("http://localhost:1/v1", "m", "k").request_body(&request);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("reasoning_effort").is_none());
    }

    #[test]
    fn test_from_config_requires_key() {
        let section = LlmSection {
            api_key: Some(String::new()),
            ..LlmSection::default()
        };
        assert!(OpenAiClient::from_config(&section).is_none());

        let section = LlmSection {
            api_key: Some("sk-x".into()),
            model: "doubao-test".into(),
            ..LlmSection::default()
        };
        if std::env::var(crate::config::LLM_MODEL_ENV).is_err() {
            let client = OpenAiClient::from_config(&section).unwrap();
            let body = client.request_body(&GenerationRequest {
                messages: vec![],
                tools: vec![],
            });
            assert_eq!(body["model"], "doubao-test");
        }
    }
}
