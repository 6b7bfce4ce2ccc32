//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：stream_chat 打开一次生成流，逐个产出 GenerationEvent。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::llm::{GenerationEvent, GenerationRequest};

/// 模型调用错误：建立请求失败、流中途失败（含分片解析失败）、空闲超时
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("stream failed: {0}")]
    Stream(String),

    #[error("stream idle for more than {0}s")]
    Timeout(u64),
}

/// 一次生成的事件流
pub type EventStream = Pin<Box<dyn Stream<Item = Result<GenerationEvent, LlmError>> + Send>>;

/// LLM 客户端 trait：每次调用对应一次完整的生成（generation pass）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 打开流式生成；request.tools 为空时不向模型提供任何工具
    async fn stream_chat(&self, request: &GenerationRequest) -> Result<EventStream, LlmError>;
}
