//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 预先写好每一次生成要回放的事件序列；每次 stream_chat 依次取出一段，并记录收到的请求，
//! 便于断言「第二次生成不带工具」「tool 消息引用了正确的 callId」等行为。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{EventStream, GenerationEvent, GenerationRequest, LlmClient, LlmError};

/// 一次生成的剧本：事件序列（可在中途插入错误），或直接建立失败
#[derive(Debug, Clone)]
pub enum ScriptedPass {
    Events(Vec<Result<GenerationEvent, LlmError>>),
    Fail(LlmError),
}

impl ScriptedPass {
    pub fn events(events: impl IntoIterator<Item = GenerationEvent>) -> Self {
        Self::Events(events.into_iter().map(Ok).collect())
    }
}

/// Mock 客户端：按顺序回放剧本；剧本用完后返回空流
#[derive(Debug, Default)]
pub struct MockLlmClient {
    passes: Mutex<VecDeque<ScriptedPass>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockLlmClient {
    pub fn new(passes: impl IntoIterator<Item = ScriptedPass>) -> Self {
        Self {
            passes: Mutex::new(passes.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 已收到的全部请求（按调用顺序）
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn stream_chat(&self, request: &GenerationRequest) -> Result<EventStream, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let pass = self
            .passes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match pass {
            Some(ScriptedPass::Events(events)) => Ok(Box::pin(stream::iter(events))),
            Some(ScriptedPass::Fail(err)) => Err(err),
            None => Ok(Box::pin(stream::empty())),
        }
    }
}
