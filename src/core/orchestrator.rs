//! 工具调用编排器：一次用户消息的完整处理
//!
//! 状态机：`Init → FirstPass → (Done | ToolExec → SecondPass → Done)`
//! - FirstPass：带工具（tool_choice=auto）生成；思考与回答实时写出，工具调用分片只缓存
//! - ToolExec：写出搜索提示，追加 assistant(tool_calls) 与每个调用的 tool 结果
//! - SecondPass：不带工具再生成一次，每条用户消息最多一轮工具调用
//!
//! 每次请求独占自己的对话、累加器与多路复用器，编排器本身无可变共享状态。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::core::ChatError;
use crate::llm::{ChatMessage, GenerationRequest, LlmClient, LlmError, ToolCallRequest};
use crate::stream::{Accumulated, DeltaAccumulator, Multiplexer, SEARCH_STATUS_MARKER};
use crate::tools::ToolRegistry;

/// 输出端：按顺序接收多路复用后的文本片段
#[async_trait]
pub trait TokenSink: Send {
    /// 写入失败表示客户端已离开，调用方应立即停止
    async fn write(&mut self, token: &str) -> Result<(), ChatError>;
}

#[async_trait]
impl TokenSink for String {
    async fn write(&mut self, token: &str) -> Result<(), ChatError> {
        self.push_str(token);
        Ok(())
    }
}

/// 编排状态；ToolExec 携带第一次生成的完整结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Init,
    FirstPass,
    ToolExec(Accumulated),
    SecondPass,
    Done,
}

/// 一次交互的结果（对话仅在本次请求内有效，不做持久化）
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    pub conversation: Vec<ChatMessage>,
    /// 第一次生成产生的工具调用（为空表示没有工具轮次）
    pub tool_calls: Vec<ToolCallRequest>,
    pub passes: usize,
    /// 最后一次生成的完整内容
    pub answer: Accumulated,
}

pub struct ChatOrchestrator {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    system_prompt: Arc<str>,
    idle_timeout: Option<Duration>,
}

impl ChatOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            llm,
            tools,
            system_prompt: system_prompt.into(),
            idle_timeout: None,
        }
    }

    /// 两个流事件之间的最长等待；0 表示不限制
    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// 处理一条用户消息，把输出写入 sink
    ///
    /// 返回 Err 时 sink 中已写出的内容仍然完整闭合（未闭合的 `<think>` 已补上 `</think>`）。
    pub async fn run<S>(&self, message: &str, sink: &mut S) -> Result<Exchange, ChatError>
    where
        S: TokenSink + ?Sized,
    {
        let mut exchange = Exchange::default();
        let mut phase = Phase::Init;

        loop {
            phase = match phase {
                Phase::Init => {
                    exchange.conversation = vec![
                        ChatMessage::system(&*self.system_prompt),
                        ChatMessage::user(message),
                    ];
                    Phase::FirstPass
                }
                Phase::FirstPass => {
                    let request = GenerationRequest {
                        messages: exchange.conversation.clone(),
                        tools: self.tools.definitions(),
                    };
                    let first = self.generation_pass(&request, sink).await?;
                    exchange.passes += 1;
                    if first.tool_calls.is_empty() {
                        exchange.answer = first;
                        Phase::Done
                    } else {
                        tracing::info!(tool_calls = first.tool_calls.len(), "tool round requested");
                        Phase::ToolExec(first)
                    }
                }
                Phase::ToolExec(first) => {
                    sink.write(SEARCH_STATUS_MARKER).await?;
                    self.execute_tools(&first, &mut exchange.conversation).await;
                    exchange.tool_calls = first.tool_calls;
                    Phase::SecondPass
                }
                Phase::SecondPass => {
                    let request = GenerationRequest {
                        messages: exchange.conversation.clone(),
                        tools: Vec::new(),
                    };
                    exchange.answer = self.generation_pass(&request, sink).await?;
                    exchange.passes += 1;
                    Phase::Done
                }
                Phase::Done => break,
            };
        }

        tracing::debug!(
            passes = exchange.passes,
            answer_len = exchange.answer.content.len(),
            "exchange finished"
        );
        Ok(exchange)
    }

    /// 一次生成：事件同时送入累加器与多路复用器；流结束或中途失败都会闭合思考段
    async fn generation_pass<S>(
        &self,
        request: &GenerationRequest,
        sink: &mut S,
    ) -> Result<Accumulated, ChatError>
    where
        S: TokenSink + ?Sized,
    {
        let mut stream = self.llm.stream_chat(request).await?;
        let mut accumulator = DeltaAccumulator::new();
        let mut mux = Multiplexer::new();

        let outcome: Result<(), LlmError> = loop {
            let next = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                    Ok(next) => next,
                    Err(_) => Some(Err(LlmError::Timeout(limit.as_secs()))),
                },
                None => stream.next().await,
            };
            match next {
                None => break Ok(()),
                Some(Err(e)) => break Err(e),
                Some(Ok(event)) => {
                    accumulator.apply(&event);
                    for token in mux.push(&event) {
                        sink.write(token).await?;
                    }
                }
            }
        };

        if let Some(close) = mux.finish() {
            sink.write(close).await?;
        }
        if let Err(e) = outcome {
            tracing::error!(error = %e, "generation stream failed");
            return Err(e.into());
        }
        Ok(accumulator.finish())
    }

    /// 追加 assistant(tool_calls) 消息，再为每个已知工具的调用追加一条 tool 消息
    ///
    /// - 未知工具名：跳过，不追加
    /// - 参数不是合法 JSON：不执行该调用，tool 消息内容为错误对象，同轮其余调用照常执行
    async fn execute_tools(&self, first: &Accumulated, conversation: &mut Vec<ChatMessage>) {
        conversation.push(ChatMessage::assistant_tool_calls(
            first.content.clone(),
            first.tool_calls.clone(),
        ));

        for call in &first.tool_calls {
            let Some(tool) = self.tools.get(&call.function_name) else {
                tracing::warn!(tool = %call.function_name, "unknown tool requested, skipped");
                continue;
            };
            let payload = match serde_json::from_str::<Value>(&call.arguments) {
                Ok(args) => match tool.execute(args).await {
                    Ok(out) => out,
                    Err(e) => json!({ "error": e }).to_string(),
                },
                Err(e) => {
                    tracing::warn!(tool = %call.function_name, error = %e, "malformed tool arguments");
                    json!({ "error": format!("Invalid tool arguments: {e}") }).to_string()
                }
            };
            conversation.push(ChatMessage::tool(call.call_id.clone(), payload));
        }
    }
}
