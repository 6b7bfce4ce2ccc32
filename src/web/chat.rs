//! POST /api/chat：流式聊天
//!
//! 校验失败在开流之前以 JSON 错误返回；开流之后（HTTP 200 已发出）的任何失败只会让
//! 流干净地结束。生成任务在独立的 tokio 任务里运行，通过有界通道把文本片段交给响应体。
//! 响应体被丢弃（客户端断开）时取消该任务。

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures_util::stream;
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{ApiError, AppState};
use crate::core::{ChatError, ChatOrchestrator, TokenSink};
use crate::memory::{Message, SessionStore};
use crate::stream::{THINK_CLOSE, THINK_OPEN};

/// 响应体与生成任务之间的缓冲片段数
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// 本次回答在会话存储中的落点
struct SessionBinding {
    store: Arc<SessionStore>,
    session_id: String,
    message_id: String,
}

impl SessionBinding {
    /// 先写入用户消息与空的 assistant 消息
    fn begin(
        store: Arc<SessionStore>,
        session_id: String,
        user_message: &str,
    ) -> Result<Self, ApiError> {
        store.append_message(&session_id, Message::user(user_message))?;
        let assistant = Message::assistant("");
        let message_id = assistant.id.clone();
        store.append_message(&session_id, assistant)?;
        Ok(Self {
            store,
            session_id,
            message_id,
        })
    }

    fn commit(&self, transcript: &str) {
        if let Err(e) =
            self.store
                .update_message_content(&self.session_id, &self.message_id, transcript)
        {
            tracing::warn!("Failed to record assistant reply: {}", e);
        }
    }
}

/// 把片段送进响应体通道，同时保留一份完整原文
struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    transcript: String,
}

impl ChannelSink {
    /// 被取消时生成可能停在思考段中间：补上 `</think>`，保证保存与已发出的文本都成对闭合
    fn close_dangling_reasoning(&mut self) {
        let open = self.transcript.rfind(THINK_OPEN);
        if open.is_some() && open > self.transcript.rfind(THINK_CLOSE) {
            self.transcript.push_str(THINK_CLOSE);
            let _ = self.tx.try_send(Bytes::from_static(THINK_CLOSE.as_bytes()));
        }
    }
}

#[async_trait]
impl TokenSink for ChannelSink {
    async fn write(&mut self, token: &str) -> Result<(), ChatError> {
        self.transcript.push_str(token);
        self.tx
            .send(Bytes::copy_from_slice(token.as_bytes()))
            .await
            .map_err(|_| ChatError::ClientGone)
    }
}

pub async fn api_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = payload.map_err(|_| ChatError::MissingMessage)?.0;
    let message = req
        .message
        .filter(|m| !m.is_empty())
        .ok_or(ChatError::MissingMessage)?;
    let orchestrator = state.chat.clone().ok_or(ChatError::MissingApiKey)?;

    let binding = match req.session_id.filter(|s| !s.is_empty()) {
        Some(id) => Some(SessionBinding::begin(
            Arc::clone(&state.sessions),
            id,
            &message,
        )?),
        None => None,
    };

    tracing::info!(
        message_len = message.len(),
        session = binding.as_ref().map(|b| b.session_id.as_str()),
        "chat request"
    );

    let cancel = state.shutdown.request_token();
    let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    tokio::spawn(run_chat(
        orchestrator,
        message,
        ChannelSink {
            tx,
            transcript: String::new(),
        },
        binding,
        cancel.clone(),
    ));

    let guard = cancel.drop_guard();
    let body = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, Infallible>(chunk), (rx, guard)))
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

async fn run_chat(
    orchestrator: Arc<ChatOrchestrator>,
    message: String,
    mut sink: ChannelSink,
    binding: Option<SessionBinding>,
    cancel: tokio_util::sync::CancellationToken,
) {
    let outcome = tokio::select! {
        result = orchestrator.run(&message, &mut sink) => Some(result),
        _ = cancel.cancelled() => None,
    };

    match outcome {
        Some(Ok(exchange)) => tracing::info!(
            passes = exchange.passes,
            output_len = sink.transcript.len(),
            "chat finished"
        ),
        Some(Err(ChatError::ClientGone)) | None => {
            sink.close_dangling_reasoning();
            tracing::info!(output_len = sink.transcript.len(), "chat abandoned")
        }
        Some(Err(e)) => tracing::error!("chat stream failed: {}", e),
    }

    if let Some(binding) = binding {
        binding.commit(&sink.transcript);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_keeps_transcript() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = ChannelSink {
            tx,
            transcript: String::new(),
        };
        sink.write("<think>").await.unwrap();
        sink.write("hi").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"<think>"));
        assert_eq!(sink.transcript, "<think>hi");
    }

    #[tokio::test]
    async fn test_channel_sink_closed_is_client_gone() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut sink = ChannelSink {
            tx,
            transcript: String::new(),
        };
        assert_eq!(sink.write("x").await, Err(ChatError::ClientGone));
    }

    #[tokio::test]
    async fn test_dangling_reasoning_is_closed_once() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut sink = ChannelSink {
            tx,
            transcript: String::new(),
        };
        sink.write("<think>").await.unwrap();
        sink.write("hm").await.unwrap();
        sink.close_dangling_reasoning();
        sink.close_dangling_reasoning();
        assert_eq!(sink.transcript, "<think>hm</think>");

        let mut sent = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            sent.extend_from_slice(&chunk);
        }
        assert_eq!(sent, b"<think>hm</think>");
    }

    #[test]
    fn test_closed_or_absent_reasoning_is_left_alone() {
        for text in ["", "plain answer", "<think>a</think>answer"] {
            let (tx, _rx) = mpsc::channel(8);
            let mut sink = ChannelSink {
                tx,
                transcript: text.to_string(),
            };
            sink.close_dangling_reasoning();
            assert_eq!(sink.transcript, text);
        }
    }

    #[tokio::test]
    async fn test_dangling_reasoning_closed_after_client_left() {
        let (tx, rx) = mpsc::channel(8);
        let mut sink = ChannelSink {
            tx,
            transcript: String::new(),
        };
        sink.write("<think>").await.unwrap();
        drop(rx);
        sink.close_dangling_reasoning();
        assert_eq!(sink.transcript, "<think></think>");
    }

    #[test]
    fn test_request_accepts_camel_case_session_id() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","sessionId":"abc"}"#).unwrap();
        assert_eq!(req.session_id.as_deref(), Some("abc"));
        let req: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(req.message.is_none());
    }
}
