//! 错误类型
//!
//! - ChatError：一次聊天请求的失败（参数校验、缺少密钥在开流之前发生；模型失败、客户端断开在流中发生）
//! - SessionError：会话存储操作引用了不存在的会话或消息

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message is required")]
    MissingMessage,

    #[error("Missing API Key")]
    MissingApiKey,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// 输出端已关闭（浏览器断开或请求被取消）
    #[error("Client disconnected")]
    ClientGone,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),
}
