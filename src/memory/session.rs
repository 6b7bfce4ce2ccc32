//! 会话与消息数据结构
//!
//! 序列化字段为 camelCase（`createdAt`），与浏览器端保存的历史格式一致。

use serde::{Deserialize, Serialize};

/// 新会话的默认标题
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 会话中的一条消息；assistant 消息的 content 是原始流文本（含 `<think>` 段）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: i64,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            created_at: now_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: i64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: generate_id(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now_millis(),
        }
    }

    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// 短随机 id（uuid v4 的前 12 位十六进制）
pub fn generate_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

/// 当前时间，Unix 毫秒
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
