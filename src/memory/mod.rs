//! 会话记忆
//!
//! - session：会话与消息结构
//! - persistence：整体读写会话列表的后端（JSON 文件 / 内存）
//! - store：会话列表与活动会话，修改即写回
//! - transcript：原始回答文本的思考 / 回答拆分

pub mod persistence;
pub mod session;
pub mod store;
pub mod transcript;

pub use persistence::{JsonFileBackend, MemoryBackend, SessionBackend};
pub use session::{ChatSession, Message, Role, DEFAULT_SESSION_TITLE};
pub use store::SessionStore;
pub use transcript::{split_thinking, Transcript};
