//! Web 服务：axum 路由与共享状态
//!
//! - `POST /api/chat`：流式纯文本回答（思考段包在 `<think>` 中）
//! - `/api/sessions/...`：会话存储的增删改查
//! - `GET /api/health`

pub mod chat;
pub mod error;
pub mod sessions;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::core::{ChatOrchestrator, ShutdownManager};
use crate::memory::SessionStore;

pub use error::ApiError;

/// 所有请求共享的只读状态；可变部分只有会话存储（内部加锁）
#[derive(Clone)]
pub struct AppState {
    /// 未配置模型密钥时为 None，聊天请求返回 500
    pub chat: Option<Arc<ChatOrchestrator>>,
    pub sessions: Arc<SessionStore>,
    pub shutdown: Arc<ShutdownManager>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self {
            chat: None,
            sessions,
            shutdown: Arc::new(ShutdownManager::new()),
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: ChatOrchestrator) -> Self {
        self.chat = Some(Arc::new(orchestrator));
        self
    }

    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownManager>) -> Self {
        self.shutdown = shutdown;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat::api_chat))
        .route(
            "/api/sessions",
            get(sessions::api_sessions_list).post(sessions::api_sessions_create),
        )
        .route(
            "/api/sessions/:id",
            patch(sessions::api_session_rename).delete(sessions::api_session_delete),
        )
        .route("/api/sessions/:id/activate", post(sessions::api_session_activate))
        .route("/api/sessions/:id/messages", post(sessions::api_session_append))
        .route(
            "/api/sessions/:id/transcript",
            get(sessions::api_session_transcript),
        )
        .route("/api/health", get(|| async { "OK" }))
        .with_state(state)
}
