//! 会话存储的 HTTP 接口

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::core::SessionError;
use crate::memory::{split_thinking, ChatSession, Message, Role, Transcript};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionList {
    pub sessions: Vec<ChatSession>,
    pub active_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    pub role: Role,
    pub content: String,
}

/// 展示用的消息：assistant 消息拆出思考段，其余消息原样作为 answer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub id: String,
    pub role: Role,
    pub created_at: i64,
    #[serde(flatten)]
    pub text: Transcript,
}

impl From<&Message> for TranscriptEntry {
    fn from(m: &Message) -> Self {
        let text = match m.role {
            Role::Assistant => split_thinking(&m.content),
            _ => Transcript {
                thinking: None,
                answer: m.content.clone(),
                thinking_complete: true,
            },
        };
        Self {
            id: m.id.clone(),
            role: m.role,
            created_at: m.created_at,
            text,
        }
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn snapshot(state: &AppState) -> SessionList {
    SessionList {
        sessions: state.sessions.list_sessions(),
        active_id: state.sessions.active_id(),
    }
}

/// GET /api/sessions
pub async fn api_sessions_list(State(state): State<AppState>) -> Json<SessionList> {
    Json(snapshot(&state))
}

/// POST /api/sessions：新建并设为活动会话
pub async fn api_sessions_create(
    State(state): State<AppState>,
) -> (StatusCode, Json<ChatSession>) {
    let session = state.sessions.create_session();
    tracing::info!(session = %session.id, "session created");
    (StatusCode::CREATED, Json(session))
}

/// POST /api/sessions/:id/activate
pub async fn api_session_activate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionList>, ApiError> {
    state.sessions.switch_active(&id)?;
    Ok(Json(snapshot(&state)))
}

/// PATCH /api/sessions/:id
pub async fn api_session_rename(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<ChatSession>, ApiError> {
    let req = body(payload)?;
    Ok(Json(state.sessions.rename_session(&id, &req.title)?))
}

/// DELETE /api/sessions/:id；删除后列表至少还有一个会话
pub async fn api_session_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionList>, ApiError> {
    state.sessions.delete_session(&id)?;
    tracing::info!(session = %id, "session deleted");
    Ok(Json(snapshot(&state)))
}

/// POST /api/sessions/:id/messages
pub async fn api_session_append(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AppendRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let req = body(payload)?;
    let message = Message::new(req.role, req.content);
    state.sessions.append_message(&id, message.clone())?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/sessions/:id/transcript
pub async fn api_session_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TranscriptEntry>>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| SessionError::SessionNotFound(id.clone()))?;
    Ok(Json(session.messages.iter().map(TranscriptEntry::from).collect()))
}
