//! HTTP 错误响应：统一渲染为 `{ "error": string }`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::core::{ChatError, SessionError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Chat(ChatError::MissingMessage) => StatusCode::BAD_REQUEST,
            ApiError::Chat(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Session(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
