//! HTTP 接口（feature = "server"）
//!
//! - `POST /chat`：用户标识取自上游认证层写入的 `x-user-id` 请求头
//! - `GET /health`

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::core::{TurnOrchestrator, TurnRequest};
use crate::memory::Message;

/// 认证层写入的用户标识头
pub const USER_ID_HEADER: &str = "x-user-id";

/// 整轮失败时返回给客户端的固定信息
pub const INTERNAL_ERROR_DETAIL: &str = "Ocurrió un error interno en el chat.";

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<TurnOrchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(default)]
    pub recent_history: Vec<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

pub fn router(orchestrator: Arc<TurnOrchestrator>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(|| async { "OK" }))
        .with_state(ApiState { orchestrator })
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
        .into_response()
}

async fn chat(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Response {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let req = TurnRequest::new(user_id, body.message).with_history(body.recent_history);
    match state.orchestrator.handle_turn(req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) if e.is_client_error() => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_DETAIL),
    }
}
