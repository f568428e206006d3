// handlers/protected/chats.rs - /api/v1/chats and /api/v1/endChatUpdate handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::database::models::{Chat, ChatMessage};
use crate::database::Page;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::chats::{ChatView, SeenReceipt, SendMessage, StartChat};
use crate::services::ChatService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EndChat {
    pub chat_id: String,
}

pub async fn chat_start(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<StartChat>,
) -> ApiResult<Chat> {
    Ok(ApiResponse::created(ChatService::new(&state).start(&user, body).await?))
}

pub async fn chat_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Chat>> {
    Ok(ApiResponse::success(ChatService::new(&state).list(&user, page).await?))
}

pub async fn chat_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> ApiResult<ChatView> {
    Ok(ApiResponse::success(ChatService::new(&state).get(&user, &chat_id).await?))
}

pub async fn chat_messages(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<ChatMessage>> {
    Ok(ApiResponse::success(
        ChatService::new(&state).messages(&user, &chat_id, page).await?,
    ))
}

pub async fn chat_send(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
    Json(body): Json<SendMessage>,
) -> ApiResult<ChatMessage> {
    Ok(ApiResponse::created(
        ChatService::new(&state).send_message(&user, &chat_id, body).await?,
    ))
}

/// POST /api/v1/chats/:chat_id/markSeen
pub async fn chat_mark_seen(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> ApiResult<SeenReceipt> {
    Ok(ApiResponse::success(ChatService::new(&state).mark_seen(&user, &chat_id).await?))
}

/// POST /api/v1/endChatUpdate
pub async fn chat_end(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<EndChat>,
) -> ApiResult<ChatView> {
    Ok(ApiResponse::success(ChatService::new(&state).end(&user, &body.chat_id).await?))
}
