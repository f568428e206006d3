// handlers/protected/notifications.rs - /api/v1/notifications handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::database::models::{Notification, NotificationConsent};
use crate::database::Page;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::notifications::ConsentUpdate;
use crate::services::NotificationService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct ReadAll {
    pub marked: u64,
}

pub async fn notification_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Notification>> {
    Ok(ApiResponse::success(
        NotificationService::new(&state)
            .list(&user, query.unread_only, page.clamped())
            .await?,
    ))
}

pub async fn notification_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Notification> {
    Ok(ApiResponse::success(NotificationService::new(&state).mark_read(&user, id).await?))
}

pub async fn notification_read_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ReadAll> {
    let marked = NotificationService::new(&state).mark_all_read(&user).await?;
    Ok(ApiResponse::success(ReadAll { marked }))
}

pub async fn consent_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<NotificationConsent> {
    Ok(ApiResponse::success(NotificationService::new(&state).consent(&user).await?))
}

pub async fn consent_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ConsentUpdate>,
) -> ApiResult<NotificationConsent> {
    Ok(ApiResponse::success(
        NotificationService::new(&state).update_consent(&user, body).await?,
    ))
}
