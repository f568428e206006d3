// handlers/protected/creators.rs - /api/v1/creators handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::database::models::Creator;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::users::{RegisterCreator, UpdateCreator};
use crate::services::UserService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OnlineStatus {
    pub online: bool,
}

/// POST /api/v1/creators - register the caller as a creator
pub async fn creator_register(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RegisterCreator>,
) -> ApiResult<Creator> {
    let creator = UserService::new(&state).register_creator(&user, body).await?;
    Ok(ApiResponse::created(creator))
}

/// GET /api/v1/creators/:id
pub async fn creator_get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Creator> {
    Ok(ApiResponse::success(UserService::new(&state).get_creator(&id).await?))
}

/// GET /api/v1/creators/username/:username
pub async fn creator_by_username(State(state): State<AppState>, Path(username): Path<String>) -> ApiResult<Creator> {
    Ok(ApiResponse::success(
        UserService::new(&state).get_creator_by_username(&username).await?,
    ))
}

/// PATCH /api/v1/creators/:id
pub async fn creator_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCreator>,
) -> ApiResult<Creator> {
    Ok(ApiResponse::success(
        UserService::new(&state).update_creator(&user, &id, body).await?,
    ))
}

/// PUT /api/v1/creators/:id/status
pub async fn creator_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<OnlineStatus>,
) -> ApiResult<Creator> {
    Ok(ApiResponse::success(
        UserService::new(&state).set_online(&user, &id, body.online).await?,
    ))
}
