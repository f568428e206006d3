// handlers/protected/clients.rs - /api/v1/clients handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::auth::AuthUser;
use crate::database::models::Client;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::users::{RegisterClient, UpdateClient};
use crate::services::UserService;
use crate::state::AppState;

pub async fn client_register(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RegisterClient>,
) -> ApiResult<Client> {
    let client = UserService::new(&state).register_client(&user, body).await?;
    Ok(ApiResponse::created(client))
}

pub async fn client_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Client> {
    Ok(ApiResponse::success(UserService::new(&state).get_client(&user, &id).await?))
}

pub async fn client_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<UpdateClient>,
) -> ApiResult<Client> {
    Ok(ApiResponse::success(
        UserService::new(&state).update_client(&user, &id, body).await?,
    ))
}
