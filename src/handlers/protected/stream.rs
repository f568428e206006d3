// handlers/protected/stream.rs - POST /api/v1/stream/token handler

use axum::{extract::State, Extension};

use crate::auth::{AuthUser, StreamToken};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::StreamService;
use crate::state::AppState;

pub async fn stream_token(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<StreamToken> {
    Ok(ApiResponse::success(StreamService::new(&state).token(&user)?))
}
