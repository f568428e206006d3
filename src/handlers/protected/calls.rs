// handlers/protected/calls.rs - /api/v1/calls handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::database::models::{Call, SessionKind};
use crate::database::Page;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::calls::{CallView, MaxDuration, RegisterCall, UpdateCall};
use crate::services::CallService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SettleCall {
    pub call_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MaxDurationQuery {
    pub creator_id: String,
    pub kind: SessionKind,
}

/// POST /api/v1/calls/registerCall
pub async fn call_register(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RegisterCall>,
) -> ApiResult<Call> {
    Ok(ApiResponse::created(CallService::new(&state).register(&user, body).await?))
}

/// POST /api/v1/calls/updateCall
pub async fn call_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateCall>,
) -> ApiResult<Call> {
    Ok(ApiResponse::success(CallService::new(&state).update_status(&user, body).await?))
}

/// POST /api/v1/calls/updateCallTransaction
pub async fn call_settle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<SettleCall>,
) -> ApiResult<CallView> {
    Ok(ApiResponse::success(
        CallService::new(&state).settle(&user, &body.call_id).await?,
    ))
}

/// GET /api/v1/calls/:call_id
pub async fn call_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(call_id): Path<String>,
) -> ApiResult<CallView> {
    Ok(ApiResponse::success(CallService::new(&state).get(&user, &call_id).await?))
}

/// GET /api/v1/calls?limit&offset
pub async fn call_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<Call>> {
    Ok(ApiResponse::success(CallService::new(&state).list(&user, page).await?))
}

/// GET /api/v1/calls/maxDuration?creator_id&kind
pub async fn call_max_duration(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MaxDurationQuery>,
) -> ApiResult<MaxDuration> {
    Ok(ApiResponse::success(
        CallService::new(&state)
            .max_duration(&user, &query.creator_id, query.kind)
            .await?,
    ))
}
