// handlers/protected/kyc.rs - /api/v1/kyc handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::auth::AuthUser;
use crate::database::models::UserKyc;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::kyc::SubmitKyc;
use crate::services::KycService;
use crate::state::AppState;

pub async fn kyc_submit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<SubmitKyc>,
) -> ApiResult<UserKyc> {
    Ok(ApiResponse::created(KycService::new(&state).submit(&user, body).await?))
}

pub async fn kyc_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> ApiResult<UserKyc> {
    Ok(ApiResponse::success(KycService::new(&state).get(&user, &user_id).await?))
}
