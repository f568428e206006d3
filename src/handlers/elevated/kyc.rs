// handlers/elevated/kyc.rs - POST /api/v1/admin/kyc/:user_id/review handler

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::auth::AuthUser;
use crate::database::models::UserKyc;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::kyc::ReviewKyc;
use crate::services::KycService;
use crate::state::AppState;

pub async fn kyc_review(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(body): Json<ReviewKyc>,
) -> ApiResult<UserKyc> {
    Ok(ApiResponse::success(
        KycService::new(&state).review(&admin, &user_id, body).await?,
    ))
}
