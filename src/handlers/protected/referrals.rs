// handlers/protected/referrals.rs - /api/v1/referrals handlers

use axum::{extract::State, Extension, Json};

use crate::auth::AuthUser;
use crate::database::models::Referral;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::referrals::ClaimReferral;
use crate::services::ReferralService;
use crate::state::AppState;

pub async fn referral_claim(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ClaimReferral>,
) -> ApiResult<Referral> {
    Ok(ApiResponse::created(ReferralService::new(&state).claim(&user, body).await?))
}

pub async fn referral_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<Referral>> {
    Ok(ApiResponse::success(ReferralService::new(&state).list(&user).await?))
}
