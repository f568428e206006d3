// handlers/protected/availability.rs - /api/v1/creators/:id/availability handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::auth::AuthUser;
use crate::database::models::AvailabilitySlot;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AvailabilityService;
use crate::state::AppState;

pub async fn availability_get(
    State(state): State<AppState>,
    Path(creator_id): Path<String>,
) -> ApiResult<Vec<AvailabilitySlot>> {
    Ok(ApiResponse::success(AvailabilityService::new(&state).get(&creator_id).await?))
}

/// PUT replaces the whole schedule
pub async fn availability_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(creator_id): Path<String>,
    Json(slots): Json<Vec<AvailabilitySlot>>,
) -> ApiResult<Vec<AvailabilitySlot>> {
    Ok(ApiResponse::success(
        AvailabilityService::new(&state).replace(&user, &creator_id, slots).await?,
    ))
}
