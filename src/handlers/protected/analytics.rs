// handlers/protected/analytics.rs - /api/v1/analytics handlers

use axum::{extract::State, Extension, Json};

use crate::auth::AuthUser;
use crate::database::models::AnalyticsIntegration;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::analytics::UpdateAnalytics;
use crate::services::AnalyticsService;
use crate::state::AppState;

pub async fn analytics_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<AnalyticsIntegration> {
    Ok(ApiResponse::success(AnalyticsService::new(&state).get(&user).await?))
}

pub async fn analytics_put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateAnalytics>,
) -> ApiResult<AnalyticsIntegration> {
    Ok(ApiResponse::success(AnalyticsService::new(&state).put(&user, body).await?))
}
