// handlers/protected/feedback.rs - /api/v1/feedback handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::database::models::Feedback;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::feedback::{CreatorFeedback, SubmitFeedback};
use crate::services::FeedbackService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Visibility {
    pub show_on_profile: bool,
}

pub async fn feedback_submit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<SubmitFeedback>,
) -> ApiResult<Feedback> {
    Ok(ApiResponse::created(FeedbackService::new(&state).submit(&user, body).await?))
}

pub async fn feedback_for_creator(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(creator_id): Path<String>,
) -> ApiResult<CreatorFeedback> {
    Ok(ApiResponse::success(
        FeedbackService::new(&state).for_creator(&user, &creator_id).await?,
    ))
}

pub async fn feedback_visibility(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<Visibility>,
) -> ApiResult<Feedback> {
    Ok(ApiResponse::success(
        FeedbackService::new(&state)
            .set_visibility(&user, id, body.show_on_profile)
            .await?,
    ))
}
