// handlers/elevated/wallet.rs - GET /api/v1/admin/wallet/:user_id handler

use axum::{
    extract::{Path, State},
    Extension,
};

use crate::auth::AuthUser;
use crate::database::models::Wallet;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::WalletService;
use crate::state::AppState;

pub async fn wallet_inspect(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> ApiResult<Wallet> {
    tracing::info!(admin_id = %admin.user_id, user_id = %user_id, "admin wallet lookup");
    Ok(ApiResponse::success(WalletService::new(&state).get(&admin, &user_id).await?))
}
