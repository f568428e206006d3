// handlers/protected/wallet.rs - /api/v1/wallet handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use crate::auth::AuthUser;
use crate::database::models::{Wallet, WalletTransaction};
use crate::database::{LedgerOutcome, Page};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::wallet::{AddMoney, Payout};
use crate::services::WalletService;
use crate::state::AppState;

/// GET /api/v1/wallet/:user_id
pub async fn wallet_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> ApiResult<Wallet> {
    Ok(ApiResponse::success(WalletService::new(&state).get(&user, &user_id).await?))
}

/// GET /api/v1/wallet/:user_id/transactions?limit&offset
pub async fn wallet_transactions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Query(page): Query<Page>,
) -> ApiResult<Vec<WalletTransaction>> {
    Ok(ApiResponse::success(
        WalletService::new(&state).transactions(&user, &user_id, page).await?,
    ))
}

/// POST /api/v1/wallet/addMoney
pub async fn wallet_add_money(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<AddMoney>,
) -> ApiResult<LedgerOutcome> {
    let outcome = WalletService::new(&state).add_money(&user, body).await?;
    if outcome.replayed {
        Ok(ApiResponse::success(outcome))
    } else {
        Ok(ApiResponse::created(outcome))
    }
}

/// POST /api/v1/wallet/payout
pub async fn wallet_payout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<Payout>,
) -> ApiResult<LedgerOutcome> {
    Ok(ApiResponse::created(WalletService::new(&state).payout(&user, body).await?))
}
