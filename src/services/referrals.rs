use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{ensure_role, ServiceError, ServiceResult};
use crate::auth::AuthUser;
use crate::database::models::{Referral, Role};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClaimReferral {
    pub code: String,
}

pub struct ReferralService<'a> {
    state: &'a AppState,
}

impl<'a> ReferralService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Records that the calling creator was referred by the owner of `code`.
    pub async fn claim(&self, caller: &AuthUser, input: ClaimReferral) -> ServiceResult<Referral> {
        ensure_role(caller, Role::Creator)?;
        let code = input.code.trim().to_uppercase();
        let referrer = self
            .state
            .store
            .get_creator_by_referral_code(&code)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("referral code '{}'", code)))?;
        if referrer.id == caller.user_id {
            return Err(ServiceError::invalid_field("code", "cannot refer yourself"));
        }

        let referral = self
            .state
            .store
            .insert_referral(Referral {
                id: Uuid::new_v4(),
                referrer_id: referrer.id,
                referred_id: caller.user_id.clone(),
                code,
                created_at: Utc::now(),
            })
            .await?;
        tracing::info!(referrer_id = %referral.referrer_id, referred_id = %referral.referred_id, "referral claimed");
        Ok(referral)
    }

    pub async fn list(&self, caller: &AuthUser) -> ServiceResult<Vec<Referral>> {
        Ok(self.state.store.list_referrals(&caller.user_id).await?)
    }
}
