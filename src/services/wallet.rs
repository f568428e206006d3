use rust_decimal::Decimal;
use serde::Deserialize;

use super::{ensure_role, ensure_self_or_admin, NotificationService, ServiceError, ServiceResult};
use crate::auth::AuthUser;
use crate::billing;
use crate::database::models::{
    KycStatus, NotificationKind, Role, TransactionCategory, TransactionKind, Wallet, WalletTransaction,
};
use crate::database::{LedgerEntry, LedgerOutcome, Page};
use crate::events::EventKind;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddMoney {
    pub user_id: String,
    pub amount: Decimal,
    /// Payment-gateway reference; repeating one is a no-op
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Payout {
    pub user_id: String,
    pub amount: Decimal,
}

pub struct WalletService<'a> {
    state: &'a AppState,
}

impl<'a> WalletService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn get(&self, caller: &AuthUser, user_id: &str) -> ServiceResult<Wallet> {
        ensure_self_or_admin(caller, user_id)?;
        self.state
            .store
            .get_wallet(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("wallet for user {}", user_id)))
    }

    pub async fn transactions(&self, caller: &AuthUser, user_id: &str, page: Page) -> ServiceResult<Vec<WalletTransaction>> {
        ensure_self_or_admin(caller, user_id)?;
        Ok(self.state.store.list_transactions(user_id, page.clamped()).await?)
    }

    pub async fn add_money(&self, caller: &AuthUser, input: AddMoney) -> ServiceResult<LedgerOutcome> {
        if caller.user_id != input.user_id {
            return Err(ServiceError::Forbidden("top-ups are only allowed on your own wallet".to_string()));
        }
        if !billing::is_valid_amount(input.amount) {
            return Err(ServiceError::invalid_field("amount", "must be positive with at most 2 decimals"));
        }
        let amount = billing::round_money(input.amount);
        let minimum = self.state.config.billing.min_top_up;
        if amount < minimum {
            return Err(ServiceError::invalid_field("amount", format!("must be at least {}", minimum)));
        }
        let reference = input
            .reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let outcome = self
            .state
            .store
            .apply_ledger_entry(LedgerEntry {
                user_id: input.user_id.clone(),
                amount,
                kind: TransactionKind::Credit,
                category: TransactionCategory::TopUp,
                reference,
                description: "Wallet top-up".to_string(),
            })
            .await?;

        if outcome.replayed {
            tracing::info!(user_id = %input.user_id, reference = ?outcome.transaction.reference, "top-up replayed");
            return Ok(outcome);
        }

        tracing::info!(user_id = %input.user_id, %amount, "wallet topped up");
        self.announce(&outcome, "Wallet topped up", format!("{} added to your wallet", amount))
            .await;
        Ok(outcome)
    }

    /// Withdraws earnings. Only creators with verified KYC may cash out.
    pub async fn payout(&self, caller: &AuthUser, input: Payout) -> ServiceResult<LedgerOutcome> {
        ensure_role(caller, Role::Creator)?;
        if caller.user_id != input.user_id {
            return Err(ServiceError::Forbidden("payouts are only allowed from your own wallet".to_string()));
        }
        if !billing::is_valid_amount(input.amount) {
            return Err(ServiceError::invalid_field("amount", "must be positive with at most 2 decimals"));
        }
        let amount = billing::round_money(input.amount);

        let verified = matches!(
            self.state.store.get_kyc(&input.user_id).await?,
            Some(kyc) if kyc.status == KycStatus::Verified
        );
        if !verified {
            return Err(ServiceError::Forbidden("KYC verification is required before payouts".to_string()));
        }

        let outcome = self
            .state
            .store
            .apply_ledger_entry(LedgerEntry {
                user_id: input.user_id.clone(),
                amount,
                kind: TransactionKind::Debit,
                category: TransactionCategory::Payout,
                reference: None,
                description: "Payout to bank account".to_string(),
            })
            .await?;

        tracing::info!(user_id = %input.user_id, %amount, "payout recorded");
        self.announce(&outcome, "Payout initiated", format!("{} is on its way to your bank", amount))
            .await;
        Ok(outcome)
    }

    async fn announce(&self, outcome: &LedgerOutcome, title: &str, body: String) {
        let user_id = &outcome.wallet.user_id;
        self.state.events.publish(user_id, EventKind::WalletUpdated, &outcome.wallet);
        NotificationService::new(self.state)
            .notify_quietly(user_id, NotificationKind::Payment, title, body)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::{Client, DocumentType, UserKyc};
    use crate::database::StoreError;
    use chrono::Utc;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn state_with_user(id: &str) -> AppState {
        let state = AppState::in_memory(AppConfig::development());
        let now = Utc::now();
        state
            .store
            .insert_client(Client {
                id: id.to_string(),
                username: id.to_string(),
                full_name: "Test User".to_string(),
                phone: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn top_up_is_idempotent_per_reference() {
        let state = state_with_user("u1").await;
        let service = WalletService::new(&state);
        let caller = AuthUser::new("u1", Role::Client);
        let top_up = || AddMoney {
            user_id: "u1".to_string(),
            amount: d("50.00"),
            reference: Some("pay_123".to_string()),
        };

        let first = service.add_money(&caller, top_up()).await.unwrap();
        let second = service.add_money(&caller, top_up()).await.unwrap();

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(second.transaction.id, first.transaction.id);
        assert_eq!(service.get(&caller, "u1").await.unwrap().balance, d("50.00"));
    }

    #[tokio::test]
    async fn top_up_checks_amount_and_owner() {
        let state = state_with_user("u1").await;
        let service = WalletService::new(&state);
        let caller = AuthUser::new("u1", Role::Client);

        for amount in ["0", "5", "10.001"] {
            let err = service
                .add_money(&caller, AddMoney { user_id: "u1".to_string(), amount: d(amount), reference: None })
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation { .. }), "amount {}", amount);
        }

        let err = service
            .add_money(
                &AuthUser::new("u2", Role::Client),
                AddMoney { user_id: "u1".to_string(), amount: d("20"), reference: None },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn payout_requires_verified_kyc_and_funds() {
        let state = state_with_user("cr").await;
        let service = WalletService::new(&state);
        let caller = AuthUser::new("cr", Role::Creator);
        service
            .add_money(&caller, AddMoney { user_id: "cr".to_string(), amount: d("30"), reference: None })
            .await
            .unwrap();
        let payout = |amount: &str| Payout { user_id: "cr".to_string(), amount: d(amount) };

        let err = service.payout(&caller, payout("10")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        state
            .store
            .upsert_kyc(UserKyc {
                user_id: "cr".to_string(),
                document_type: DocumentType::Pan,
                document_last4: "234F".to_string(),
                document_hash: "hash".to_string(),
                legal_name: "Asha Rao".to_string(),
                status: KycStatus::Verified,
                rejection_reason: None,
                submitted_at: Utc::now(),
                reviewed_at: Some(Utc::now()),
            })
            .await
            .unwrap();

        let err = service.payout(&caller, payout("30.01")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::InsufficientFunds { .. })));

        let outcome = service.payout(&caller, payout("30")).await.unwrap();
        assert!(outcome.wallet.balance.is_zero());
        assert_eq!(outcome.transaction.category, TransactionCategory::Payout);
    }
}
