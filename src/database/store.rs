use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::*;

/// Errors surfaced by every store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient funds: {needed} needed, {available} available")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Limit/offset window for list operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    #[serde(default = "Page::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 100;

    fn default_limit() -> i64 {
        20
    }

    /// Clamps caller-supplied values into a sane window.
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, Self::MAX_LIMIT),
            offset: self.offset.max(0),
        }
    }

    pub(crate) fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let page = self.clamped();
        items
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: Self::default_limit(), offset: 0 }
    }
}

/// A single balance movement to apply atomically with its ledger row
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub user_id: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub category: TransactionCategory,
    /// External reference; a repeated (user, reference) pair is not applied twice
    pub reference: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerOutcome {
    pub transaction: WalletTransaction,
    pub wallet: Wallet,
    /// True when `reference` matched an earlier entry and nothing moved
    pub replayed: bool,
}

/// What a finished session owes, computed before the wallet is locked
#[derive(Debug, Clone)]
pub struct SettlementPlan {
    pub session_id: String,
    pub session_kind: SessionKind,
    pub client_id: String,
    pub creator_id: String,
    pub rate: Decimal,
    pub duration_secs: i64,
    pub amount_due: Decimal,
    pub commission_percent: Decimal,
}

#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub settlement: Settlement,
    /// True when the session had already been settled
    pub replayed: bool,
}

/// Persistence boundary. Every method that moves money or changes a
/// lifecycle state is atomic within the backend.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn health_check(&self) -> StoreResult<()>;

    // Creators and clients. Inserting a user also opens its zero-balance wallet.
    async fn insert_creator(&self, creator: Creator) -> StoreResult<Creator>;
    async fn get_creator(&self, id: &str) -> StoreResult<Option<Creator>>;
    async fn get_creator_by_username(&self, username: &str) -> StoreResult<Option<Creator>>;
    async fn get_creator_by_referral_code(&self, code: &str) -> StoreResult<Option<Creator>>;
    async fn update_creator(&self, creator: Creator) -> StoreResult<Creator>;
    async fn insert_client(&self, client: Client) -> StoreResult<Client>;
    async fn get_client(&self, id: &str) -> StoreResult<Option<Client>>;
    async fn update_client(&self, client: Client) -> StoreResult<Client>;

    // Wallets
    async fn get_wallet(&self, user_id: &str) -> StoreResult<Option<Wallet>>;
    async fn list_transactions(&self, user_id: &str, page: Page) -> StoreResult<Vec<WalletTransaction>>;
    async fn apply_ledger_entry(&self, entry: LedgerEntry) -> StoreResult<LedgerOutcome>;
    async fn settle_session(&self, plan: SettlementPlan) -> StoreResult<SettlementOutcome>;
    async fn get_settlement(&self, session_id: &str) -> StoreResult<Option<Settlement>>;

    // Calls
    async fn insert_call(&self, call: Call) -> StoreResult<Call>;
    async fn get_call(&self, call_id: &str) -> StoreResult<Option<Call>>;
    /// Replaces the call only if its stored status is still `expected`.
    async fn transition_call(&self, expected: CallStatus, call: Call) -> StoreResult<Call>;
    async fn list_calls_for_user(&self, user_id: &str, page: Page) -> StoreResult<Vec<Call>>;

    // Chats
    async fn insert_chat(&self, chat: Chat) -> StoreResult<Chat>;
    async fn get_chat(&self, chat_id: &str) -> StoreResult<Option<Chat>>;
    async fn list_chats_for_user(&self, user_id: &str, page: Page) -> StoreResult<Vec<Chat>>;
    /// Moves an active chat to ended; conflicts if it already ended.
    async fn end_chat(&self, chat_id: &str, ended_at: DateTime<Utc>, duration_secs: i64) -> StoreResult<Chat>;
    async fn append_message(&self, message: ChatMessage) -> StoreResult<ChatMessage>;
    async fn list_messages(&self, chat_id: &str, page: Page) -> StoreResult<Vec<ChatMessage>>;
    /// Marks every unseen message not sent by `reader_id` as seen, returns how many changed.
    async fn mark_messages_seen(&self, chat_id: &str, reader_id: &str) -> StoreResult<u64>;

    // Feedback
    async fn insert_feedback(&self, feedback: Feedback) -> StoreResult<Feedback>;
    async fn get_feedback(&self, id: uuid::Uuid) -> StoreResult<Option<Feedback>>;
    async fn list_feedback_for_creator(&self, creator_id: &str, include_hidden: bool) -> StoreResult<Vec<Feedback>>;
    async fn set_feedback_visibility(&self, id: uuid::Uuid, show_on_profile: bool) -> StoreResult<Feedback>;

    // Notifications
    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification>;
    async fn list_notifications(&self, user_id: &str, unread_only: bool, page: Page) -> StoreResult<Vec<Notification>>;
    async fn mark_notification_read(&self, id: uuid::Uuid, user_id: &str) -> StoreResult<Notification>;
    async fn mark_all_notifications_read(&self, user_id: &str) -> StoreResult<u64>;
    async fn get_consent(&self, user_id: &str) -> StoreResult<Option<NotificationConsent>>;
    async fn upsert_consent(&self, consent: NotificationConsent) -> StoreResult<NotificationConsent>;

    // KYC
    async fn get_kyc(&self, user_id: &str) -> StoreResult<Option<UserKyc>>;
    async fn upsert_kyc(&self, kyc: UserKyc) -> StoreResult<UserKyc>;
    /// Records a decision on a pending submission; conflicts otherwise.
    async fn review_kyc(
        &self,
        user_id: &str,
        status: KycStatus,
        reason: Option<String>,
        reviewed_at: DateTime<Utc>,
    ) -> StoreResult<UserKyc>;

    // Referrals
    async fn insert_referral(&self, referral: Referral) -> StoreResult<Referral>;
    async fn list_referrals(&self, referrer_id: &str) -> StoreResult<Vec<Referral>>;

    // Analytics integrations
    async fn get_analytics(&self, creator_id: &str) -> StoreResult<Option<AnalyticsIntegration>>;
    async fn upsert_analytics(&self, integration: AnalyticsIntegration) -> StoreResult<AnalyticsIntegration>;
}
