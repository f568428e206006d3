use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::*;
use super::store::*;
use crate::billing;

#[derive(Default)]
struct MemoryState {
    creators: HashMap<String, Creator>,
    clients: HashMap<String, Client>,
    wallets: HashMap<String, Wallet>,
    transactions: Vec<WalletTransaction>,
    settlements: HashMap<String, Settlement>,
    calls: HashMap<String, Call>,
    chats: HashMap<String, Chat>,
    messages: HashMap<String, Vec<ChatMessage>>,
    feedback: Vec<Feedback>,
    notifications: Vec<Notification>,
    consents: HashMap<String, NotificationConsent>,
    kyc: HashMap<String, UserKyc>,
    referrals: Vec<Referral>,
    analytics: HashMap<String, AnalyticsIntegration>,
}

impl MemoryState {
    fn open_wallet(&mut self, user_id: &str, now: DateTime<Utc>) {
        self.wallets.entry(user_id.to_string()).or_insert_with(|| Wallet {
            user_id: user_id.to_string(),
            balance: billing::round_money(Decimal::ZERO),
            updated_at: now,
        });
    }

    fn username_taken(&self, username: &str, except_id: &str) -> bool {
        self.creators
            .values()
            .any(|c| c.id != except_id && c.username.eq_ignore_ascii_case(username))
    }

    /// Applies one balance movement and appends its ledger row.
    fn post_entry(&mut self, entry: LedgerEntry, now: DateTime<Utc>) -> StoreResult<(WalletTransaction, Wallet)> {
        // Same precision as the NUMERIC(14, 2) columns
        let amount = billing::round_money(entry.amount);
        let wallet = self
            .wallets
            .get_mut(&entry.user_id)
            .ok_or_else(|| StoreError::NotFound(format!("wallet for user {}", entry.user_id)))?;

        let next = match entry.kind {
            TransactionKind::Credit => wallet.balance + amount,
            TransactionKind::Debit => {
                if amount > wallet.balance {
                    return Err(StoreError::InsufficientFunds {
                        needed: amount,
                        available: wallet.balance,
                    });
                }
                wallet.balance - amount
            }
        };
        wallet.balance = next;
        wallet.updated_at = now;
        let wallet = wallet.clone();

        let transaction = WalletTransaction {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            amount,
            kind: entry.kind,
            category: entry.category,
            reference: entry.reference,
            description: entry.description,
            balance_after: next,
            created_at: now,
        };
        self.transactions.push(transaction.clone());
        Ok((transaction, wallet))
    }
}

/// Process-local store. Every operation runs under one lock, which makes
/// balance changes and status transitions trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        let _state = self.state.read().await;
        Ok(())
    }

    async fn insert_creator(&self, creator: Creator) -> StoreResult<Creator> {
        let mut state = self.state.write().await;
        if state.creators.contains_key(&creator.id) {
            return Err(StoreError::Conflict(format!("creator {} already exists", creator.id)));
        }
        if state.username_taken(&creator.username, &creator.id) {
            return Err(StoreError::Conflict(format!("username '{}' is taken", creator.username)));
        }
        if state.creators.values().any(|c| c.referral_code == creator.referral_code) {
            return Err(StoreError::Conflict(format!(
                "referral code {} is already in use",
                creator.referral_code
            )));
        }
        state.open_wallet(&creator.id, creator.created_at);
        state.creators.insert(creator.id.clone(), creator.clone());
        Ok(creator)
    }

    async fn get_creator(&self, id: &str) -> StoreResult<Option<Creator>> {
        Ok(self.state.read().await.creators.get(id).cloned())
    }

    async fn get_creator_by_username(&self, username: &str) -> StoreResult<Option<Creator>> {
        let state = self.state.read().await;
        Ok(state
            .creators
            .values()
            .find(|c| c.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn get_creator_by_referral_code(&self, code: &str) -> StoreResult<Option<Creator>> {
        let state = self.state.read().await;
        Ok(state.creators.values().find(|c| c.referral_code == code).cloned())
    }

    async fn update_creator(&self, creator: Creator) -> StoreResult<Creator> {
        let mut state = self.state.write().await;
        if !state.creators.contains_key(&creator.id) {
            return Err(StoreError::NotFound(format!("creator {}", creator.id)));
        }
        if state.username_taken(&creator.username, &creator.id) {
            return Err(StoreError::Conflict(format!("username '{}' is taken", creator.username)));
        }
        state.creators.insert(creator.id.clone(), creator.clone());
        Ok(creator)
    }

    async fn insert_client(&self, client: Client) -> StoreResult<Client> {
        let mut state = self.state.write().await;
        if state.clients.contains_key(&client.id) {
            return Err(StoreError::Conflict(format!("client {} already exists", client.id)));
        }
        state.open_wallet(&client.id, client.created_at);
        state.clients.insert(client.id.clone(), client.clone());
        Ok(client)
    }

    async fn get_client(&self, id: &str) -> StoreResult<Option<Client>> {
        Ok(self.state.read().await.clients.get(id).cloned())
    }

    async fn update_client(&self, client: Client) -> StoreResult<Client> {
        let mut state = self.state.write().await;
        match state.clients.get_mut(&client.id) {
            Some(existing) => {
                *existing = client.clone();
                Ok(client)
            }
            None => Err(StoreError::NotFound(format!("client {}", client.id))),
        }
    }

    async fn get_wallet(&self, user_id: &str) -> StoreResult<Option<Wallet>> {
        Ok(self.state.read().await.wallets.get(user_id).cloned())
    }

    async fn list_transactions(&self, user_id: &str, page: Page) -> StoreResult<Vec<WalletTransaction>> {
        let state = self.state.read().await;
        let mut rows: Vec<WalletTransaction> = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        // Insertion order breaks ties between rows written in the same instant
        rows.reverse();
        newest_first(&mut rows, |t| t.created_at);
        Ok(page.slice(&rows))
    }

    async fn apply_ledger_entry(&self, entry: LedgerEntry) -> StoreResult<LedgerOutcome> {
        let mut state = self.state.write().await;

        // Settlement rows reuse the session id as their reference, so only
        // rows of the same category count as a replay
        if let Some(reference) = entry.reference.as_deref() {
            let previous = state
                .transactions
                .iter()
                .find(|t| {
                    t.user_id == entry.user_id
                        && t.category == entry.category
                        && t.reference.as_deref() == Some(reference)
                })
                .cloned();
            if let Some(transaction) = previous {
                let wallet = state
                    .wallets
                    .get(&entry.user_id)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(format!("wallet for user {}", entry.user_id)))?;
                return Ok(LedgerOutcome { transaction, wallet, replayed: true });
            }
        }

        let (transaction, wallet) = state.post_entry(entry, Utc::now())?;
        Ok(LedgerOutcome { transaction, wallet, replayed: false })
    }

    async fn settle_session(&self, plan: SettlementPlan) -> StoreResult<SettlementOutcome> {
        let mut state = self.state.write().await;

        if let Some(existing) = state.settlements.get(&plan.session_id) {
            return Ok(SettlementOutcome { settlement: existing.clone(), replayed: true });
        }

        let available = state
            .wallets
            .get(&plan.client_id)
            .map(|w| w.balance)
            .ok_or_else(|| StoreError::NotFound(format!("wallet for user {}", plan.client_id)))?;
        if !state.wallets.contains_key(&plan.creator_id) {
            return Err(StoreError::NotFound(format!("wallet for user {}", plan.creator_id)));
        }

        let now = Utc::now();
        let charged = billing::round_money(plan.amount_due.min(available.max(Decimal::ZERO)));
        let (platform_fee, creator_earning) = billing::split(charged, plan.commission_percent);

        if charged > Decimal::ZERO {
            state.post_entry(
                LedgerEntry {
                    user_id: plan.client_id.clone(),
                    amount: charged,
                    kind: TransactionKind::Debit,
                    category: TransactionCategory::SessionCharge,
                    reference: Some(plan.session_id.clone()),
                    description: format!("{} session {}", plan.session_kind, plan.session_id),
                },
                now,
            )?;
        }
        if creator_earning > Decimal::ZERO {
            state.post_entry(
                LedgerEntry {
                    user_id: plan.creator_id.clone(),
                    amount: creator_earning,
                    kind: TransactionKind::Credit,
                    category: TransactionCategory::SessionEarning,
                    reference: Some(plan.session_id.clone()),
                    description: format!("{} session {}", plan.session_kind, plan.session_id),
                },
                now,
            )?;
        }

        let settlement = Settlement {
            session_id: plan.session_id,
            session_kind: plan.session_kind,
            client_id: plan.client_id,
            creator_id: plan.creator_id,
            rate: plan.rate,
            duration_secs: plan.duration_secs,
            amount_due: plan.amount_due,
            amount_charged: charged,
            platform_fee,
            creator_earning,
            settled_at: now,
        };
        state.settlements.insert(settlement.session_id.clone(), settlement.clone());
        Ok(SettlementOutcome { settlement, replayed: false })
    }

    async fn get_settlement(&self, session_id: &str) -> StoreResult<Option<Settlement>> {
        Ok(self.state.read().await.settlements.get(session_id).cloned())
    }

    async fn insert_call(&self, call: Call) -> StoreResult<Call> {
        let mut state = self.state.write().await;
        if state.calls.contains_key(&call.call_id) {
            return Err(StoreError::Conflict(format!("call {} already registered", call.call_id)));
        }
        state.calls.insert(call.call_id.clone(), call.clone());
        Ok(call)
    }

    async fn get_call(&self, call_id: &str) -> StoreResult<Option<Call>> {
        Ok(self.state.read().await.calls.get(call_id).cloned())
    }

    async fn transition_call(&self, expected: CallStatus, call: Call) -> StoreResult<Call> {
        let mut state = self.state.write().await;
        let stored = state
            .calls
            .get_mut(&call.call_id)
            .ok_or_else(|| StoreError::NotFound(format!("call {}", call.call_id)))?;
        if stored.status != expected {
            return Err(StoreError::Conflict(format!(
                "call {} is {}, expected {}",
                call.call_id, stored.status, expected
            )));
        }
        *stored = call.clone();
        Ok(call)
    }

    async fn list_calls_for_user(&self, user_id: &str, page: Page) -> StoreResult<Vec<Call>> {
        let state = self.state.read().await;
        let mut calls: Vec<Call> = state.calls.values().filter(|c| c.is_participant(user_id)).cloned().collect();
        newest_first(&mut calls, |c| c.created_at);
        Ok(page.slice(&calls))
    }

    async fn insert_chat(&self, chat: Chat) -> StoreResult<Chat> {
        let mut state = self.state.write().await;
        if state.chats.contains_key(&chat.chat_id) {
            return Err(StoreError::Conflict(format!("chat {} already exists", chat.chat_id)));
        }
        state.chats.insert(chat.chat_id.clone(), chat.clone());
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: &str) -> StoreResult<Option<Chat>> {
        Ok(self.state.read().await.chats.get(chat_id).cloned())
    }

    async fn list_chats_for_user(&self, user_id: &str, page: Page) -> StoreResult<Vec<Chat>> {
        let state = self.state.read().await;
        let mut chats: Vec<Chat> = state.chats.values().filter(|c| c.is_participant(user_id)).cloned().collect();
        newest_first(&mut chats, |c| c.created_at);
        Ok(page.slice(&chats))
    }

    async fn end_chat(&self, chat_id: &str, ended_at: DateTime<Utc>, duration_secs: i64) -> StoreResult<Chat> {
        let mut state = self.state.write().await;
        let chat = state
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| StoreError::NotFound(format!("chat {}", chat_id)))?;
        if chat.status != ChatStatus::Active {
            return Err(StoreError::Conflict(format!("chat {} already ended", chat_id)));
        }
        chat.status = ChatStatus::Ended;
        chat.ended_at = Some(ended_at);
        chat.duration_secs = Some(duration_secs);
        Ok(chat.clone())
    }

    async fn append_message(&self, message: ChatMessage) -> StoreResult<ChatMessage> {
        let mut state = self.state.write().await;
        match state.chats.get(&message.chat_id) {
            None => return Err(StoreError::NotFound(format!("chat {}", message.chat_id))),
            Some(chat) if chat.status != ChatStatus::Active => {
                return Err(StoreError::Conflict(format!("chat {} has ended", message.chat_id)))
            }
            Some(_) => {}
        }
        state
            .messages
            .entry(message.chat_id.clone())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, chat_id: &str, page: Page) -> StoreResult<Vec<ChatMessage>> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .get(chat_id)
            .map(|messages| page.slice(messages))
            .unwrap_or_default())
    }

    async fn mark_messages_seen(&self, chat_id: &str, reader_id: &str) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let Some(messages) = state.messages.get_mut(chat_id) else {
            return Ok(0);
        };
        let mut changed = 0;
        for message in messages.iter_mut().filter(|m| !m.seen && m.sender_id != reader_id) {
            message.seen = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn insert_feedback(&self, feedback: Feedback) -> StoreResult<Feedback> {
        let mut state = self.state.write().await;
        let duplicate = state
            .feedback
            .iter()
            .any(|f| f.session_id == feedback.session_id && f.client_id == feedback.client_id);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "feedback for session {} already submitted",
                feedback.session_id
            )));
        }
        state.feedback.push(feedback.clone());
        Ok(feedback)
    }

    async fn get_feedback(&self, id: Uuid) -> StoreResult<Option<Feedback>> {
        Ok(self.state.read().await.feedback.iter().find(|f| f.id == id).cloned())
    }

    async fn list_feedback_for_creator(&self, creator_id: &str, include_hidden: bool) -> StoreResult<Vec<Feedback>> {
        let state = self.state.read().await;
        let mut rows: Vec<Feedback> = state
            .feedback
            .iter()
            .filter(|f| f.creator_id == creator_id && (include_hidden || f.show_on_profile))
            .cloned()
            .collect();
        newest_first(&mut rows, |f| f.created_at);
        Ok(rows)
    }

    async fn set_feedback_visibility(&self, id: Uuid, show_on_profile: bool) -> StoreResult<Feedback> {
        let mut state = self.state.write().await;
        let feedback = state
            .feedback
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("feedback {}", id)))?;
        feedback.show_on_profile = show_on_profile;
        Ok(feedback.clone())
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification> {
        self.state.write().await.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, user_id: &str, unread_only: bool, page: Page) -> StoreResult<Vec<Notification>> {
        let state = self.state.read().await;
        let mut rows: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        rows.reverse();
        newest_first(&mut rows, |n| n.created_at);
        Ok(page.slice(&rows))
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: &str) -> StoreResult<Notification> {
        let mut state = self.state.write().await;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {}", id)))?;
        notification.read = true;
        Ok(notification.clone())
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for notification in state.notifications.iter_mut().filter(|n| n.user_id == user_id && !n.read) {
            notification.read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn get_consent(&self, user_id: &str) -> StoreResult<Option<NotificationConsent>> {
        Ok(self.state.read().await.consents.get(user_id).cloned())
    }

    async fn upsert_consent(&self, consent: NotificationConsent) -> StoreResult<NotificationConsent> {
        self.state
            .write()
            .await
            .consents
            .insert(consent.user_id.clone(), consent.clone());
        Ok(consent)
    }

    async fn get_kyc(&self, user_id: &str) -> StoreResult<Option<UserKyc>> {
        Ok(self.state.read().await.kyc.get(user_id).cloned())
    }

    async fn upsert_kyc(&self, kyc: UserKyc) -> StoreResult<UserKyc> {
        self.state.write().await.kyc.insert(kyc.user_id.clone(), kyc.clone());
        Ok(kyc)
    }

    async fn review_kyc(
        &self,
        user_id: &str,
        status: KycStatus,
        reason: Option<String>,
        reviewed_at: DateTime<Utc>,
    ) -> StoreResult<UserKyc> {
        let mut state = self.state.write().await;
        let kyc = state
            .kyc
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("kyc for user {}", user_id)))?;
        if kyc.status != KycStatus::Pending {
            return Err(StoreError::Conflict(format!("kyc for user {} is already {}", user_id, kyc.status)));
        }
        kyc.status = status;
        kyc.rejection_reason = reason;
        kyc.reviewed_at = Some(reviewed_at);
        Ok(kyc.clone())
    }

    async fn insert_referral(&self, referral: Referral) -> StoreResult<Referral> {
        let mut state = self.state.write().await;
        if state.referrals.iter().any(|r| r.referred_id == referral.referred_id) {
            return Err(StoreError::Conflict(format!("user {} was already referred", referral.referred_id)));
        }
        state.referrals.push(referral.clone());
        Ok(referral)
    }

    async fn list_referrals(&self, referrer_id: &str) -> StoreResult<Vec<Referral>> {
        let state = self.state.read().await;
        let mut rows: Vec<Referral> = state
            .referrals
            .iter()
            .filter(|r| r.referrer_id == referrer_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |r| r.created_at);
        Ok(rows)
    }

    async fn get_analytics(&self, creator_id: &str) -> StoreResult<Option<AnalyticsIntegration>> {
        Ok(self.state.read().await.analytics.get(creator_id).cloned())
    }

    async fn upsert_analytics(&self, integration: AnalyticsIntegration) -> StoreResult<AnalyticsIntegration> {
        self.state
            .write()
            .await
            .analytics
            .insert(integration.creator_id.clone(), integration.clone());
        Ok(integration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn client(id: &str) -> Client {
        let now = Utc::now();
        Client {
            id: id.to_string(),
            username: id.to_string(),
            full_name: "Test Client".to_string(),
            phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn creator(id: &str, username: &str) -> Creator {
        let now = Utc::now();
        Creator {
            id: id.to_string(),
            username: username.to_string(),
            full_name: "Test Creator".to_string(),
            phone: None,
            bio: None,
            photo_url: None,
            rates: Rates::default(),
            services: Services::default(),
            online: false,
            referral_code: format!("CODE{}", id),
            availability: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn top_up(user_id: &str, amount: &str, reference: Option<&str>) -> LedgerEntry {
        LedgerEntry {
            user_id: user_id.to_string(),
            amount: d(amount),
            kind: TransactionKind::Credit,
            category: TransactionCategory::TopUp,
            reference: reference.map(str::to_string),
            description: "top up".to_string(),
        }
    }

    fn plan(session_id: &str, due: &str) -> SettlementPlan {
        SettlementPlan {
            session_id: session_id.to_string(),
            session_kind: SessionKind::Video,
            client_id: "cl".to_string(),
            creator_id: "cr".to_string(),
            rate: d("10"),
            duration_secs: 120,
            amount_due: d(due),
            commission_percent: d("20"),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_client(client("cl")).await.unwrap();
        store.insert_creator(creator("cr", "maya")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn usernames_are_unique_ignoring_case() {
        let store = seeded().await;
        let err = store.insert_creator(creator("cr2", "MAYA")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn top_up_with_reference_is_applied_once() {
        let store = seeded().await;
        let first = store.apply_ledger_entry(top_up("cl", "50", Some("pay_1"))).await.unwrap();
        let second = store.apply_ledger_entry(top_up("cl", "50", Some("pay_1"))).await.unwrap();

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(second.transaction.id, first.transaction.id);
        assert_eq!(store.get_wallet("cl").await.unwrap().unwrap().balance, d("50"));
    }

    #[tokio::test]
    async fn referral_codes_are_unique() {
        let store = seeded().await;
        let mut twin = creator("cr2", "leela");
        twin.referral_code = "CODEcr".to_string();

        match store.insert_creator(twin).await.unwrap_err() {
            StoreError::Conflict(message) => assert!(message.contains("referral code"), "{}", message),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.get_creator("cr2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn top_up_reference_matching_a_settled_session_is_a_new_credit() {
        let store = seeded().await;
        store.apply_ledger_entry(top_up("cl", "100", None)).await.unwrap();
        store.settle_session(plan("c1", "10.00")).await.unwrap();

        let outcome = store.apply_ledger_entry(top_up("cl", "50", Some("c1"))).await.unwrap();
        assert!(!outcome.replayed);
        assert_eq!(outcome.transaction.category, TransactionCategory::TopUp);
        assert_eq!(outcome.wallet.balance.to_string(), "140.00");
    }

    #[tokio::test]
    async fn session_settles_after_top_up_reusing_its_id() {
        let store = seeded().await;
        store.apply_ledger_entry(top_up("cl", "100", Some("c1"))).await.unwrap();

        let outcome = store.settle_session(plan("c1", "10.00")).await.unwrap();
        assert_eq!(outcome.settlement.amount_charged.to_string(), "10.00");
        assert_eq!(store.get_wallet("cl").await.unwrap().unwrap().balance.to_string(), "90.00");
        assert_eq!(store.get_wallet("cr").await.unwrap().unwrap().balance.to_string(), "8.00");

        let replay = store.apply_ledger_entry(top_up("cl", "100", Some("c1"))).await.unwrap();
        assert!(replay.replayed);
        assert_eq!(replay.transaction.category, TransactionCategory::TopUp);
    }

    #[tokio::test]
    async fn debit_never_overdraws() {
        let store = seeded().await;
        store.apply_ledger_entry(top_up("cl", "5", None)).await.unwrap();
        let err = store
            .apply_ledger_entry(LedgerEntry {
                kind: TransactionKind::Debit,
                category: TransactionCategory::Payout,
                ..top_up("cl", "6", None)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { .. }));
        assert_eq!(store.get_wallet("cl").await.unwrap().unwrap().balance, d("5"));
        assert_eq!(store.list_transactions("cl", Page::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settlement_moves_money_once() {
        let store = seeded().await;
        store.apply_ledger_entry(top_up("cl", "100", None)).await.unwrap();

        let first = store.settle_session(plan("call-1", "20.00")).await.unwrap();
        assert!(!first.replayed);
        assert_eq!(first.settlement.amount_charged, d("20.00"));
        assert_eq!(first.settlement.platform_fee, d("4.00"));
        assert_eq!(first.settlement.creator_earning, d("16.00"));

        let again = store.settle_session(plan("call-1", "20.00")).await.unwrap();
        assert!(again.replayed);

        assert_eq!(store.get_wallet("cl").await.unwrap().unwrap().balance, d("80.00"));
        assert_eq!(store.get_wallet("cr").await.unwrap().unwrap().balance, d("16.00"));
    }

    #[tokio::test]
    async fn settlement_is_capped_by_client_balance() {
        let store = seeded().await;
        store.apply_ledger_entry(top_up("cl", "12.50", None)).await.unwrap();

        let outcome = store.settle_session(plan("call-2", "20.00")).await.unwrap();
        assert_eq!(outcome.settlement.amount_due, d("20.00"));
        assert_eq!(outcome.settlement.amount_charged, d("12.50"));
        assert_eq!(store.get_wallet("cl").await.unwrap().unwrap().balance, Decimal::ZERO);
        assert_eq!(store.get_wallet("cr").await.unwrap().unwrap().balance, d("10.00"));
    }

    #[tokio::test]
    async fn mark_seen_only_touches_the_other_party() {
        let store = seeded().await;
        let now = Utc::now();
        store
            .insert_chat(Chat {
                chat_id: "chat-1".to_string(),
                creator_id: "cr".to_string(),
                client_id: "cl".to_string(),
                status: ChatStatus::Active,
                created_at: now,
                ended_at: None,
                duration_secs: None,
            })
            .await
            .unwrap();
        for sender in ["cl", "cr", "cl"] {
            store
                .append_message(ChatMessage {
                    id: Uuid::new_v4(),
                    chat_id: "chat-1".to_string(),
                    sender_id: sender.to_string(),
                    text: "hi".to_string(),
                    seen: false,
                    created_at: now,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.mark_messages_seen("chat-1", "cr").await.unwrap(), 2);
        assert_eq!(store.mark_messages_seen("chat-1", "cr").await.unwrap(), 0);
        let messages = store.list_messages("chat-1", Page::default()).await.unwrap();
        assert!(!messages[1].seen);
    }

    #[tokio::test]
    async fn stale_call_transition_conflicts() {
        let store = seeded().await;
        let call = Call {
            call_id: "c1".to_string(),
            kind: SessionKind::Audio,
            creator_id: "cr".to_string(),
            client_id: "cl".to_string(),
            status: CallStatus::Initiated,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            duration_secs: None,
        };
        store.insert_call(call.clone()).await.unwrap();

        let ongoing = Call { status: CallStatus::Ongoing, ..call.clone() };
        store.transition_call(CallStatus::Initiated, ongoing).await.unwrap();

        let missed = Call { status: CallStatus::Missed, ..call };
        let err = store.transition_call(CallStatus::Initiated, missed).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
