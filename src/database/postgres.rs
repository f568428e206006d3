use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgRow, PgConnection, PgPool, Row};
use uuid::Uuid;

use super::models::*;
use super::store::*;
use crate::billing;

/// Postgres-backed store. Money movements lock the affected wallet rows
/// (`SELECT ... FOR UPDATE`) inside one transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn tag<T>(raw: String) -> StoreResult<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    raw.parse().map_err(|e: UnknownVariant| StoreError::Corrupt(e.to_string()))
}

fn unique_conflict(err: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(message()),
        _ => StoreError::Database(err),
    }
}

/// Names the unique constraint a creator insert tripped over.
fn creator_conflict(err: sqlx::Error, creator: &Creator) -> StoreError {
    let message = match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => match db.constraint() {
            Some("creators_referral_code_key") => {
                format!("referral code {} is already in use", creator.referral_code)
            }
            Some("creators_username_lower") => format!("username '{}' is taken", creator.username),
            _ => format!("creator {} already exists", creator.id),
        },
        _ => return StoreError::Database(err),
    };
    StoreError::Conflict(message)
}

fn creator_from_row(row: &PgRow) -> StoreResult<Creator> {
    let availability: serde_json::Value = row.try_get("availability")?;
    Ok(Creator {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        phone: row.try_get("phone")?,
        bio: row.try_get("bio")?,
        photo_url: row.try_get("photo_url")?,
        rates: Rates {
            video: row.try_get("video_rate")?,
            audio: row.try_get("audio_rate")?,
            chat: row.try_get("chat_rate")?,
        },
        services: Services {
            video: row.try_get("video_enabled")?,
            audio: row.try_get("audio_enabled")?,
            chat: row.try_get("chat_enabled")?,
        },
        online: row.try_get("online")?,
        referral_code: row.try_get("referral_code")?,
        availability: serde_json::from_value(availability)
            .map_err(|e| StoreError::Corrupt(format!("availability: {}", e)))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn client_from_row(row: &PgRow) -> StoreResult<Client> {
    Ok(Client {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        phone: row.try_get("phone")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn wallet_from_row(row: &PgRow) -> StoreResult<Wallet> {
    Ok(Wallet {
        user_id: row.try_get("user_id")?,
        balance: row.try_get("balance")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> StoreResult<WalletTransaction> {
    Ok(WalletTransaction {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        amount: row.try_get("amount")?,
        kind: tag(row.try_get("kind")?)?,
        category: tag(row.try_get("category")?)?,
        reference: row.try_get("reference")?,
        description: row.try_get("description")?,
        balance_after: row.try_get("balance_after")?,
        created_at: row.try_get("created_at")?,
    })
}

fn settlement_from_row(row: &PgRow) -> StoreResult<Settlement> {
    Ok(Settlement {
        session_id: row.try_get("session_id")?,
        session_kind: tag(row.try_get("session_kind")?)?,
        client_id: row.try_get("client_id")?,
        creator_id: row.try_get("creator_id")?,
        rate: row.try_get("rate")?,
        duration_secs: row.try_get("duration_secs")?,
        amount_due: row.try_get("amount_due")?,
        amount_charged: row.try_get("amount_charged")?,
        platform_fee: row.try_get("platform_fee")?,
        creator_earning: row.try_get("creator_earning")?,
        settled_at: row.try_get("settled_at")?,
    })
}

fn call_from_row(row: &PgRow) -> StoreResult<Call> {
    Ok(Call {
        call_id: row.try_get("call_id")?,
        kind: tag(row.try_get("kind")?)?,
        creator_id: row.try_get("creator_id")?,
        client_id: row.try_get("client_id")?,
        status: tag(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        ended_at: row.try_get("ended_at")?,
        duration_secs: row.try_get("duration_secs")?,
    })
}

fn chat_from_row(row: &PgRow) -> StoreResult<Chat> {
    Ok(Chat {
        chat_id: row.try_get("chat_id")?,
        creator_id: row.try_get("creator_id")?,
        client_id: row.try_get("client_id")?,
        status: tag(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
        ended_at: row.try_get("ended_at")?,
        duration_secs: row.try_get("duration_secs")?,
    })
}

fn message_from_row(row: &PgRow) -> StoreResult<ChatMessage> {
    Ok(ChatMessage {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        sender_id: row.try_get("sender_id")?,
        text: row.try_get("text")?,
        seen: row.try_get("seen")?,
        created_at: row.try_get("created_at")?,
    })
}

fn feedback_from_row(row: &PgRow) -> StoreResult<Feedback> {
    let rating: i16 = row.try_get("rating")?;
    Ok(Feedback {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        creator_id: row.try_get("creator_id")?,
        client_id: row.try_get("client_id")?,
        rating: u8::try_from(rating).map_err(|_| StoreError::Corrupt(format!("rating {}", rating)))?,
        text: row.try_get("text")?,
        show_on_profile: row.try_get("show_on_profile")?,
        created_at: row.try_get("created_at")?,
    })
}

fn notification_from_row(row: &PgRow) -> StoreResult<Notification> {
    Ok(Notification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: tag(row.try_get("kind")?)?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        read: row.try_get("read")?,
        created_at: row.try_get("created_at")?,
    })
}

fn consent_from_row(row: &PgRow) -> StoreResult<NotificationConsent> {
    Ok(NotificationConsent {
        user_id: row.try_get("user_id")?,
        calls: row.try_get("calls")?,
        chats: row.try_get("chats")?,
        payments: row.try_get("payments")?,
        marketing: row.try_get("marketing")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn kyc_from_row(row: &PgRow) -> StoreResult<UserKyc> {
    Ok(UserKyc {
        user_id: row.try_get("user_id")?,
        document_type: tag(row.try_get("document_type")?)?,
        document_last4: row.try_get("document_last4")?,
        document_hash: row.try_get("document_hash")?,
        legal_name: row.try_get("legal_name")?,
        status: tag(row.try_get("status")?)?,
        rejection_reason: row.try_get("rejection_reason")?,
        submitted_at: row.try_get("submitted_at")?,
        reviewed_at: row.try_get("reviewed_at")?,
    })
}

fn referral_from_row(row: &PgRow) -> StoreResult<Referral> {
    Ok(Referral {
        id: row.try_get("id")?,
        referrer_id: row.try_get("referrer_id")?,
        referred_id: row.try_get("referred_id")?,
        code: row.try_get("code")?,
        created_at: row.try_get("created_at")?,
    })
}

fn analytics_from_row(row: &PgRow) -> StoreResult<AnalyticsIntegration> {
    Ok(AnalyticsIntegration {
        creator_id: row.try_get("creator_id")?,
        provider: tag(row.try_get("provider")?)?,
        measurement_id: row.try_get("measurement_id")?,
        enabled: row.try_get("enabled")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn collect<T>(rows: Vec<PgRow>, map: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(map).collect()
}

async fn open_wallet(conn: &mut PgConnection, user_id: &str, now: DateTime<Utc>) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO wallets (user_id, balance, updated_at) VALUES ($1, 0, $2) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Locks the wallets of `user_ids` in a stable order so concurrent
/// settlements between the same users cannot deadlock.
async fn lock_wallets(conn: &mut PgConnection, user_ids: &[&str]) -> StoreResult<Vec<Wallet>> {
    let ids: Vec<String> = user_ids.iter().map(|id| id.to_string()).collect();
    let rows = sqlx::query("SELECT * FROM wallets WHERE user_id = ANY($1) ORDER BY user_id FOR UPDATE")
        .bind(&ids)
        .fetch_all(conn)
        .await?;
    let wallets = collect(rows, wallet_from_row)?;
    for id in user_ids {
        if !wallets.iter().any(|w| w.user_id == *id) {
            return Err(StoreError::NotFound(format!("wallet for user {}", id)));
        }
    }
    Ok(wallets)
}

/// Writes one balance movement against an already locked wallet.
async fn post_entry(
    conn: &mut PgConnection,
    wallet: &Wallet,
    entry: LedgerEntry,
    now: DateTime<Utc>,
) -> StoreResult<(WalletTransaction, Wallet)> {
    let next = match entry.kind {
        TransactionKind::Credit => wallet.balance + entry.amount,
        TransactionKind::Debit => {
            if entry.amount > wallet.balance {
                return Err(StoreError::InsufficientFunds {
                    needed: entry.amount,
                    available: wallet.balance,
                });
            }
            wallet.balance - entry.amount
        }
    };

    let row = sqlx::query("UPDATE wallets SET balance = $2, updated_at = $3 WHERE user_id = $1 RETURNING *")
        .bind(&wallet.user_id)
        .bind(next)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
    let updated = wallet_from_row(&row)?;

    let row = sqlx::query(
        r#"
        INSERT INTO wallet_transactions
            (id, user_id, amount, kind, category, reference, description, balance_after, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&entry.user_id)
    .bind(entry.amount)
    .bind(entry.kind.as_str())
    .bind(entry.category.as_str())
    .bind(&entry.reference)
    .bind(&entry.description)
    .bind(next)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| unique_conflict(e, || format!("reference already used for user {}", entry.user_id)))?;

    Ok((transaction_from_row(&row)?, updated))
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_creator(&self, creator: Creator) -> StoreResult<Creator> {
        let availability = serde_json::to_value(&creator.availability)
            .map_err(|e| StoreError::Corrupt(format!("availability: {}", e)))?;
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            INSERT INTO creators
                (id, username, full_name, phone, bio, photo_url, video_rate, audio_rate, chat_rate,
                 video_enabled, audio_enabled, chat_enabled, online, referral_code, availability,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(&creator.id)
        .bind(&creator.username)
        .bind(&creator.full_name)
        .bind(&creator.phone)
        .bind(&creator.bio)
        .bind(&creator.photo_url)
        .bind(creator.rates.video)
        .bind(creator.rates.audio)
        .bind(creator.rates.chat)
        .bind(creator.services.video)
        .bind(creator.services.audio)
        .bind(creator.services.chat)
        .bind(creator.online)
        .bind(&creator.referral_code)
        .bind(availability)
        .bind(creator.created_at)
        .bind(creator.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| creator_conflict(e, &creator))?;
        open_wallet(&mut tx, &creator.id, creator.created_at).await?;
        tx.commit().await?;
        creator_from_row(&row)
    }

    async fn get_creator(&self, id: &str) -> StoreResult<Option<Creator>> {
        let row = sqlx::query("SELECT * FROM creators WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(creator_from_row).transpose()
    }

    async fn get_creator_by_username(&self, username: &str) -> StoreResult<Option<Creator>> {
        let row = sqlx::query("SELECT * FROM creators WHERE lower(username) = lower($1)")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(creator_from_row).transpose()
    }

    async fn get_creator_by_referral_code(&self, code: &str) -> StoreResult<Option<Creator>> {
        let row = sqlx::query("SELECT * FROM creators WHERE referral_code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(creator_from_row).transpose()
    }

    async fn update_creator(&self, creator: Creator) -> StoreResult<Creator> {
        let availability = serde_json::to_value(&creator.availability)
            .map_err(|e| StoreError::Corrupt(format!("availability: {}", e)))?;
        let row = sqlx::query(
            r#"
            UPDATE creators SET
                username = $2, full_name = $3, phone = $4, bio = $5, photo_url = $6,
                video_rate = $7, audio_rate = $8, chat_rate = $9,
                video_enabled = $10, audio_enabled = $11, chat_enabled = $12,
                online = $13, availability = $14, updated_at = $15
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(&creator.id)
        .bind(&creator.username)
        .bind(&creator.full_name)
        .bind(&creator.phone)
        .bind(&creator.bio)
        .bind(&creator.photo_url)
        .bind(creator.rates.video)
        .bind(creator.rates.audio)
        .bind(creator.rates.chat)
        .bind(creator.services.video)
        .bind(creator.services.audio)
        .bind(creator.services.chat)
        .bind(creator.online)
        .bind(availability)
        .bind(creator.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, || format!("username '{}' is taken", creator.username)))?;
        match row {
            Some(row) => creator_from_row(&row),
            None => Err(StoreError::NotFound(format!("creator {}", creator.id))),
        }
    }

    async fn insert_client(&self, client: Client) -> StoreResult<Client> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            INSERT INTO clients (id, username, full_name, phone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&client.id)
        .bind(&client.username)
        .bind(&client.full_name)
        .bind(&client.phone)
        .bind(client.created_at)
        .bind(client.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_conflict(e, || format!("client {} already exists", client.id)))?;
        open_wallet(&mut tx, &client.id, client.created_at).await?;
        tx.commit().await?;
        client_from_row(&row)
    }

    async fn get_client(&self, id: &str) -> StoreResult<Option<Client>> {
        let row = sqlx::query("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(client_from_row).transpose()
    }

    async fn update_client(&self, client: Client) -> StoreResult<Client> {
        let row = sqlx::query(
            r#"
            UPDATE clients SET username = $2, full_name = $3, phone = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(&client.id)
        .bind(&client.username)
        .bind(&client.full_name)
        .bind(&client.phone)
        .bind(client.updated_at)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => client_from_row(&row),
            None => Err(StoreError::NotFound(format!("client {}", client.id))),
        }
    }

    async fn get_wallet(&self, user_id: &str) -> StoreResult<Option<Wallet>> {
        let row = sqlx::query("SELECT * FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(wallet_from_row).transpose()
    }

    async fn list_transactions(&self, user_id: &str, page: Page) -> StoreResult<Vec<WalletTransaction>> {
        let page = page.clamped();
        let rows = sqlx::query(
            "SELECT * FROM wallet_transactions WHERE user_id = $1 ORDER BY created_at DESC, seq DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, transaction_from_row)
    }

    async fn apply_ledger_entry(&self, entry: LedgerEntry) -> StoreResult<LedgerOutcome> {
        let mut tx = self.pool.begin().await?;
        let wallet = lock_wallets(&mut tx, &[entry.user_id.as_str()])
            .await?
            .remove(0);

        // The wallet lock serializes entries for this user, so the lookup cannot race
        if let Some(reference) = entry.reference.as_deref() {
            let previous = sqlx::query(
                "SELECT * FROM wallet_transactions WHERE user_id = $1 AND category = $2 AND reference = $3",
            )
            .bind(&entry.user_id)
            .bind(entry.category.as_str())
            .bind(reference)
            .fetch_optional(&mut *tx)
            .await?;
            if let Some(row) = previous {
                let transaction = transaction_from_row(&row)?;
                tx.commit().await?;
                return Ok(LedgerOutcome { transaction, wallet, replayed: true });
            }
        }

        let (transaction, wallet) = post_entry(&mut tx, &wallet, entry, Utc::now()).await?;
        tx.commit().await?;
        Ok(LedgerOutcome { transaction, wallet, replayed: false })
    }

    async fn settle_session(&self, plan: SettlementPlan) -> StoreResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await?;
        let wallets = lock_wallets(&mut tx, &[plan.client_id.as_str(), plan.creator_id.as_str()]).await?;

        let existing = sqlx::query("SELECT * FROM settlements WHERE session_id = $1")
            .bind(&plan.session_id)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(row) = existing {
            let settlement = settlement_from_row(&row)?;
            tx.commit().await?;
            return Ok(SettlementOutcome { settlement, replayed: true });
        }

        let find = |id: &str| {
            wallets
                .iter()
                .find(|w| w.user_id == id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("wallet for user {}", id)))
        };
        let client_wallet = find(&plan.client_id)?;
        let creator_wallet = find(&plan.creator_id)?;

        let now = Utc::now();
        let charged = billing::round_money(plan.amount_due.min(client_wallet.balance.max(Decimal::ZERO)));
        let (platform_fee, creator_earning) = billing::split(charged, plan.commission_percent);
        let description = format!("{} session {}", plan.session_kind, plan.session_id);

        if charged > Decimal::ZERO {
            post_entry(
                &mut tx,
                &client_wallet,
                LedgerEntry {
                    user_id: plan.client_id.clone(),
                    amount: charged,
                    kind: TransactionKind::Debit,
                    category: TransactionCategory::SessionCharge,
                    reference: Some(plan.session_id.clone()),
                    description: description.clone(),
                },
                now,
            )
            .await?;
        }
        if creator_earning > Decimal::ZERO {
            post_entry(
                &mut tx,
                &creator_wallet,
                LedgerEntry {
                    user_id: plan.creator_id.clone(),
                    amount: creator_earning,
                    kind: TransactionKind::Credit,
                    category: TransactionCategory::SessionEarning,
                    reference: Some(plan.session_id.clone()),
                    description,
                },
                now,
            )
            .await?;
        }

        let row = sqlx::query(
            r#"
            INSERT INTO settlements
                (session_id, session_kind, client_id, creator_id, rate, duration_secs,
                 amount_due, amount_charged, platform_fee, creator_earning, settled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&plan.session_id)
        .bind(plan.session_kind.as_str())
        .bind(&plan.client_id)
        .bind(&plan.creator_id)
        .bind(plan.rate)
        .bind(plan.duration_secs)
        .bind(plan.amount_due)
        .bind(charged)
        .bind(platform_fee)
        .bind(creator_earning)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        let settlement = settlement_from_row(&row)?;
        tx.commit().await?;
        Ok(SettlementOutcome { settlement, replayed: false })
    }

    async fn get_settlement(&self, session_id: &str) -> StoreResult<Option<Settlement>> {
        let row = sqlx::query("SELECT * FROM settlements WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(settlement_from_row).transpose()
    }

    async fn insert_call(&self, call: Call) -> StoreResult<Call> {
        let row = sqlx::query(
            r#"
            INSERT INTO calls
                (call_id, kind, creator_id, client_id, status, created_at, started_at, ended_at, duration_secs)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&call.call_id)
        .bind(call.kind.as_str())
        .bind(&call.creator_id)
        .bind(&call.client_id)
        .bind(call.status.as_str())
        .bind(call.created_at)
        .bind(call.started_at)
        .bind(call.ended_at)
        .bind(call.duration_secs)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, || format!("call {} already registered", call.call_id)))?;
        call_from_row(&row)
    }

    async fn get_call(&self, call_id: &str) -> StoreResult<Option<Call>> {
        let row = sqlx::query("SELECT * FROM calls WHERE call_id = $1")
            .bind(call_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(call_from_row).transpose()
    }

    async fn transition_call(&self, expected: CallStatus, call: Call) -> StoreResult<Call> {
        let row = sqlx::query(
            r#"
            UPDATE calls SET status = $3, started_at = $4, ended_at = $5, duration_secs = $6
            WHERE call_id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(&call.call_id)
        .bind(expected.as_str())
        .bind(call.status.as_str())
        .bind(call.started_at)
        .bind(call.ended_at)
        .bind(call.duration_secs)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => call_from_row(&row),
            None => match self.get_call(&call.call_id).await? {
                Some(current) => Err(StoreError::Conflict(format!(
                    "call {} is {}, expected {}",
                    call.call_id, current.status, expected
                ))),
                None => Err(StoreError::NotFound(format!("call {}", call.call_id))),
            },
        }
    }

    async fn list_calls_for_user(&self, user_id: &str, page: Page) -> StoreResult<Vec<Call>> {
        let page = page.clamped();
        let rows = sqlx::query(
            r#"
            SELECT * FROM calls
            WHERE creator_id = $1 OR client_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, call_from_row)
    }

    async fn insert_chat(&self, chat: Chat) -> StoreResult<Chat> {
        let row = sqlx::query(
            r#"
            INSERT INTO chats (chat_id, creator_id, client_id, status, created_at, ended_at, duration_secs)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&chat.chat_id)
        .bind(&chat.creator_id)
        .bind(&chat.client_id)
        .bind(chat.status.as_str())
        .bind(chat.created_at)
        .bind(chat.ended_at)
        .bind(chat.duration_secs)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, || format!("chat {} already exists", chat.chat_id)))?;
        chat_from_row(&row)
    }

    async fn get_chat(&self, chat_id: &str) -> StoreResult<Option<Chat>> {
        let row = sqlx::query("SELECT * FROM chats WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(chat_from_row).transpose()
    }

    async fn list_chats_for_user(&self, user_id: &str, page: Page) -> StoreResult<Vec<Chat>> {
        let page = page.clamped();
        let rows = sqlx::query(
            r#"
            SELECT * FROM chats
            WHERE creator_id = $1 OR client_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, chat_from_row)
    }

    async fn end_chat(&self, chat_id: &str, ended_at: DateTime<Utc>, duration_secs: i64) -> StoreResult<Chat> {
        let row = sqlx::query(
            r#"
            UPDATE chats SET status = 'ended', ended_at = $2, duration_secs = $3
            WHERE chat_id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(chat_id)
        .bind(ended_at)
        .bind(duration_secs)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => chat_from_row(&row),
            None => match self.get_chat(chat_id).await? {
                Some(_) => Err(StoreError::Conflict(format!("chat {} already ended", chat_id))),
                None => Err(StoreError::NotFound(format!("chat {}", chat_id))),
            },
        }
    }

    async fn append_message(&self, message: ChatMessage) -> StoreResult<ChatMessage> {
        // Append-only: the insert is conditional on the chat still being active
        let row = sqlx::query(
            r#"
            INSERT INTO chat_messages (id, chat_id, sender_id, text, seen, created_at)
            SELECT $1, $2, $3, $4, FALSE, $5
            WHERE EXISTS (SELECT 1 FROM chats WHERE chat_id = $2 AND status = 'active')
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(&message.chat_id)
        .bind(&message.sender_id)
        .bind(&message.text)
        .bind(message.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => message_from_row(&row),
            None => match self.get_chat(&message.chat_id).await? {
                Some(_) => Err(StoreError::Conflict(format!("chat {} has ended", message.chat_id))),
                None => Err(StoreError::NotFound(format!("chat {}", message.chat_id))),
            },
        }
    }

    async fn list_messages(&self, chat_id: &str, page: Page) -> StoreResult<Vec<ChatMessage>> {
        let page = page.clamped();
        let rows = sqlx::query("SELECT * FROM chat_messages WHERE chat_id = $1 ORDER BY seq LIMIT $2 OFFSET $3")
            .bind(chat_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;
        collect(rows, message_from_row)
    }

    async fn mark_messages_seen(&self, chat_id: &str, reader_id: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE chat_messages SET seen = TRUE WHERE chat_id = $1 AND sender_id <> $2 AND NOT seen",
        )
        .bind(chat_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_feedback(&self, feedback: Feedback) -> StoreResult<Feedback> {
        let row = sqlx::query(
            r#"
            INSERT INTO feedback
                (id, session_id, creator_id, client_id, rating, text, show_on_profile, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(feedback.id)
        .bind(&feedback.session_id)
        .bind(&feedback.creator_id)
        .bind(&feedback.client_id)
        .bind(i16::from(feedback.rating))
        .bind(&feedback.text)
        .bind(feedback.show_on_profile)
        .bind(feedback.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, || format!("feedback for session {} already submitted", feedback.session_id)))?;
        feedback_from_row(&row)
    }

    async fn get_feedback(&self, id: Uuid) -> StoreResult<Option<Feedback>> {
        let row = sqlx::query("SELECT * FROM feedback WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(feedback_from_row).transpose()
    }

    async fn list_feedback_for_creator(&self, creator_id: &str, include_hidden: bool) -> StoreResult<Vec<Feedback>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM feedback
            WHERE creator_id = $1 AND ($2 OR show_on_profile)
            ORDER BY created_at DESC
            "#,
        )
        .bind(creator_id)
        .bind(include_hidden)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, feedback_from_row)
    }

    async fn set_feedback_visibility(&self, id: Uuid, show_on_profile: bool) -> StoreResult<Feedback> {
        let row = sqlx::query("UPDATE feedback SET show_on_profile = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(show_on_profile)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => feedback_from_row(&row),
            None => Err(StoreError::NotFound(format!("feedback {}", id))),
        }
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification> {
        let row = sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, body, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(notification.id)
        .bind(&notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.read)
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await?;
        notification_from_row(&row)
    }

    async fn list_notifications(&self, user_id: &str, unread_only: bool, page: Page) -> StoreResult<Vec<Notification>> {
        let page = page.clamped();
        let rows = sqlx::query(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT read)
            ORDER BY created_at DESC, seq DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        collect(rows, notification_from_row)
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: &str) -> StoreResult<Notification> {
        let row = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => notification_from_row(&row),
            None => Err(StoreError::NotFound(format!("notification {}", id))),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_consent(&self, user_id: &str) -> StoreResult<Option<NotificationConsent>> {
        let row = sqlx::query("SELECT * FROM notification_consents WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(consent_from_row).transpose()
    }

    async fn upsert_consent(&self, consent: NotificationConsent) -> StoreResult<NotificationConsent> {
        let row = sqlx::query(
            r#"
            INSERT INTO notification_consents (user_id, calls, chats, payments, marketing, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                calls = EXCLUDED.calls, chats = EXCLUDED.chats, payments = EXCLUDED.payments,
                marketing = EXCLUDED.marketing, updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(&consent.user_id)
        .bind(consent.calls)
        .bind(consent.chats)
        .bind(consent.payments)
        .bind(consent.marketing)
        .bind(consent.updated_at)
        .fetch_one(&self.pool)
        .await?;
        consent_from_row(&row)
    }

    async fn get_kyc(&self, user_id: &str) -> StoreResult<Option<UserKyc>> {
        let row = sqlx::query("SELECT * FROM user_kyc WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(kyc_from_row).transpose()
    }

    async fn upsert_kyc(&self, kyc: UserKyc) -> StoreResult<UserKyc> {
        let row = sqlx::query(
            r#"
            INSERT INTO user_kyc
                (user_id, document_type, document_last4, document_hash, legal_name, status,
                 rejection_reason, submitted_at, reviewed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO UPDATE SET
                document_type = EXCLUDED.document_type, document_last4 = EXCLUDED.document_last4,
                document_hash = EXCLUDED.document_hash, legal_name = EXCLUDED.legal_name,
                status = EXCLUDED.status, rejection_reason = EXCLUDED.rejection_reason,
                submitted_at = EXCLUDED.submitted_at, reviewed_at = EXCLUDED.reviewed_at
            RETURNING *
            "#,
        )
        .bind(&kyc.user_id)
        .bind(kyc.document_type.as_str())
        .bind(&kyc.document_last4)
        .bind(&kyc.document_hash)
        .bind(&kyc.legal_name)
        .bind(kyc.status.as_str())
        .bind(&kyc.rejection_reason)
        .bind(kyc.submitted_at)
        .bind(kyc.reviewed_at)
        .fetch_one(&self.pool)
        .await?;
        kyc_from_row(&row)
    }

    async fn review_kyc(
        &self,
        user_id: &str,
        status: KycStatus,
        reason: Option<String>,
        reviewed_at: DateTime<Utc>,
    ) -> StoreResult<UserKyc> {
        let row = sqlx::query(
            r#"
            UPDATE user_kyc SET status = $2, rejection_reason = $3, reviewed_at = $4
            WHERE user_id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(status.as_str())
        .bind(&reason)
        .bind(reviewed_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => kyc_from_row(&row),
            None => match self.get_kyc(user_id).await? {
                Some(current) => Err(StoreError::Conflict(format!(
                    "kyc for user {} is already {}",
                    user_id, current.status
                ))),
                None => Err(StoreError::NotFound(format!("kyc for user {}", user_id))),
            },
        }
    }

    async fn insert_referral(&self, referral: Referral) -> StoreResult<Referral> {
        let row = sqlx::query(
            r#"
            INSERT INTO referrals (id, referrer_id, referred_id, code, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(referral.id)
        .bind(&referral.referrer_id)
        .bind(&referral.referred_id)
        .bind(&referral.code)
        .bind(referral.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_conflict(e, || format!("user {} was already referred", referral.referred_id)))?;
        referral_from_row(&row)
    }

    async fn list_referrals(&self, referrer_id: &str) -> StoreResult<Vec<Referral>> {
        let rows = sqlx::query("SELECT * FROM referrals WHERE referrer_id = $1 ORDER BY created_at DESC")
            .bind(referrer_id)
            .fetch_all(&self.pool)
            .await?;
        collect(rows, referral_from_row)
    }

    async fn get_analytics(&self, creator_id: &str) -> StoreResult<Option<AnalyticsIntegration>> {
        let row = sqlx::query("SELECT * FROM analytics_integrations WHERE creator_id = $1")
            .bind(creator_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(analytics_from_row).transpose()
    }

    async fn upsert_analytics(&self, integration: AnalyticsIntegration) -> StoreResult<AnalyticsIntegration> {
        let row = sqlx::query(
            r#"
            INSERT INTO analytics_integrations (creator_id, provider, measurement_id, enabled, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (creator_id) DO UPDATE SET
                provider = EXCLUDED.provider, measurement_id = EXCLUDED.measurement_id,
                enabled = EXCLUDED.enabled, updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(&integration.creator_id)
        .bind(integration.provider.as_str())
        .bind(&integration.measurement_id)
        .bind(integration.enabled)
        .bind(integration.updated_at)
        .fetch_one(&self.pool)
        .await?;
        analytics_from_row(&row)
    }
}
