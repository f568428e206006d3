use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: String,
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Credit,
    Debit,
}

string_enum!(TransactionKind, "transaction kind", {
    Credit => "credit",
    Debit => "debit",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    TopUp,
    SessionCharge,
    SessionEarning,
    Payout,
}

string_enum!(TransactionCategory, "transaction category", {
    TopUp => "top_up",
    SessionCharge => "session_charge",
    SessionEarning => "session_earning",
    Payout => "payout",
});

/// One ledger row. `balance_after` is the wallet balance once this row applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub category: TransactionCategory,
    pub reference: Option<String>,
    pub description: String,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}
