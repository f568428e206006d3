use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: String,
    pub referred_id: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}
