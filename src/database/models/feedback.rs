use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub session_id: String,
    pub creator_id: String,
    pub client_id: String,
    pub rating: u8,
    pub text: Option<String>,
    pub show_on_profile: bool,
    pub created_at: DateTime<Utc>,
}
