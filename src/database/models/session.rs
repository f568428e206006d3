use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Video,
    Audio,
    Chat,
}

string_enum!(SessionKind, "session kind", {
    Video => "video",
    Audio => "audio",
    Chat => "chat",
});

/// Lifecycle of a video or audio call.
///
/// `initiated -> ongoing -> ended`, or `initiated -> rejected | missed | canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiated,
    Ongoing,
    Ended,
    Rejected,
    Missed,
    Canceled,
}

string_enum!(CallStatus, "call status", {
    Initiated => "initiated",
    Ongoing => "ongoing",
    Ended => "ended",
    Rejected => "rejected",
    Missed => "missed",
    Canceled => "canceled",
});

impl CallStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallStatus::Initiated | CallStatus::Ongoing)
    }

    pub fn can_transition_to(&self, next: CallStatus) -> bool {
        use CallStatus::*;
        matches!(
            (self, next),
            (Initiated, Ongoing)
                | (Initiated, Rejected)
                | (Initiated, Missed)
                | (Initiated, Canceled)
                | (Ongoing, Ended)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub call_id: String,
    pub kind: SessionKind,
    pub creator_id: String,
    pub client_id: String,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
}

impl Call {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.creator_id == user_id || self.client_id == user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Active,
    Ended,
}

string_enum!(ChatStatus, "chat status", {
    Active => "active",
    Ended => "ended",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: String,
    pub creator_id: String,
    pub client_id: String,
    pub status: ChatStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
}

impl Chat {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.creator_id == user_id || self.client_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: uuid::Uuid,
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

/// Money moved for one finished call or chat. At most one exists per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub session_id: String,
    pub session_kind: SessionKind,
    pub client_id: String,
    pub creator_id: String,
    pub rate: Decimal,
    pub duration_secs: i64,
    pub amount_due: Decimal,
    pub amount_charged: Decimal,
    pub platform_fee: Decimal,
    pub creator_earning: Decimal,
    pub settled_at: DateTime<Utc>,
}
