use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Call,
    Chat,
    Payment,
    Feedback,
    Kyc,
    System,
}

string_enum!(NotificationKind, "notification kind", {
    Call => "call",
    Chat => "chat",
    Payment => "payment",
    Feedback => "feedback",
    Kyc => "kyc",
    System => "system",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConsent {
    pub user_id: String,
    pub calls: bool,
    pub chats: bool,
    pub payments: bool,
    pub marketing: bool,
    pub updated_at: DateTime<Utc>,
}

impl NotificationConsent {
    pub fn default_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            calls: true,
            chats: true,
            payments: true,
            marketing: false,
            updated_at: Utc::now(),
        }
    }

    /// Account-level kinds (KYC decisions, system notices) ignore consent.
    pub fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Call => self.calls,
            NotificationKind::Chat => self.chats,
            NotificationKind::Payment => self.payments,
            NotificationKind::Feedback => self.calls || self.chats,
            NotificationKind::Kyc | NotificationKind::System => true,
        }
    }
}
