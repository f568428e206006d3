//! In-process fan-out of live events to connected websocket clients.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    IncomingCall,
    CallStatus,
    ChatStatus,
    ChatMessage,
    MessagesSeen,
    WalletUpdated,
    Notification,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(skip)]
    pub user_id: String,
    pub kind: EventKind,
    pub payload: Value,
    pub at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<Event>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire-and-forget; an event with no listener is dropped.
    pub fn publish<T: Serialize>(&self, user_id: &str, kind: EventKind, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize {:?} event: {}", kind, e);
                return;
            }
        };
        let event = Event {
            user_id: user_id.to_string(),
            kind,
            payload,
            at: Utc::now(),
        };
        if self.sender.send(event).is_err() {
            tracing::trace!(user_id, ?kind, "no live subscribers");
        }
    }

    pub fn subscribe(&self, user_id: &str) -> UserEvents {
        UserEvents {
            user_id: user_id.to_string(),
            receiver: self.sender.subscribe(),
        }
    }
}

/// Events addressed to one user
pub struct UserEvents {
    user_id: String,
    receiver: broadcast::Receiver<Event>,
}

impl UserEvents {
    /// Next event for this user, or `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.user_id == self.user_id => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %self.user_id, skipped, "event subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
