use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::calls::admit_session;
use super::settlement::{self, FinishedSession};
use super::{required_text, ServiceError, ServiceResult};
use crate::auth::AuthUser;
use crate::database::models::{Chat, ChatMessage, ChatStatus, SessionKind, Settlement};
use crate::database::{Page, StoreError};
use crate::events::EventKind;
use crate::state::AppState;

const MESSAGE_MAX_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct StartChat {
    /// Generated when absent
    pub chat_id: Option<String>,
    pub creator_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessage {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatView {
    #[serde(flatten)]
    pub chat: Chat,
    pub settlement: Option<Settlement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeenReceipt {
    pub chat_id: String,
    pub reader_id: String,
    pub marked: u64,
}

pub struct ChatService<'a> {
    state: &'a AppState,
}

impl<'a> ChatService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn start(&self, caller: &AuthUser, input: StartChat) -> ServiceResult<Chat> {
        let chat_id = input
            .chat_id
            .map(|id| id.trim().to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        admit_session(self.state, caller, &chat_id, &input.creator_id, SessionKind::Chat).await?;

        let chat = self
            .state
            .store
            .insert_chat(Chat {
                chat_id,
                creator_id: input.creator_id,
                client_id: caller.user_id.clone(),
                status: ChatStatus::Active,
                created_at: Utc::now(),
                ended_at: None,
                duration_secs: None,
            })
            .await?;
        tracing::info!(chat_id = %chat.chat_id, client_id = %chat.client_id, creator_id = %chat.creator_id, "chat started");
        Ok(chat)
    }

    pub async fn get(&self, caller: &AuthUser, chat_id: &str) -> ServiceResult<ChatView> {
        let chat = self.participant_chat(caller, chat_id).await?;
        let settlement = self.state.store.get_settlement(&chat.chat_id).await?;
        Ok(ChatView { chat, settlement })
    }

    pub async fn list(&self, caller: &AuthUser, page: Page) -> ServiceResult<Vec<Chat>> {
        Ok(self.state.store.list_chats_for_user(&caller.user_id, page.clamped()).await?)
    }

    pub async fn send_message(&self, caller: &AuthUser, chat_id: &str, input: SendMessage) -> ServiceResult<ChatMessage> {
        let chat = self.participant_chat(caller, chat_id).await?;
        let text = required_text("text", &input.text, MESSAGE_MAX_CHARS)?;

        let message = self
            .state
            .store
            .append_message(ChatMessage {
                id: Uuid::new_v4(),
                chat_id: chat.chat_id.clone(),
                sender_id: caller.user_id.clone(),
                text,
                seen: false,
                created_at: Utc::now(),
            })
            .await?;

        for user_id in [&chat.client_id, &chat.creator_id] {
            self.state.events.publish(user_id, EventKind::ChatMessage, &message);
        }
        Ok(message)
    }

    /// Oldest first
    pub async fn messages(&self, caller: &AuthUser, chat_id: &str, page: Page) -> ServiceResult<Vec<ChatMessage>> {
        let chat = self.participant_chat(caller, chat_id).await?;
        Ok(self.state.store.list_messages(&chat.chat_id, page.clamped()).await?)
    }

    /// Marks everything the other participant sent as seen.
    pub async fn mark_seen(&self, caller: &AuthUser, chat_id: &str) -> ServiceResult<SeenReceipt> {
        let chat = self.participant_chat(caller, chat_id).await?;
        let marked = self.state.store.mark_messages_seen(&chat.chat_id, &caller.user_id).await?;
        let receipt = SeenReceipt {
            chat_id: chat.chat_id.clone(),
            reader_id: caller.user_id.clone(),
            marked,
        };

        if marked > 0 {
            let other = if chat.client_id == caller.user_id { &chat.creator_id } else { &chat.client_id };
            self.state.events.publish(other, EventKind::MessagesSeen, &receipt);
        }
        Ok(receipt)
    }

    /// Ends an active chat and bills it at the creator's chat rate.
    /// Calling it again on an ended chat returns the same settlement.
    pub async fn end(&self, caller: &AuthUser, chat_id: &str) -> ServiceResult<ChatView> {
        let mut chat = self.participant_chat(caller, chat_id).await?;

        if chat.status == ChatStatus::Active {
            let now = Utc::now();
            let cap = i64::from(self.state.config.billing.max_session_minutes) * 60;
            let duration = (now - chat.created_at).num_seconds().clamp(0, cap);
            chat = match self.state.store.end_chat(&chat.chat_id, now, duration).await {
                Ok(ended) => {
                    tracing::info!(chat_id = %ended.chat_id, duration_secs = duration, "chat ended");
                    for user_id in [&ended.client_id, &ended.creator_id] {
                        self.state.events.publish(
                            user_id,
                            EventKind::ChatStatus,
                            &json!({ "chat_id": ended.chat_id, "status": ended.status }),
                        );
                    }
                    ended
                }
                // The other participant ended it first
                Err(StoreError::Conflict(_)) => self.participant_chat(caller, chat_id).await?,
                Err(e) => return Err(e.into()),
            };
        }

        let settlement = settlement::settle(
            self.state,
            FinishedSession {
                session_id: &chat.chat_id,
                kind: SessionKind::Chat,
                client_id: &chat.client_id,
                creator_id: &chat.creator_id,
                duration_secs: chat.duration_secs.unwrap_or(0),
            },
        )
        .await?;
        Ok(ChatView { chat, settlement: Some(settlement) })
    }

    async fn participant_chat(&self, caller: &AuthUser, chat_id: &str) -> ServiceResult<Chat> {
        let chat = self
            .state
            .store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("chat {}", chat_id)))?;
        if !chat.is_participant(&caller.user_id) && !caller.is_admin() {
            return Err(ServiceError::Forbidden(format!("not a participant of chat {}", chat_id)));
        }
        Ok(chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::{Client, Role};
    use crate::services::users::{RegisterCreator, UserService};
    use crate::services::wallet::{AddMoney, WalletService};
    use rust_decimal::Decimal;

    async fn setup() -> (AppState, AuthUser, AuthUser) {
        let state = AppState::in_memory(AppConfig::development());
        let creator = AuthUser::new("creator_1", Role::Creator);
        let client = AuthUser::new("client_1", Role::Client);
        UserService::new(&state)
            .register_creator(
                &creator,
                RegisterCreator {
                    username: "asha".to_string(),
                    full_name: "Asha Rao".to_string(),
                    phone: None,
                    bio: None,
                    photo_url: None,
                    rates: None,
                    services: None,
                },
            )
            .await
            .unwrap();
        let now = Utc::now();
        state
            .store
            .insert_client(Client {
                id: client.user_id.clone(),
                username: "ravi".to_string(),
                full_name: "Ravi".to_string(),
                phone: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        WalletService::new(&state)
            .add_money(&client, AddMoney { user_id: client.user_id.clone(), amount: Decimal::new(100, 0), reference: None })
            .await
            .unwrap();
        (state, client, creator)
    }

    #[tokio::test]
    async fn messages_flow_and_seen_receipts() {
        let (state, client, creator) = setup().await;
        let chats = ChatService::new(&state);
        let chat = chats
            .start(&client, StartChat { chat_id: Some("chat_1".to_string()), creator_id: "creator_1".to_string() })
            .await
            .unwrap();

        let send = |text: &str| SendMessage { text: text.to_string() };
        chats.send_message(&client, &chat.chat_id, send("hello")).await.unwrap();
        chats.send_message(&client, &chat.chat_id, send("are you there?")).await.unwrap();
        chats.send_message(&creator, &chat.chat_id, send("yes")).await.unwrap();
        assert!(chats.send_message(&client, &chat.chat_id, send("   ")).await.is_err());
        assert!(chats
            .send_message(&client, &chat.chat_id, send(&"x".repeat(MESSAGE_MAX_CHARS + 1)))
            .await
            .is_err());

        let mut client_events = state.events.subscribe("client_1");
        let receipt = chats.mark_seen(&creator, &chat.chat_id).await.unwrap();
        assert_eq!(receipt.marked, 2);
        assert_eq!(client_events.next().await.unwrap().kind, EventKind::MessagesSeen);
        assert_eq!(chats.mark_seen(&creator, &chat.chat_id).await.unwrap().marked, 0);

        let messages = chats.messages(&client, &chat.chat_id, Page::default()).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].text, "hello");
        assert!(messages[0].seen);
        assert!(!messages[2].seen);
    }

    #[tokio::test]
    async fn ending_is_repeatable_and_closes_the_chat() {
        let (state, client, creator) = setup().await;
        let chats = ChatService::new(&state);
        let chat = chats
            .start(&client, StartChat { chat_id: None, creator_id: "creator_1".to_string() })
            .await
            .unwrap();

        let first = chats.end(&client, &chat.chat_id).await.unwrap();
        assert_eq!(first.chat.status, ChatStatus::Ended);
        let second = chats.end(&creator, &chat.chat_id).await.unwrap();
        assert_eq!(second.settlement, first.settlement);

        let err = chats
            .send_message(&client, &chat.chat_id, SendMessage { text: "late".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn strangers_cannot_read() {
        let (state, client, _) = setup().await;
        let chats = ChatService::new(&state);
        let chat = chats
            .start(&client, StartChat { chat_id: None, creator_id: "creator_1".to_string() })
            .await
            .unwrap();

        let stranger = AuthUser::new("x", Role::Client);
        assert!(matches!(
            chats.messages(&stranger, &chat.chat_id, Page::default()).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}
