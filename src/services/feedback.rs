use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{NotificationService, ServiceError, ServiceResult};
use crate::auth::AuthUser;
use crate::database::models::{CallStatus, ChatStatus, Feedback, NotificationKind};
use crate::state::AppState;

const TEXT_MAX_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct SubmitFeedback {
    pub session_id: String,
    pub rating: u8,
    pub text: Option<String>,
    #[serde(default = "default_visible")]
    pub show_on_profile: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatorFeedback {
    pub creator_id: String,
    pub count: usize,
    /// Mean of the listed ratings, two decimals; absent with no entries
    pub average_rating: Option<Decimal>,
    pub entries: Vec<Feedback>,
}

pub struct FeedbackService<'a> {
    state: &'a AppState,
}

impl<'a> FeedbackService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Client review of a finished call or chat, one per session.
    pub async fn submit(&self, caller: &AuthUser, input: SubmitFeedback) -> ServiceResult<Feedback> {
        if !(1..=5).contains(&input.rating) {
            return Err(ServiceError::invalid_field("rating", "must be between 1 and 5"));
        }
        let text = match input.text.map(|t| t.trim().to_string()) {
            Some(t) if t.chars().count() > TEXT_MAX_CHARS => {
                return Err(ServiceError::invalid_field(
                    "text",
                    format!("must be at most {} characters", TEXT_MAX_CHARS),
                ))
            }
            Some(t) if t.is_empty() => None,
            other => other,
        };

        let (creator_id, client_id) = self.finished_session(&input.session_id).await?;
        if client_id != caller.user_id {
            return Err(ServiceError::Forbidden("only the session's client can leave feedback".to_string()));
        }

        let feedback = self
            .state
            .store
            .insert_feedback(Feedback {
                id: Uuid::new_v4(),
                session_id: input.session_id,
                creator_id,
                client_id,
                rating: input.rating,
                text,
                show_on_profile: input.show_on_profile,
                created_at: Utc::now(),
            })
            .await?;

        NotificationService::new(self.state)
            .notify_quietly(
                &feedback.creator_id,
                NotificationKind::Feedback,
                "New feedback",
                format!("You received a {}-star rating", feedback.rating),
            )
            .await;
        Ok(feedback)
    }

    /// Hidden entries are only listed for the creator themselves.
    pub async fn for_creator(&self, caller: &AuthUser, creator_id: &str) -> ServiceResult<CreatorFeedback> {
        let include_hidden = caller.user_id == creator_id || caller.is_admin();
        let entries = self
            .state
            .store
            .list_feedback_for_creator(creator_id, include_hidden)
            .await?;

        let average_rating = if entries.is_empty() {
            None
        } else {
            let total: u32 = entries.iter().map(|f| u32::from(f.rating)).sum();
            Some((Decimal::from(total) / Decimal::from(entries.len() as u64)).round_dp(2))
        };
        Ok(CreatorFeedback {
            creator_id: creator_id.to_string(),
            count: entries.len(),
            average_rating,
            entries,
        })
    }

    pub async fn set_visibility(&self, caller: &AuthUser, id: Uuid, show_on_profile: bool) -> ServiceResult<Feedback> {
        let feedback = self
            .state
            .store
            .get_feedback(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("feedback {}", id)))?;
        if feedback.creator_id != caller.user_id {
            return Err(ServiceError::Forbidden("only the reviewed creator can change visibility".to_string()));
        }
        Ok(self.state.store.set_feedback_visibility(id, show_on_profile).await?)
    }

    /// `(creator_id, client_id)` of an ended call or chat
    async fn finished_session(&self, session_id: &str) -> ServiceResult<(String, String)> {
        if let Some(call) = self.state.store.get_call(session_id).await? {
            if call.status != CallStatus::Ended {
                return Err(ServiceError::Conflict(format!("call {} has not ended", session_id)));
            }
            return Ok((call.creator_id, call.client_id));
        }
        if let Some(chat) = self.state.store.get_chat(session_id).await? {
            if chat.status != ChatStatus::Ended {
                return Err(ServiceError::Conflict(format!("chat {} has not ended", session_id)));
            }
            return Ok((chat.creator_id, chat.client_id));
        }
        Err(ServiceError::not_found(format!("session {}", session_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::{Chat, Role};
    use crate::database::StoreError;

    async fn ended_chat(state: &AppState) {
        let now = Utc::now();
        state
            .store
            .insert_chat(Chat {
                chat_id: "s1".to_string(),
                creator_id: "cr".to_string(),
                client_id: "cl".to_string(),
                status: ChatStatus::Active,
                created_at: now,
                ended_at: None,
                duration_secs: None,
            })
            .await
            .unwrap();
        state.store.end_chat("s1", now, 60).await.unwrap();
    }

    fn review(rating: u8) -> SubmitFeedback {
        SubmitFeedback {
            session_id: "s1".to_string(),
            rating,
            text: Some("Great session".to_string()),
            show_on_profile: true,
        }
    }

    #[tokio::test]
    async fn one_review_per_session_by_its_client() {
        let state = AppState::in_memory(AppConfig::development());
        ended_chat(&state).await;
        let service = FeedbackService::new(&state);
        let client = AuthUser::new("cl", Role::Client);

        assert!(matches!(service.submit(&client, review(6)).await, Err(ServiceError::Validation { .. })));
        assert!(matches!(
            service.submit(&AuthUser::new("other", Role::Client), review(5)).await,
            Err(ServiceError::Forbidden(_))
        ));

        service.submit(&client, review(4)).await.unwrap();
        assert!(matches!(
            service.submit(&client, review(5)).await,
            Err(ServiceError::Store(StoreError::Conflict(_)))
        ));
    }

    #[tokio::test]
    async fn hidden_reviews_only_visible_to_creator() {
        let state = AppState::in_memory(AppConfig::development());
        ended_chat(&state).await;
        let service = FeedbackService::new(&state);
        let feedback = service.submit(&AuthUser::new("cl", Role::Client), review(3)).await.unwrap();

        let creator = AuthUser::new("cr", Role::Creator);
        service.set_visibility(&creator, feedback.id, false).await.unwrap();

        let public = service.for_creator(&AuthUser::new("visitor", Role::Client), "cr").await.unwrap();
        assert_eq!(public.count, 0);
        assert_eq!(public.average_rating, None);

        let own = service.for_creator(&creator, "cr").await.unwrap();
        assert_eq!(own.count, 1);
        assert_eq!(own.average_rating, Some(Decimal::new(3, 0)));
    }
}
