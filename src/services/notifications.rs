use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::ServiceResult;
use crate::auth::AuthUser;
use crate::database::models::{Notification, NotificationConsent, NotificationKind};
use crate::database::Page;
use crate::events::EventKind;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ConsentUpdate {
    pub calls: Option<bool>,
    pub chats: Option<bool>,
    pub payments: Option<bool>,
    pub marketing: Option<bool>,
}

pub struct NotificationService<'a> {
    state: &'a AppState,
}

impl<'a> NotificationService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Stores and pushes a notification unless the recipient opted out of
    /// its kind. Returns `None` when suppressed.
    pub async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> ServiceResult<Option<Notification>> {
        let consent = self.consent_for(user_id).await?;
        if !consent.allows(kind) {
            tracing::debug!(user_id, %kind, "notification suppressed by consent");
            return Ok(None);
        }

        let notification = self
            .state
            .store
            .insert_notification(Notification {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                kind,
                title: title.into(),
                body: body.into(),
                read: false,
                created_at: Utc::now(),
            })
            .await?;
        self.state.events.publish(user_id, EventKind::Notification, &notification);
        Ok(Some(notification))
    }

    /// `notify` for side effects of other operations: failures are logged,
    /// never propagated.
    pub async fn notify_quietly(
        &self,
        user_id: &str,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) {
        if let Err(e) = self.notify(user_id, kind, title, body).await {
            tracing::warn!(user_id, %kind, "failed to deliver notification: {}", e);
        }
    }

    pub async fn list(&self, caller: &AuthUser, unread_only: bool, page: Page) -> ServiceResult<Vec<Notification>> {
        Ok(self
            .state
            .store
            .list_notifications(&caller.user_id, unread_only, page)
            .await?)
    }

    pub async fn mark_read(&self, caller: &AuthUser, id: Uuid) -> ServiceResult<Notification> {
        Ok(self.state.store.mark_notification_read(id, &caller.user_id).await?)
    }

    pub async fn mark_all_read(&self, caller: &AuthUser) -> ServiceResult<u64> {
        Ok(self.state.store.mark_all_notifications_read(&caller.user_id).await?)
    }

    pub async fn consent(&self, caller: &AuthUser) -> ServiceResult<NotificationConsent> {
        self.consent_for(&caller.user_id).await
    }

    pub async fn update_consent(&self, caller: &AuthUser, update: ConsentUpdate) -> ServiceResult<NotificationConsent> {
        let mut consent = self.consent_for(&caller.user_id).await?;
        if let Some(v) = update.calls {
            consent.calls = v;
        }
        if let Some(v) = update.chats {
            consent.chats = v;
        }
        if let Some(v) = update.payments {
            consent.payments = v;
        }
        if let Some(v) = update.marketing {
            consent.marketing = v;
        }
        consent.updated_at = Utc::now();
        Ok(self.state.store.upsert_consent(consent).await?)
    }

    async fn consent_for(&self, user_id: &str) -> ServiceResult<NotificationConsent> {
        Ok(self
            .state
            .store
            .get_consent(user_id)
            .await?
            .unwrap_or_else(|| NotificationConsent::default_for(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::Role;

    #[tokio::test]
    async fn opted_out_kinds_are_suppressed() {
        let state = AppState::in_memory(AppConfig::development());
        let service = NotificationService::new(&state);
        let user = AuthUser::new("u1", Role::Creator);

        service
            .update_consent(&user, ConsentUpdate { calls: Some(false), ..Default::default() })
            .await
            .unwrap();

        let suppressed = service.notify("u1", NotificationKind::Call, "Missed call", "").await.unwrap();
        assert!(suppressed.is_none());
        let delivered = service.notify("u1", NotificationKind::Kyc, "KYC verified", "").await.unwrap();
        assert!(delivered.is_some());

        let listed = service.list(&user, true, Page::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(service.mark_all_read(&user).await.unwrap(), 1);
        assert!(service.list(&user, true, Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cannot_read_someone_elses_notification() {
        let state = AppState::in_memory(AppConfig::development());
        let service = NotificationService::new(&state);
        let created = service
            .notify("owner", NotificationKind::System, "Welcome", "")
            .await
            .unwrap()
            .unwrap();

        let intruder = AuthUser::new("intruder", Role::Client);
        assert!(service.mark_read(&intruder, created.id).await.is_err());
    }
}
