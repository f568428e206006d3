use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ensure_self_or_admin, required_text, NotificationService, ServiceError, ServiceResult};
use crate::auth::AuthUser;
use crate::database::models::{DocumentType, KycStatus, NotificationKind, UserKyc};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitKyc {
    pub document_type: DocumentType,
    pub document_number: String,
    pub legal_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewKyc {
    pub approve: bool,
    pub reason: Option<String>,
}

/// Uppercase alphanumerics only, so "abcde 1234f" and "ABCDE-1234F" match.
fn normalize_document_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn document_digest(normalized: &str) -> String {
    Sha256::digest(normalized.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub struct KycService<'a> {
    state: &'a AppState,
}

impl<'a> KycService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn submit(&self, caller: &AuthUser, input: SubmitKyc) -> ServiceResult<UserKyc> {
        let number = normalize_document_number(&input.document_number);
        if !(6..=20).contains(&number.len()) {
            return Err(ServiceError::invalid_field("document_number", "must have 6 to 20 letters or digits"));
        }
        let legal_name = required_text("legal_name", &input.legal_name, 100)?;

        if let Some(existing) = self.state.store.get_kyc(&caller.user_id).await? {
            if existing.status != KycStatus::Rejected {
                return Err(ServiceError::Conflict(format!("KYC is already {}", existing.status)));
            }
        }

        let kyc = self
            .state
            .store
            .upsert_kyc(UserKyc {
                user_id: caller.user_id.clone(),
                document_type: input.document_type,
                document_last4: number[number.len() - 4..].to_string(),
                document_hash: document_digest(&number),
                legal_name,
                status: KycStatus::Pending,
                rejection_reason: None,
                submitted_at: Utc::now(),
                reviewed_at: None,
            })
            .await?;
        tracing::info!(user_id = %kyc.user_id, document_type = %kyc.document_type, "KYC submitted");
        Ok(kyc)
    }

    pub async fn get(&self, caller: &AuthUser, user_id: &str) -> ServiceResult<UserKyc> {
        ensure_self_or_admin(caller, user_id)?;
        self.state
            .store
            .get_kyc(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("kyc for user {}", user_id)))
    }

    /// Admin decision on a pending submission.
    pub async fn review(&self, caller: &AuthUser, user_id: &str, input: ReviewKyc) -> ServiceResult<UserKyc> {
        if !caller.is_admin() {
            return Err(ServiceError::Forbidden("KYC review requires an admin".to_string()));
        }
        let (status, reason) = if input.approve {
            (KycStatus::Verified, None)
        } else {
            let reason = input.reason.as_deref().unwrap_or_default();
            (KycStatus::Rejected, Some(required_text("reason", reason, 500)?))
        };

        let kyc = self
            .state
            .store
            .review_kyc(user_id, status, reason, Utc::now())
            .await?;
        tracing::info!(user_id = %kyc.user_id, reviewer = %caller.user_id, status = %kyc.status, "KYC reviewed");

        let body = match &kyc.rejection_reason {
            Some(reason) => format!("Your verification was rejected: {}", reason),
            None => "Your identity has been verified".to_string(),
        };
        NotificationService::new(self.state)
            .notify_quietly(&kyc.user_id, NotificationKind::Kyc, "KYC update", body)
            .await;
        Ok(kyc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::Role;
    use crate::database::{Page, StoreError};

    fn submission(number: &str) -> SubmitKyc {
        SubmitKyc {
            document_type: DocumentType::Pan,
            document_number: number.to_string(),
            legal_name: "Asha Rao".to_string(),
        }
    }

    #[test]
    fn numbers_are_normalized_before_hashing() {
        assert_eq!(normalize_document_number("abcde-1234 f"), "ABCDE1234F");
        assert_eq!(
            document_digest(&normalize_document_number("abcde 1234f")),
            document_digest(&normalize_document_number("ABCDE-1234F"))
        );
        assert_eq!(document_digest("X").len(), 64);
    }

    #[tokio::test]
    async fn rejected_submissions_can_be_retried() {
        let state = AppState::in_memory(AppConfig::development());
        let service = KycService::new(&state);
        let user = AuthUser::new("cr", Role::Creator);
        let admin = AuthUser::new("root", Role::Admin);

        let kyc = service.submit(&user, submission("abcde-1234f")).await.unwrap();
        assert_eq!(kyc.document_last4, "234F");
        assert_eq!(kyc.status, KycStatus::Pending);
        assert!(matches!(service.submit(&user, submission("ABCDE1234F")).await, Err(ServiceError::Conflict(_))));

        let missing_reason = ReviewKyc { approve: false, reason: None };
        assert!(service.review(&admin, "cr", missing_reason).await.is_err());
        assert!(matches!(
            service.review(&user, "cr", ReviewKyc { approve: true, reason: None }).await,
            Err(ServiceError::Forbidden(_))
        ));

        let rejected = service
            .review(&admin, "cr", ReviewKyc { approve: false, reason: Some("blurry scan".to_string()) })
            .await
            .unwrap();
        assert_eq!(rejected.status, KycStatus::Rejected);

        service.submit(&user, submission("ABCDE1234F")).await.unwrap();
        let verified = service
            .review(&admin, "cr", ReviewKyc { approve: true, reason: None })
            .await
            .unwrap();
        assert_eq!(verified.status, KycStatus::Verified);
        assert!(matches!(
            service.review(&admin, "cr", ReviewKyc { approve: true, reason: None }).await,
            Err(ServiceError::Store(StoreError::Conflict(_)))
        ));

        let notes = state.store.list_notifications("cr", false, Page::default()).await.unwrap();
        assert_eq!(notes.len(), 2);
    }
}
