//! Business rules between the HTTP handlers and the store.

pub mod analytics;
pub mod availability;
pub mod calls;
pub mod chats;
pub mod feedback;
pub mod kyc;
pub mod notifications;
pub mod referrals;
pub mod settlement;
pub mod stream;
pub mod users;
pub mod wallet;

use std::collections::HashMap;

use thiserror::Error;

use crate::auth::{AuthUser, JwtError};
use crate::database::models::Role;
use crate::database::StoreError;

pub use analytics::AnalyticsService;
pub use availability::AvailabilityService;
pub use calls::CallService;
pub use chats::ChatService;
pub use feedback::FeedbackService;
pub use kyc::KycService;
pub use notifications::NotificationService;
pub use referrals::ReferralService;
pub use stream::StreamService;
pub use users::UserService;
pub use wallet::WalletService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: HashMap<String, String>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cannot move from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("{0}")]
    InsufficientFunds(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors: HashMap::new(),
        }
    }

    pub fn invalid_field(field: &str, problem: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), problem.into());
        ServiceError::Validation {
            message: format!("Invalid value for '{}'", field),
            field_errors,
        }
    }

    pub fn invalid_fields(message: impl Into<String>, field_errors: HashMap<String, String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field_errors,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }
}

/// Callers may act on their own records; admins on anyone's.
pub(crate) fn ensure_self_or_admin(caller: &AuthUser, user_id: &str) -> ServiceResult<()> {
    if caller.user_id == user_id || caller.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "user {} cannot act on behalf of {}",
            caller.user_id, user_id
        )))
    }
}

pub(crate) fn ensure_role(caller: &AuthUser, role: Role) -> ServiceResult<()> {
    if caller.role == role {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!("requires role '{}'", role)))
    }
}

/// Trims and rejects blank or oversized free text
pub(crate) fn required_text(field: &str, value: &str, max_chars: usize) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid_field(field, "must not be empty"));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ServiceError::invalid_field(field, format!("must be at most {} characters", max_chars)));
    }
    Ok(trimmed.to_string())
}
