//! Row types shared by the stores, services and handlers.

/// Error returned when a stored or submitted tag does not name a variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `FromStr` and `Display` for a fieldless enum whose
/// wire and column representation is a fixed lowercase tag.
macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::database::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($name::$variant),)+
                    other => Err($crate::database::models::UnknownVariant {
                        kind: $label,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod analytics;
pub mod feedback;
pub mod kyc;
pub mod notification;
pub mod referral;
pub mod session;
pub mod user;
pub mod wallet;

pub use analytics::{AnalyticsIntegration, AnalyticsProvider};
pub use feedback::Feedback;
pub use kyc::{DocumentType, KycStatus, UserKyc};
pub use notification::{Notification, NotificationConsent, NotificationKind};
pub use referral::Referral;
pub use session::{Call, CallStatus, Chat, ChatMessage, ChatStatus, SessionKind, Settlement};
pub use user::{AvailabilitySlot, Client, Creator, Rates, Role, Services, Weekday};
pub use wallet::{TransactionCategory, TransactionKind, Wallet, WalletTransaction};
