// handlers/protected/mod.rs - JWT-authenticated endpoints under /api/v1
//
// Every handler here receives the caller as `Extension<AuthUser>`, set by
// `jwt_auth_middleware`.

pub mod analytics;
pub mod availability;
pub mod calls;
pub mod chats;
pub mod clients;
pub mod creators;
pub mod events;
pub mod feedback;
pub mod kyc;
pub mod notifications;
pub mod referrals;
pub mod stream;
pub mod wallet;
