//! Router assembly: public, protected and elevated tiers.

use axum::{
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, Environment};
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_admin};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(protected_routes(state.clone()))
        .merge(elevated_routes(state.clone()))
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::*;

    Router::new()
        // Creators and clients
        .route("/api/v1/creators", post(creators::creator_register))
        .route(
            "/api/v1/creators/:id",
            get(creators::creator_get).patch(creators::creator_update),
        )
        .route("/api/v1/creators/username/:username", get(creators::creator_by_username))
        .route("/api/v1/creators/:id/status", put(creators::creator_status))
        .route(
            "/api/v1/creators/:id/availability",
            get(availability::availability_get).put(availability::availability_put),
        )
        .route("/api/v1/clients", post(clients::client_register))
        .route(
            "/api/v1/clients/:id",
            get(clients::client_get).patch(clients::client_update),
        )
        // Wallet
        .route("/api/v1/wallet/addMoney", post(wallet::wallet_add_money))
        .route("/api/v1/wallet/payout", post(wallet::wallet_payout))
        .route("/api/v1/wallet/:user_id", get(wallet::wallet_get))
        .route("/api/v1/wallet/:user_id/transactions", get(wallet::wallet_transactions))
        // Calls
        .route("/api/v1/calls", get(calls::call_list))
        .route("/api/v1/calls/registerCall", post(calls::call_register))
        .route("/api/v1/calls/updateCall", post(calls::call_update))
        .route("/api/v1/calls/updateCallTransaction", post(calls::call_settle))
        .route("/api/v1/calls/maxDuration", get(calls::call_max_duration))
        .route("/api/v1/calls/:call_id", get(calls::call_get))
        // Chats
        .route("/api/v1/chats", get(chats::chat_list).post(chats::chat_start))
        .route("/api/v1/chats/:chat_id", get(chats::chat_get))
        .route(
            "/api/v1/chats/:chat_id/messages",
            get(chats::chat_messages).post(chats::chat_send),
        )
        .route("/api/v1/chats/:chat_id/markSeen", post(chats::chat_mark_seen))
        .route("/api/v1/endChatUpdate", post(chats::chat_end))
        // Feedback
        .route("/api/v1/feedback", post(feedback::feedback_submit))
        .route("/api/v1/feedback/creator/:creator_id", get(feedback::feedback_for_creator))
        .route("/api/v1/feedback/:id", patch(feedback::feedback_visibility))
        // Notifications
        .route("/api/v1/notifications", get(notifications::notification_list))
        .route("/api/v1/notifications/readAll", post(notifications::notification_read_all))
        .route(
            "/api/v1/notifications/consent",
            get(notifications::consent_get).put(notifications::consent_put),
        )
        .route("/api/v1/notifications/:id/read", post(notifications::notification_read))
        // KYC, referrals, analytics
        .route("/api/v1/kyc", post(kyc::kyc_submit))
        .route("/api/v1/kyc/:user_id", get(kyc::kyc_get))
        .route("/api/v1/referrals", get(referrals::referral_list))
        .route("/api/v1/referrals/claim", post(referrals::referral_claim))
        .route(
            "/api/v1/analytics",
            get(analytics::analytics_get).put(analytics::analytics_put),
        )
        // Live
        .route("/api/v1/stream/token", post(stream::stream_token))
        .route("/api/v1/events", get(events::events_ws))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn elevated_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/kyc/:user_id/review", post(elevated::kyc::kyc_review))
        .route("/api/v1/admin/wallet/:user_id", get(elevated::wallet::wallet_inspect))
        // Outermost runs first: authenticate, then check the role
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
}
