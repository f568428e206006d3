// handlers/public/root.rs - GET / handler

use axum::response::Json;
use serde_json::{json, Value};

pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Callbook API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Creator calls, chats and wallet backend",
            "endpoints": {
                "health": "/health (public)",
                "creators": "/api/v1/creators[/:id] (protected)",
                "clients": "/api/v1/clients[/:id] (protected)",
                "wallet": "/api/v1/wallet/* (protected)",
                "calls": "/api/v1/calls/* (protected)",
                "chats": "/api/v1/chats/*, /api/v1/endChatUpdate (protected)",
                "feedback": "/api/v1/feedback/* (protected)",
                "notifications": "/api/v1/notifications/* (protected)",
                "kyc": "/api/v1/kyc/* (protected)",
                "referrals": "/api/v1/referrals/* (protected)",
                "analytics": "/api/v1/analytics (protected)",
                "stream": "/api/v1/stream/token (protected)",
                "events": "/api/v1/events (protected, websocket)",
                "admin": "/api/v1/admin/* (admin only)"
            }
        }
    }))
}
