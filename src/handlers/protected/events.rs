// handlers/protected/events.rs - GET /api/v1/events websocket handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Extension,
};
use futures::{SinkExt, StreamExt};

use crate::auth::AuthUser;
use crate::events::UserEvents;
use crate::state::AppState;

/// Streams the caller's live events as JSON text frames until either side hangs up.
pub async fn events_ws(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ws: WebSocketUpgrade,
) -> Response {
    // Subscribe before the 101 goes out so nothing published after the
    // handshake is missed
    let events = state.events.subscribe(&user.user_id);
    ws.on_upgrade(move |socket| forward_events(socket, events, user))
}

async fn forward_events(socket: WebSocket, mut events: UserEvents, user: AuthUser) {
    let (mut sink, mut incoming) = socket.split();
    tracing::debug!(user_id = %user.user_id, "event stream opened");

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!("Failed to encode event: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                // Pings are answered by axum; anything else from the client is ignored
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(user_id = %user.user_id, "event stream closed");
}
