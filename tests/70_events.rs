mod common;

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use callbook_api::database::models::Role;

async fn post(server: &common::TestServer, path: &str, token: &str, body: Value) -> Result<StatusCode> {
    let res = reqwest::Client::new()
        .post(format!("{}{}", server.base_url, path))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?;
    Ok(res.status())
}

#[tokio::test]
async fn event_stream_requires_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let url = format!("ws://127.0.0.1:{}/api/v1/events", server.port);
    assert!(connect_async(url).await.is_err());

    let url = format!("ws://127.0.0.1:{}/api/v1/events?token=forged", server.port);
    assert!(connect_async(url).await.is_err());
    Ok(())
}

#[tokio::test]
async fn creator_receives_incoming_call_frame() -> Result<()> {
    let server = common::ensure_server().await?;
    let creator = server.token("ws_creator", Role::Creator);
    let client = server.token("ws_client", Role::Client);

    let status = post(server, "/api/v1/creators", &creator, json!({ "username": "ws_asha", "full_name": "Asha" })).await?;
    assert_eq!(status, StatusCode::CREATED);
    let status = post(server, "/api/v1/clients", &client, json!({ "username": "ws_ravi", "full_name": "Ravi" })).await?;
    assert_eq!(status, StatusCode::CREATED);
    let status = post(
        server,
        "/api/v1/wallet/addMoney",
        &client,
        json!({ "user_id": "ws_client", "amount": "50" }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let url = format!("ws://127.0.0.1:{}/api/v1/events?token={}", server.port, creator);
    let (mut socket, _) = connect_async(url).await.context("websocket handshake")?;

    let status = post(
        server,
        "/api/v1/calls/registerCall",
        &client,
        json!({ "call_id": "ws_call_1", "kind": "audio", "creator_id": "ws_creator" }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    // The client's own wallet events were published before this socket existed,
    // and later ones are addressed to the client, so the first frame is the call
    let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .context("no event within 5s")?
        .context("stream closed")??;
    let text = match frame {
        Message::Text(text) => text,
        other => anyhow::bail!("expected a text frame, got {:?}", other),
    };
    let event: Value = serde_json::from_str(&text)?;
    assert_eq!(event["kind"], "incoming_call");
    assert_eq!(event["payload"]["call_id"], "ws_call_1");
    assert_eq!(event["payload"]["client_id"], "ws_client");
    assert!(event.get("user_id").is_none());

    socket.close(None).await?;
    Ok(())
}
