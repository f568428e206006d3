mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn chat_messages_seen_and_end() {
    let app = TestApp::new();
    let creator = app.register_creator("creator_1", "asha").await;
    let client = app.register_client("client_1", "ravi", "40").await;

    let (status, body) = app
        .post("/api/v1/chats", &client, json!({ "chat_id": "chat_1", "creator_id": "creator_1" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "active");

    for text in ["hi", "quick question"] {
        let (status, _) = app
            .post("/api/v1/chats/chat_1/messages", &client, json!({ "text": text }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = app
        .post("/api/v1/chats/chat_1/messages", &client, json!({ "text": "" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"]["field_errors"]["text"].is_string());

    let (_, body) = app.post("/api/v1/chats/chat_1/markSeen", &creator, json!({})).await;
    assert_eq!(body["data"]["marked"], 2);

    let (_, body) = app.get("/api/v1/chats/chat_1/messages", &creator).await;
    let messages = body["data"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["text"], "hi");
    assert_eq!(messages[0]["seen"], true);

    let (status, first) = app.post("/api/v1/endChatUpdate", &creator, json!({ "chat_id": "chat_1" })).await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    assert_eq!(first["data"]["status"], "ended");
    let (status, second) = app.post("/api/v1/endChatUpdate", &client, json!({ "chat_id": "chat_1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["settlement"], second["data"]["settlement"]);

    let (status, _) = app
        .post("/api/v1/chats/chat_1/messages", &client, json!({ "text": "still there?" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn outsiders_cannot_read_chats() {
    let app = TestApp::new();
    app.register_creator("creator_1", "asha").await;
    let client = app.register_client("client_1", "ravi", "40").await;
    let outsider = app.register_client("client_2", "meera", "0").await;

    let (_, body) = app.post("/api/v1/chats", &client, json!({ "creator_id": "creator_1" })).await;
    let chat_id = body["data"]["chat_id"].as_str().unwrap().to_string();

    let (status, _) = app.get(&format!("/api/v1/chats/{}", chat_id), &outsider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/chats/unknown", &client).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
