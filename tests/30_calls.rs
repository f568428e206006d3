mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn call_lifecycle_and_settlement() {
    let app = TestApp::new();
    let creator = app.register_creator("creator_1", "asha").await;
    let client = app.register_client("client_1", "ravi", "100").await;

    let (status, body) = app
        .post(
            "/api/v1/calls/registerCall",
            &client,
            json!({ "call_id": "call_1", "kind": "video", "creator_id": "creator_1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "initiated");
    assert_eq!(body["data"]["client_id"], "client_1");

    // Duplicate id
    let (status, _) = app
        .post(
            "/api/v1/calls/registerCall",
            &client,
            json!({ "call_id": "call_1", "kind": "video", "creator_id": "creator_1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Settling before the call ends is refused
    let (status, _) = app
        .post("/api/v1/calls/updateCallTransaction", &client, json!({ "call_id": "call_1" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post("/api/v1/calls/updateCall", &creator, json!({ "call_id": "call_1", "status": "ongoing" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app
        .post("/api/v1/calls/updateCall", &client, json!({ "call_id": "call_1", "status": "ended" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ended");
    assert!(body["data"]["duration_secs"].is_number());

    let (status, body) = app
        .post("/api/v1/calls/updateCall", &client, json!({ "call_id": "call_1", "status": "ongoing" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, first) = app
        .post("/api/v1/calls/updateCallTransaction", &client, json!({ "call_id": "call_1" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    let (_, second) = app
        .post("/api/v1/calls/updateCallTransaction", &creator, json!({ "call_id": "call_1" }))
        .await;
    assert_eq!(first["data"]["settlement"], second["data"]["settlement"]);

    let (status, body) = app.get("/api/v1/calls/call_1", &creator).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["call_id"], "call_1");
    assert!(body["data"]["settlement"].is_object());

    let (_, body) = app.get("/api/v1/calls", &client).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn register_call_guards() {
    let app = TestApp::new();
    let creator = app.register_creator("creator_1", "asha").await;
    let broke = app.register_client("client_1", "ravi", "0").await;

    let (status, body) = app
        .post(
            "/api/v1/calls/registerCall",
            &broke,
            json!({ "call_id": "c1", "kind": "audio", "creator_id": "creator_1" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_FUNDS");

    let (status, _) = app
        .post(
            "/api/v1/calls/registerCall",
            &broke,
            json!({ "call_id": "c2", "kind": "video", "creator_id": "nobody" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Creators receive calls, they do not place them
    let (status, _) = app
        .post(
            "/api/v1/calls/registerCall",
            &creator,
            json!({ "call_id": "c3", "kind": "video", "creator_id": "creator_1" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missed_call_notifies_creator() {
    let app = TestApp::new();
    let creator = app.register_creator("creator_1", "asha").await;
    let client = app.register_client("client_1", "ravi", "50").await;

    app.post(
        "/api/v1/calls/registerCall",
        &client,
        json!({ "call_id": "c1", "kind": "audio", "creator_id": "creator_1" }),
    )
    .await;
    let (status, _) = app
        .post("/api/v1/calls/updateCall", &client, json!({ "call_id": "c1", "status": "missed" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/v1/notifications?unread_only=true", &creator).await;
    let notes = body["data"].as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["kind"], "call");
}

#[tokio::test]
async fn max_duration_uses_wallet_balance() {
    let app = TestApp::new();
    app.register_creator("creator_1", "asha").await;
    let client = app.register_client("client_1", "ravi", "25").await;

    let (status, body) = app
        .get("/api/v1/calls/maxDuration?creator_id=creator_1&kind=video", &client)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["max_duration_secs"], 150);
}
