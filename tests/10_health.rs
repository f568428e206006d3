mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

use callbook_api::database::models::Role;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(format!("{}/health", server.base_url)).await?;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["store"], "ok");
    assert_eq!(body["data"]["backend"], "memory");
    Ok(())
}

#[tokio::test]
async fn root_describes_service() -> Result<()> {
    let server = common::ensure_server().await?;
    let body: Value = reqwest::get(format!("{}/", server.base_url)).await?.json().await?;

    assert_eq!(body["data"]["name"], "Callbook API");
    assert!(body["data"]["endpoints"]["wallet"].is_string());
    Ok(())
}

#[tokio::test]
async fn api_requires_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/api/v1/calls", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let res = client
        .get(format!("{}/api/v1/calls", server.base_url))
        .bearer_auth(server.token("client_smoke", Role::Client))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}
