#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use callbook_api::auth::{issue_session_token, Claims};
use callbook_api::config::AppConfig;
use callbook_api::database::models::Role;
use callbook_api::{app, AppState};

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub const TEST_SECRET: &str = "integration-test-secret";

/// The real server binary on a free port, backed by the in-memory store
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let child = Command::new(env!("CARGO_BIN_EXE_callbook-api"))
            .env("APP_ENV", "development")
            .env("PORT", port.to_string())
            .env("STORE_BACKEND", "memory")
            .env("JWT_SECRET", TEST_SECRET)
            .env_remove("CALLBOOK_API_PORT")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(format!("{}/health", self.base_url)).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    /// Session token the spawned server accepts
    pub fn token(&self, user_id: &str, role: Role) -> String {
        let mut config = AppConfig::development();
        config.security.jwt_secret = TEST_SECRET.to_string();
        issue_session_token(&Claims::new(user_id, role, &config.security), &config.security)
            .expect("token signing")
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// In-process router over a fresh in-memory store, driven with `oneshot`
pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let state = AppState::in_memory(config);
        let router = app(state.clone());
        Self { state, router }
    }

    pub fn token(&self, user_id: &str, role: Role) -> String {
        let security = &self.state.config.security;
        issue_session_token(&Claims::new(user_id, role, security), security).expect("token signing")
    }

    pub async fn request(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("router");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, path, Some(token), Some(body)).await
    }

    /// Registers a creator with default rates (video/audio 10, chat 5 per minute)
    pub async fn register_creator(&self, user_id: &str, username: &str) -> String {
        let token = self.token(user_id, Role::Creator);
        let (status, body) = self
            .post(
                "/api/v1/creators",
                &token,
                serde_json::json!({ "username": username, "full_name": "Test Creator" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        token
    }

    /// Registers a client and tops up the wallet when `balance` is non-zero
    pub async fn register_client(&self, user_id: &str, username: &str, balance: &str) -> String {
        let token = self.token(user_id, Role::Client);
        let (status, body) = self
            .post(
                "/api/v1/clients",
                &token,
                serde_json::json!({ "username": username, "full_name": "Test Client" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        if balance != "0" {
            let (status, body) = self
                .post(
                    "/api/v1/wallet/addMoney",
                    &token,
                    serde_json::json!({ "user_id": user_id, "amount": balance }),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{}", body);
        }
        token
    }
}
