use anyhow::{anyhow, Context};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let (Some(Value::Object(extra)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(extra);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });
            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Thin reqwest wrapper that unwraps the `{"success", "data"}` envelope
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    /// Whole response body, whatever the status
    pub async fn get_raw(&self, path: &str) -> anyhow::Result<Value> {
        let response = self
            .authorized(self.http.get(self.url(path)))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base_url))?;
        Ok(response.json().await?)
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        let body = self.get_raw(path).await?;
        unwrap_envelope(body)
    }

    pub async fn post<B: Serialize>(&self, path: &str, payload: &B) -> anyhow::Result<Value> {
        let response = self
            .authorized(self.http.post(self.url(path)).json(payload))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base_url))?;
        unwrap_envelope(response.json().await?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn unwrap_envelope(body: Value) -> anyhow::Result<Value> {
    if body["success"].as_bool() == Some(true) {
        return Ok(body["data"].clone());
    }
    let code = body["error"]["code"].as_str().unwrap_or("ERROR");
    let message = body["error"]["message"].as_str().unwrap_or("request failed");
    Err(anyhow!("{}: {}", code, message))
}
