use crate::cli::{utils, OutputFormat};

pub async fn handle(url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = utils::ApiClient::new(url, None);
    let body = client.get_raw("/health").await?;

    let healthy = body["success"].as_bool().unwrap_or(false);
    let status = body["data"]["status"].as_str().unwrap_or("unknown").to_string();
    if healthy {
        utils::output_success(output_format, &format!("{} is {}", url, status), Some(body))
    } else {
        utils::output_error(output_format, &format!("{} is {}", url, status), Some("SERVICE_UNAVAILABLE"))?;
        anyhow::bail!("server unhealthy")
    }
}
