use clap::Subcommand;
use rust_decimal::Decimal;
use serde_json::json;

use crate::cli::{utils, OutputFormat, DEFAULT_URL};

#[derive(Subcommand)]
pub enum WalletCommands {
    #[command(about = "Show a user's wallet balance")]
    Balance {
        user_id: String,
        #[arg(long, env = "CALLBOOK_URL", default_value = DEFAULT_URL)]
        url: String,
        #[arg(long, env = "CALLBOOK_TOKEN", hide_env_values = true)]
        token: String,
    },

    #[command(about = "Top up a wallet (the token must belong to that user)")]
    Add {
        user_id: String,
        amount: Decimal,
        #[arg(long, help = "Gateway reference; repeating it is a no-op")]
        reference: Option<String>,
        #[arg(long, env = "CALLBOOK_URL", default_value = DEFAULT_URL)]
        url: String,
        #[arg(long, env = "CALLBOOK_TOKEN", hide_env_values = true)]
        token: String,
    },
}

pub async fn handle(cmd: WalletCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        WalletCommands::Balance { user_id, url, token } => {
            let client = utils::ApiClient::new(&url, Some(token));
            let wallet = client.get(&format!("/api/v1/wallet/{}", user_id)).await?;
            let balance = wallet["balance"].as_str().unwrap_or("0");
            utils::output_success(output_format, &format!("{}: {}", user_id, balance), Some(json!({ "wallet": wallet })))
        }
        WalletCommands::Add { user_id, amount, reference, url, token } => {
            let client = utils::ApiClient::new(&url, Some(token));
            let outcome = client
                .post(
                    "/api/v1/wallet/addMoney",
                    &json!({ "user_id": user_id, "amount": amount, "reference": reference }),
                )
                .await?;
            let balance = outcome["wallet"]["balance"].as_str().unwrap_or("?");
            let message = if outcome["replayed"].as_bool().unwrap_or(false) {
                format!("Reference already applied; {} balance is {}", user_id, balance)
            } else {
                format!("Added {} to {}; balance is {}", amount, user_id, balance)
            };
            utils::output_success(output_format, &message, Some(json!({ "result": outcome })))
        }
    }
}
