pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};

pub const DEFAULT_URL: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "callbook")]
#[command(about = "Callbook CLI - operator tools for the Callbook API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Mint a session token from the local configuration")]
    Token(commands::token::TokenArgs),

    #[command(about = "Check server health from the /health endpoint")]
    Health {
        #[arg(long, env = "CALLBOOK_URL", default_value = DEFAULT_URL, help = "Server base URL")]
        url: String,
    },

    #[command(about = "Wallet inspection and top-ups")]
    Wallet {
        #[command(subcommand)]
        cmd: commands::wallet::WalletCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Token(args) => commands::token::handle(args, output_format),
        Commands::Health { url } => commands::health::handle(&url, output_format).await,
        Commands::Wallet { cmd } => commands::wallet::handle(cmd, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wallet_add() {
        let cli = Cli::try_parse_from([
            "callbook", "--json", "wallet", "add", "user_1", "25.50", "--token", "abc",
        ])
        .unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Wallet { .. }));
    }

    #[test]
    fn token_requires_user() {
        assert!(Cli::try_parse_from(["callbook", "token", "--role", "admin"]).is_err());
    }
}
