use clap::Args;
use serde_json::json;

use crate::auth::{issue_session_token, Claims};
use crate::cli::{utils, OutputFormat};
use crate::config;
use crate::database::models::Role;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(long, help = "User id to put in the token subject")]
    pub user: String,

    #[arg(long, default_value = "client", help = "client, creator or admin")]
    pub role: Role,

    #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
    pub hours: Option<i64>,
}

pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::config().security;
    let claims = match args.hours {
        Some(hours) => Claims::with_ttl(&args.user, args.role, security, chrono::Duration::hours(hours)),
        None => Claims::new(&args.user, args.role, security),
    };
    let token = issue_session_token(&claims, security)?;

    match output_format {
        OutputFormat::Json => utils::output_success(
            output_format,
            "Token issued",
            Some(json!({ "token": token, "user": claims.sub, "role": claims.role, "expires_at": claims.exp })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
