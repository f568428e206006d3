use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub stream: StreamConfig,
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expiry_hours: u64,
}

/// Credentials for minting Stream (video/chat provider) user tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub api_key: String,
    pub api_secret: String,
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Platform share of every settled session, in percent
    pub commission_percent: Decimal,
    pub max_session_minutes: u32,
    pub min_top_up: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set outside development")]
    MissingJwtSecret,
    #[error("DATABASE_URL must be set when STORE_BACKEND=postgres")]
    MissingDatabaseUrl,
    #[error("BILLING_COMMISSION_PERCENT must be within 0..=100, got {0}")]
    InvalidCommission(Decimal),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    /// Checks the combinations that cannot be caught by per-field parsing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != Environment::Development && self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.server.store_backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        let pct = self.billing.commission_percent;
        if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(ConfigError::InvalidCommission(pct));
        }
        Ok(())
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("CALLBOOK_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.server.store_backend = match v.to_ascii_lowercase().as_str() {
                "postgres" | "pg" => StoreBackend::Postgres,
                "memory" | "mem" => StoreBackend::Memory,
                _ => self.server.store_backend,
            };
        }
        if let Ok(v) = env::var("EVENT_BUFFER") {
            self.server.event_buffer = v.parse().unwrap_or(self.server.event_buffer);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_ISSUER") {
            self.security.jwt_issuer = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }

        // Stream overrides
        if let Ok(v) = env::var("STREAM_API_KEY") {
            self.stream.api_key = v;
        }
        if let Ok(v) = env::var("STREAM_API_SECRET") {
            self.stream.api_secret = v;
        }
        if let Ok(v) = env::var("STREAM_TOKEN_TTL_SECS") {
            self.stream.token_ttl_secs = v.parse().unwrap_or(self.stream.token_ttl_secs);
        }

        // Billing overrides
        if let Ok(v) = env::var("BILLING_COMMISSION_PERCENT") {
            self.billing.commission_percent =
                Decimal::from_str(v.trim()).unwrap_or(self.billing.commission_percent);
        }
        if let Ok(v) = env::var("BILLING_MAX_SESSION_MINUTES") {
            self.billing.max_session_minutes = v.parse().unwrap_or(self.billing.max_session_minutes);
        }
        if let Ok(v) = env::var("BILLING_MIN_TOP_UP") {
            self.billing.min_top_up = Decimal::from_str(v.trim()).unwrap_or(self.billing.min_top_up);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                store_backend: StoreBackend::Memory,
                event_buffer: 256,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "callbook-development-secret".to_string(),
                jwt_issuer: "callbook-api".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
            },
            stream: StreamConfig {
                api_key: String::new(),
                api_secret: String::new(),
                token_ttl_secs: 60 * 60,
            },
            billing: BillingConfig {
                commission_percent: Decimal::new(20, 0),
                max_session_minutes: 120,
                min_top_up: Decimal::new(10, 0),
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.server.store_backend = StoreBackend::Postgres;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.cors_origins = vec!["https://staging.callbook.app".to_string()];
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 24;
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.server.store_backend = StoreBackend::Postgres;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.database.run_migrations = false;
        config.security.cors_origins = vec!["https://callbook.app".to_string()];
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 4;
        config.stream.token_ttl_secs = 30 * 60;
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults_use_memory_store() {
        let config = AppConfig::development();
        assert_eq!(config.server.store_backend, StoreBackend::Memory);
        assert_eq!(config.billing.commission_percent, Decimal::new(20, 0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_requires_secret_and_database() {
        let mut config = AppConfig::production();
        assert!(matches!(config.validate(), Err(ConfigError::MissingJwtSecret)));

        config.security.jwt_secret = "s3cret".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::MissingDatabaseUrl)));

        config.database.url = Some("postgres://localhost/callbook".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_commission() {
        let mut config = AppConfig::development();
        config.billing.commission_percent = Decimal::new(101, 0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCommission(_))));
    }
}
