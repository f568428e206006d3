use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use callbook_api::config::{self, StoreBackend};
use callbook_api::database::{DatabaseManager, MemoryStore, PgStore, Store};
use callbook_api::{app, is_development, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("callbook_api=info,tower_http=info")),
        )
        .init();

    let config = config::config().clone();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting Callbook API in {:?} mode", config.environment);
    if is_development!() {
        tracing::warn!("Development mode: permissive CORS and a built-in JWT secret");
    }

    let store: Arc<dyn Store> = match config.server.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let pool = DatabaseManager::connect(&config.database)
                .await
                .context("failed to connect to Postgres")?;
            Arc::new(PgStore::new(pool))
        }
    };

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let state = AppState::new(config, store);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Callbook API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
