//! PlanetScale AI server entry point.
//!
//! Features:
//! - Graceful shutdown with request draining
//! - Signal handling (SIGTERM, SIGINT, SIGHUP)
//! - Connection pool closing on exit

use anyhow::Result;
use planetscale_ai::database::create_pool;
use planetscale_ai::shutdown::{install_signal_handlers, new_shutdown_controller, ShutdownConfig};
use planetscale_ai::{transport, AppState, Config, MySqlDatabase, OpenAiCompletionClient};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let version = env!("CARGO_PKG_VERSION");
    info!("PlanetScale AI v{} starting...", version);

    // Load configuration from environment
    let config = Config::from_env()?;
    info!(
        host = %config.database.host,
        databases = ?config.query.databases,
        model = %config.completion.model,
        "Configuration loaded"
    );

    let shutdown_controller = new_shutdown_controller(&ShutdownConfig::from_env());
    install_signal_handlers(shutdown_controller.clone()).await;

    let pool = create_pool(&config.database).await?;
    let database = Arc::new(MySqlDatabase::new(pool));
    let completion = Arc::new(OpenAiCompletionClient::new(&config.completion)?);

    let state = AppState::new(config, database.clone(), completion)
        .with_shutdown(shutdown_controller.clone());

    if let Err(e) = transport::serve(state, shutdown_controller.clone()).await {
        error!("HTTP server error: {}", e);
    }

    shutdown_controller.close_database(&database).await;
    Ok(())
}

/// Initialize tracing subscriber with stderr output.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,planetscale_ai=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
