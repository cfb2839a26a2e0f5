//! Connection pool management for MySQL.

use crate::config::{DatabaseConfig, SslMode};
use crate::error::ServerError;
use serde::Serialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use tracing::{debug, info};

/// Type alias for the connection pool.
pub type ConnectionPool = MySqlPool;

/// Build connect options from configuration.
pub fn connect_options(config: &DatabaseConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .ssl_mode(ssl_mode(config.ssl_mode));

    if let Some(username) = &config.username {
        options = options.username(username);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    if let Some(database) = &config.database {
        options = options.database(database);
    }

    options
}

fn ssl_mode(mode: SslMode) -> MySqlSslMode {
    match mode {
        SslMode::Disabled => MySqlSslMode::Disabled,
        SslMode::Preferred => MySqlSslMode::Preferred,
        SslMode::Required => MySqlSslMode::Required,
        SslMode::VerifyCa => MySqlSslMode::VerifyCa,
        SslMode::VerifyIdentity => MySqlSslMode::VerifyIdentity,
    }
}

/// Create a connection pool from configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<ConnectionPool, ServerError> {
    info!(
        "Creating connection pool for {}:{} (min: {}, max: {})",
        config.host, config.port, config.pool.min_connections, config.pool.max_connections
    );

    let pool = MySqlPoolOptions::new()
        .min_connections(config.pool.min_connections)
        .max_connections(config.pool.max_connections)
        .idle_timeout(config.pool.idle_timeout)
        .acquire_timeout(config.pool.connection_timeout)
        .test_before_acquire(true)
        .connect_with(connect_options(config))
        .await
        .map_err(|e| ServerError::connection_with_source("Failed to create connection pool", e))?;

    debug!("Initial connection test successful");
    info!("Connection pool created successfully");
    Ok(pool)
}

/// Get pool health status.
pub fn pool_status(pool: &ConnectionPool) -> PoolStatus {
    let total = pool.size() as usize;
    let idle = pool.num_idle();
    PoolStatus {
        total_connections: total,
        available_connections: idle,
        in_use_connections: total.saturating_sub(idle),
        max_connections: pool.options().get_max_connections() as usize,
        closed: pool.is_closed(),
    }
}

/// Pool status information.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    /// Total number of connections in the pool.
    pub total_connections: usize,
    /// Number of idle connections available for checkout.
    pub available_connections: usize,
    /// Number of connections currently in use.
    pub in_use_connections: usize,
    /// Maximum allowed connections.
    pub max_connections: usize,
    /// Whether the pool has been closed for shutdown.
    pub closed: bool,
}
