//! Configuration management for the PlanetScale AI server.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.

use crate::constants::{
    DEFAULT_COMPLETION_BASE_URL, DEFAULT_COMPLETION_MODEL, DEFAULT_COMPLETION_TIMEOUT_SECS,
    DEFAULT_CONNECTION_TIMEOUT, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_QUERY_LENGTH,
    DEFAULT_MAX_TOKENS, DEFAULT_MIN_CONNECTIONS, DEFAULT_MYSQL_PORT, DEFAULT_TEMPERATURE,
};
use crate::error::ServerError;
use crate::security::ValidationMode;
use crate::transport::HttpConfig;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Completion model configuration
    pub completion: CompletionConfig,

    /// Query pipeline configuration
    pub query: QueryConfig,

    /// HTTP listener configuration
    pub http: HttpConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// MySQL hostname or IP address
    pub host: String,

    /// MySQL port (default: 3306)
    pub port: u16,

    /// Username, if the server requires one
    pub username: Option<String>,

    /// Password for `username`
    pub password: Option<String>,

    /// Default schema for pooled connections
    pub database: Option<String>,

    /// TLS negotiation mode
    pub ssl_mode: SslMode,

    /// Connection pool configuration
    pub pool: PoolConfig,
}

/// TLS negotiation mode for MySQL connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    Disabled,
    #[default]
    Preferred,
    Required,
    VerifyCa,
    VerifyIdentity,
}

impl std::str::FromStr for SslMode {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "disabled" | "disable" | "false" | "0" => Ok(SslMode::Disabled),
            "preferred" | "prefer" => Ok(SslMode::Preferred),
            "required" | "require" | "true" | "1" => Ok(SslMode::Required),
            "verify_ca" => Ok(SslMode::VerifyCa),
            "verify_identity" | "verify_full" => Ok(SslMode::VerifyIdentity),
            _ => Err(ServerError::config(format!("invalid MYSQL_SSL_MODE: '{}'", s))),
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Connection acquire timeout
    pub connection_timeout: Duration,

    /// Idle connection timeout
    pub idle_timeout: Duration,
}

/// Completion model configuration.
#[derive(Clone)]
pub struct CompletionConfig {
    /// API credential, checked once at startup
    pub api_key: String,

    /// API root, without a trailing slash
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum completion tokens
    pub max_tokens: u32,

    /// Request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Query pipeline configuration.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Database names callers may query
    pub databases: Vec<String>,

    /// Statement validation mode
    pub validation_mode: ValidationMode,

    /// Maximum statement length (bytes)
    pub max_query_length: usize,

    /// Optional cap on returned rows; `None` returns everything
    pub max_rows: Option<usize>,

    /// Include the column list in natural-language query responses
    pub include_columns: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// ## Required
    /// - `MYSQL_HOST`: MySQL hostname
    /// - `OPENAI_API_KEY`: Completion API key (must be non-blank)
    ///
    /// ## Optional
    /// - `MYSQL_PORT`: Port number (default: 3306)
    /// - `MYSQL_USER` / `MYSQL_PASSWORD`: Credentials (set both or neither)
    /// - `MYSQL_DATABASE`: Default schema
    /// - `MYSQL_SSL_MODE`: disabled, preferred, required, verify_ca, verify_identity
    /// - `MYSQL_POOL_MIN` / `MYSQL_POOL_MAX`: Pool bounds (default: 1 / 10)
    /// - `MYSQL_CONNECT_TIMEOUT` / `MYSQL_IDLE_TIMEOUT`: Seconds (default: 30 / 600)
    /// - `PSAI_DATABASES`: Comma-separated database names (default: `MYSQL_DATABASE`)
    /// - `PSAI_VALIDATION_MODE`: readonly or unrestricted (default: readonly)
    /// - `PSAI_MAX_QUERY_LENGTH`: Maximum statement bytes (default: 100000)
    /// - `PSAI_MAX_ROWS`: Row cap (default: unbounded)
    /// - `PSAI_INCLUDE_COLUMNS`: Emit `columns` in query responses (default: false)
    /// - `OPENAI_BASE_URL`, `OPENAI_MODEL`, `OPENAI_TEMPERATURE`, `OPENAI_MAX_TOKENS`,
    ///   `OPENAI_TIMEOUT`: Completion settings
    /// - `PSAI_HTTP_*`: Listener settings, see [`HttpConfig::from_env`]
    pub fn from_env() -> Result<Self, ServerError> {
        // Required: completion credential. Checked here so a missing key
        // stops the process instead of failing every request.
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ServerError::config("Failed to resolve API key: OPENAI_API_KEY is required"))?;

        // Required: Host
        let host = std::env::var("MYSQL_HOST")
            .map_err(|_| ServerError::config("MYSQL_HOST environment variable is required"))?;

        let username = std::env::var("MYSQL_USER").ok();
        let password = std::env::var("MYSQL_PASSWORD").ok();
        if username.is_none() && password.is_some() {
            return Err(ServerError::config(
                "MYSQL_USER is required when MYSQL_PASSWORD is set",
            ));
        }

        let port = env_parse("MYSQL_PORT").unwrap_or(DEFAULT_MYSQL_PORT);

        let database = std::env::var("MYSQL_DATABASE")
            .ok()
            .filter(|d| !d.trim().is_empty());

        let ssl_mode = match std::env::var("MYSQL_SSL_MODE") {
            Ok(mode) => mode.parse()?,
            Err(_) => SslMode::default(),
        };

        let min_connections = env_parse("MYSQL_POOL_MIN").unwrap_or(DEFAULT_MIN_CONNECTIONS);
        let max_connections = env_parse("MYSQL_POOL_MAX").unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if min_connections > max_connections {
            return Err(ServerError::config(format!(
                "MYSQL_POOL_MIN ({}) exceeds MYSQL_POOL_MAX ({})",
                min_connections, max_connections
            )));
        }

        let connection_timeout_secs =
            env_parse("MYSQL_CONNECT_TIMEOUT").unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS);
        let idle_timeout_secs = env_parse("MYSQL_IDLE_TIMEOUT").unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS);

        // Known databases: explicit list, else the connection's default schema.
        let databases = match std::env::var("PSAI_DATABASES") {
            Ok(list) => parse_database_list(&list),
            Err(_) => database.iter().cloned().collect(),
        };

        let validation_mode = match std::env::var("PSAI_VALIDATION_MODE") {
            Ok(mode) => mode
                .parse()
                .map_err(|_| ServerError::config(format!("invalid PSAI_VALIDATION_MODE: '{}'", mode)))?,
            Err(_) => ValidationMode::default(),
        };

        let max_query_length =
            env_parse("PSAI_MAX_QUERY_LENGTH").unwrap_or(DEFAULT_MAX_QUERY_LENGTH);

        let max_rows = env_parse::<usize>("PSAI_MAX_ROWS").filter(|&n| n > 0);

        let include_columns = env_flag("PSAI_INCLUDE_COLUMNS").unwrap_or(false);

        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_COMPLETION_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_COMPLETION_MODEL.to_string());

        let temperature = env_parse("OPENAI_TEMPERATURE").unwrap_or(DEFAULT_TEMPERATURE);
        let max_tokens = env_parse("OPENAI_MAX_TOKENS").unwrap_or(DEFAULT_MAX_TOKENS);
        let completion_timeout_secs =
            env_parse("OPENAI_TIMEOUT").unwrap_or(DEFAULT_COMPLETION_TIMEOUT_SECS);

        Ok(Config {
            database: DatabaseConfig {
                host,
                port,
                username,
                password,
                database,
                ssl_mode,
                pool: PoolConfig {
                    min_connections,
                    max_connections,
                    connection_timeout: Duration::from_secs(connection_timeout_secs),
                    idle_timeout: Duration::from_secs(idle_timeout_secs),
                },
            },
            completion: CompletionConfig {
                api_key,
                base_url,
                model,
                temperature,
                max_tokens,
                timeout: Duration::from_secs(completion_timeout_secs),
            },
            query: QueryConfig {
                databases,
                validation_mode,
                max_query_length,
                max_rows,
                include_columns,
            },
            http: HttpConfig::from_env(),
        })
    }
}

/// Split a comma-separated database list, dropping blanks and duplicates.
fn parse_database_list(list: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Parse an environment variable, ignoring unset or malformed values.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Read a boolean flag (`true`/`1` or `false`/`0`).
pub(crate) fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: DEFAULT_MIN_CONNECTIONS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            databases: Vec::new(),
            validation_mode: ValidationMode::default(),
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            max_rows: None,
            include_columns: false,
        }
    }
}
