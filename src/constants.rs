//! Centralized constants for the PlanetScale AI server.
//!
//! This module contains all magic numbers and default values used throughout
//! the codebase, making them easy to find, understand, and modify.

use std::time::Duration;

// =============================================================================
// API Surface Constants
// =============================================================================

/// Path prefix shared by every API route.
pub const API_PREFIX: &str = "/planetscaleAi";

/// Where `/` redirects to.
pub const ROOT_REDIRECT_URL: &str = "https://planetscale.com/";

/// Name of the input a caller must supply to resolve an ambiguous database.
pub const NEEDED_INPUT_DATABASE_NAME: &str = "databaseName";

// =============================================================================
// Completion Constants
// =============================================================================

/// Default base URL for the completion API.
pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when translating natural language to queries.
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";

/// Default sampling temperature (near-deterministic output).
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Default maximum completion tokens. The prompt counts against this limit.
pub const DEFAULT_MAX_TOKENS: u32 = 3_000;

/// Stop sequences: a comment marker ends the statement, as does a terminator.
pub const COMPLETION_STOP_SEQUENCES: [&str; 2] = ["#", ";"];

/// Default completion request timeout in seconds.
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Prompt Constants
// =============================================================================

/// SQL dialect named in the generated prompt.
pub const SQL_DIALECT: &str = "MySQL";

// =============================================================================
// Connection Pool Constants
// =============================================================================

/// Default MySQL port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Default minimum connections in pool.
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;

/// Default maximum connections in pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Default connection idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default connection timeout as Duration.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration =
    Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS);

/// Default idle timeout as Duration.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS);

// =============================================================================
// Query Constants
// =============================================================================

/// Default maximum length of a generated statement, in bytes.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 100_000;

/// Maximum length for MySQL identifiers.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Maximum characters of a statement included in a log line.
pub const LOG_QUERY_PREVIEW_LEN: usize = 500;

// =============================================================================
// HTTP Constants
// =============================================================================

/// Default bind host.
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

// =============================================================================
// Shutdown Constants
// =============================================================================

/// Default shutdown drain timeout in seconds.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;

/// Default shutdown drain timeout as Duration.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(DEFAULT_DRAIN_TIMEOUT_SECS);
