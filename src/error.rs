//! Error types for the PlanetScale AI server.
//!
//! This module defines semantic error types with MySQL error code mapping,
//! and the conversion of those errors into client-facing HTTP responses.

use crate::constants::NEEDED_INPUT_DATABASE_NAME;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Domain-specific errors for the PlanetScale AI server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connectivity error: the engine is unreachable or the link failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The engine rejected a statement
    #[error("Query execution error: {message}")]
    QueryExecution {
        message: String,
        mysql_error_number: Option<u16>,
        sql_state: Option<String>,
    },

    /// Object not found (database, table)
    #[error("{object_type} not found: {name}")]
    ObjectNotFound { object_type: String, name: String },

    /// Column type with no logical mapping
    #[error("Unknown column type: {type_name}")]
    SchemaMapping { type_name: String },

    /// Completion model call failed
    #[error("Completion error: {0}")]
    Completion(String),

    /// Caller must supply more input to pick a database
    #[error("Please specify a database name")]
    Disambiguation { needed_input: String },

    /// No database is configured at all
    #[error("No databases available to query")]
    NoDatabasesAvailable,

    /// The generated statement could not be run or yielded no rows
    #[error("Failed to execute database query. Please try again")]
    FailedToTranslateQuery,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error with a source.
    pub fn connection_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a query execution error.
    pub fn query_error(msg: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            mysql_error_number: None,
            sql_state: None,
        }
    }

    /// Create a query execution error with MySQL error details.
    pub fn query_error_with_code(
        msg: impl Into<String>,
        number: u16,
        state: Option<String>,
    ) -> Self {
        Self::QueryExecution {
            message: msg.into(),
            mysql_error_number: Some(number),
            sql_state: state,
        }
    }

    /// Create an object not found error.
    pub fn object_not_found(object_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            object_type: object_type.into(),
            name: name.into(),
        }
    }

    /// Create a schema mapping error for an unrecognized engine type.
    pub fn schema_mapping(type_name: impl Into<String>) -> Self {
        Self::SchemaMapping {
            type_name: type_name.into(),
        }
    }

    /// Create a completion error.
    pub fn completion(msg: impl Into<String>) -> Self {
        Self::Completion(msg.into())
    }

    /// Create a disambiguation error asking for a database name.
    pub fn disambiguation() -> Self {
        Self::Disambiguation {
            needed_input: NEEDED_INPUT_DATABASE_NAME.to_string(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error reflects a broken link to the engine rather than
    /// a problem with the statement itself.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if the caller can fix this error by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Disambiguation { .. }
                | Self::NoDatabasesAvailable
                | Self::FailedToTranslateQuery
                | Self::InvalidInput(_)
                | Self::ObjectNotFound { .. }
        )
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Disambiguation { .. }
            | Self::NoDatabasesAvailable
            | Self::FailedToTranslateQuery
            | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::ObjectNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Completion(_) => StatusCode::BAD_GATEWAY,
            Self::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_)
            | Self::QueryExecution { .. }
            | Self::SchemaMapping { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the JSON body sent to the caller.
    ///
    /// Client errors carry their own message; server-side failures get a
    /// generic message so engine details never leave the process.
    pub fn to_error_body(&self) -> ErrorBody {
        let error_text = match self {
            Self::Disambiguation { .. }
            | Self::NoDatabasesAvailable
            | Self::FailedToTranslateQuery
            | Self::InvalidInput(_)
            | Self::ObjectNotFound { .. }
            | Self::SchemaMapping { .. } => self.to_string(),
            Self::Completion(_) => "Failed to translate the prompt. Please try again".to_string(),
            Self::Connection { .. } => "Database is currently unavailable".to_string(),
            Self::Config(_) | Self::QueryExecution { .. } | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        };

        let needed_input = match self {
            Self::Disambiguation { needed_input } => Some(needed_input.clone()),
            _ => None,
        };

        ErrorBody {
            error_text,
            needed_input,
        }
    }
}

/// JSON error body returned for every failed request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable error description.
    pub error_text: String,

    /// Name of the input the caller still needs to supply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needed_input: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(self.to_error_body())).into_response()
    }
}

/// Map MySQL error numbers to semantic ServerError types.
pub fn from_mysql_error(number: u16, message: &str, state: Option<String>) -> ServerError {
    match number {
        // Authentication errors
        1044 | 1045 => ServerError::connection(format!("Access denied: {}", message)),

        // Unknown database
        1049 => ServerError::object_not_found("Database", message),

        // Unknown table
        1146 => ServerError::object_not_found("Table", message),

        // Client-side connectivity errors
        2002 | 2003 | 2005 | 2006 | 2013 => ServerError::connection(message.to_string()),

        // Syntax errors
        1064 => ServerError::query_error_with_code(
            format!("Syntax error: {}", message),
            number,
            state,
        ),

        // Unknown column
        1054 => ServerError::query_error_with_code(
            format!("Invalid column: {}", message),
            number,
            state,
        ),

        // Default: generic query error
        _ => ServerError::query_error_with_code(message, number, state),
    }
}

impl From<sqlx::Error> for ServerError {
    fn from(e: sqlx::Error) -> Self {
        use sqlx::Error;

        match e {
            Error::Database(db_err) => {
                let state = db_err.code().map(|c| c.to_string());
                match db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
                    Some(mysql_err) => from_mysql_error(mysql_err.number(), db_err.message(), state),
                    None => ServerError::QueryExecution {
                        message: db_err.message().to_string(),
                        mysql_error_number: None,
                        sql_state: state,
                    },
                }
            }
            Error::Io(io) => ServerError::connection_with_source("IO error", io),
            Error::Tls(tls) => ServerError::Connection {
                message: "TLS error".to_string(),
                source: Some(tls),
            },
            Error::Protocol(msg) => ServerError::connection(format!("Protocol error: {}", msg)),
            Error::PoolTimedOut => ServerError::connection("Timed out acquiring a connection"),
            Error::PoolClosed => ServerError::connection("Connection pool closed"),
            Error::WorkerCrashed => ServerError::connection("Connection worker crashed"),
            Error::Configuration(cfg) => ServerError::config(cfg.to_string()),
            Error::RowNotFound => ServerError::query_error("No rows returned"),
            Error::ColumnNotFound(name) => {
                ServerError::internal(format!("Column not found: {}", name))
            }
            Error::ColumnDecode { index, source } => {
                ServerError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            other => ServerError::internal(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServerError::completion("Completion request timed out")
        } else if let Some(status) = e.status() {
            ServerError::completion(format!("Completion API returned {}", status))
        } else {
            ServerError::completion(e.to_string())
        }
    }
}
