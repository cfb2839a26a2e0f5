//! MySQL metadata queries for schema introspection.

use crate::database::types::LogicalType;
use crate::database::Database;
use crate::error::ServerError;
use crate::security::{qualified_table, safe_identifier};
use serde::Serialize;
use tracing::debug;

/// Column as reported by `DESCRIBE`, before type mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    /// `Field` column.
    pub name: String,
    /// `Type` column, e.g. `varchar(255)`.
    pub engine_type: String,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, engine_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine_type: engine_type.into(),
        }
    }
}

/// Column with its logical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
}

/// Table schema metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
}

/// Introspection statement builder.
///
/// Every identifier is validated and backtick-escaped before it is placed in
/// the statement text.
pub struct MetadataQueries;

impl MetadataQueries {
    /// `SHOW TABLES` scoped to one database.
    pub fn show_tables(database: &str) -> Result<String, ServerError> {
        Ok(format!("SHOW TABLES FROM {}", safe_identifier(database)?))
    }

    /// Primary key columns of a table, in key order.
    pub fn show_primary_key(database: &str, table: &str) -> Result<String, ServerError> {
        Ok(format!(
            "SHOW KEYS FROM {} WHERE Key_name = 'PRIMARY'",
            qualified_table(database, table)?
        ))
    }

    /// Column names and engine types of a table.
    pub fn describe(database: &str, table: &str) -> Result<String, ServerError> {
        Ok(format!("DESCRIBE {}", qualified_table(database, table)?))
    }
}

/// Reads database, table and column metadata for API responses and prompts.
pub struct SchemaIntrospector<'a> {
    db: &'a dyn Database,
    databases: &'a [String],
}

impl<'a> SchemaIntrospector<'a> {
    /// Create an introspector over a database handle and the known database names.
    pub fn new(db: &'a dyn Database, databases: &'a [String]) -> Self {
        Self { db, databases }
    }

    /// Configured database names. No I/O.
    pub fn list_databases(&self) -> Vec<String> {
        self.databases.to_vec()
    }

    /// Tables in `database`, in server order.
    pub async fn list_tables(&self, database: &str) -> Result<Vec<String>, ServerError> {
        let tables = self.db.list_tables(database).await?;
        debug!("Database {} has {} tables", database, tables.len());
        Ok(tables)
    }

    /// Columns, logical types and primary key of one table.
    pub async fn describe_table(
        &self,
        database: &str,
        table: &str,
    ) -> Result<TableSchema, ServerError> {
        let primary_key = self.db.primary_key(database, table).await?;
        let raw_columns = self.db.describe_columns(database, table).await?;

        let columns = raw_columns
            .into_iter()
            .map(|raw| {
                Ok(ColumnSchema {
                    logical_type: LogicalType::from_mysql_type(&raw.engine_type)?,
                    name: raw.name,
                })
            })
            .collect::<Result<Vec<_>, ServerError>>()?;

        Ok(TableSchema {
            name: table.to_string(),
            columns,
            primary_key,
        })
    }
}
