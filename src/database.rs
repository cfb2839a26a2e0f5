//! Database connectivity, introspection and statement execution.

mod connection;
pub mod metadata;
mod query;
pub mod types;

pub use connection::{connect_options, create_pool, pool_status, ConnectionPool, PoolStatus};
pub use metadata::{ColumnSchema, MetadataQueries, RawColumn, SchemaIntrospector, TableSchema};
pub use query::{
    normalize, BufferedCursor, Cursor, ExecutionOutcome, MySqlCursor, QueryExecutor, QueryResult,
    ResultRow,
};
pub(crate) use query::truncate_for_log;
pub use types::{LogicalType, TypeMapper};

use crate::error::ServerError;
use async_trait::async_trait;
use sqlx::Executor;
use tracing::debug;

/// Operations the service needs from a relational database.
#[async_trait]
pub trait Database: Send + Sync {
    /// Tables visible in `database`.
    async fn list_tables(&self, database: &str) -> Result<Vec<String>, ServerError>;

    /// Primary key column of a table, or `None` when it has none.
    async fn primary_key(&self, database: &str, table: &str)
        -> Result<Option<String>, ServerError>;

    /// Column names and engine type names of a table, in table order.
    async fn describe_columns(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Vec<RawColumn>, ServerError>;

    /// Run a generated statement with `database` as the default schema.
    async fn execute(&self, database: &str, statement: &str)
        -> Result<ExecutionOutcome, ServerError>;

    /// Connection pool health, when the implementation has a pool.
    fn pool_status(&self) -> Option<PoolStatus> {
        None
    }
}

/// [`Database`] backed by a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlDatabase {
    pool: ConnectionPool,
    executor: QueryExecutor,
}

impl MySqlDatabase {
    /// Wrap an existing pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            executor: QueryExecutor::new(pool.clone()),
            pool,
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    async fn list_tables(&self, database: &str) -> Result<Vec<String>, ServerError> {
        let statement = MetadataQueries::show_tables(database)?;
        debug!("Listing tables: {}", statement);

        let rows = (&self.pool).fetch_all(statement.as_str()).await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(name) = TypeMapper::text_column(row, 0)? {
                tables.push(name);
            }
        }
        Ok(tables)
    }

    async fn primary_key(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Option<String>, ServerError> {
        let statement = MetadataQueries::show_primary_key(database, table)?;
        debug!("Reading primary key: {}", statement);

        // SHOW KEYS lists key parts in Seq_in_index order; a composite key
        // resolves to its first part.
        let rows = (&self.pool).fetch_all(statement.as_str()).await?;
        match rows.first() {
            Some(row) => TypeMapper::text_column(row, "Column_name"),
            None => Ok(None),
        }
    }

    async fn describe_columns(
        &self,
        database: &str,
        table: &str,
    ) -> Result<Vec<RawColumn>, ServerError> {
        let statement = MetadataQueries::describe(database, table)?;
        debug!("Describing table: {}", statement);

        let rows = (&self.pool).fetch_all(statement.as_str()).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = TypeMapper::text_column(row, "Field")?.unwrap_or_default();
            let engine_type = TypeMapper::text_column(row, "Type")?.unwrap_or_default();
            columns.push(RawColumn { name, engine_type });
        }
        Ok(columns)
    }

    async fn execute(
        &self,
        database: &str,
        statement: &str,
    ) -> Result<ExecutionOutcome, ServerError> {
        self.executor.execute(database, statement).await
    }

    fn pool_status(&self) -> Option<PoolStatus> {
        Some(pool_status(&self.pool))
    }
}
