//! Statement execution and result normalization.

use crate::constants::LOG_QUERY_PREVIEW_LEN;
use crate::database::types::TypeMapper;
use crate::error::ServerError;
use crate::security::safe_identifier;
use serde::ser::{Serialize, SerializeMap, Serializer};
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{Column, Executor};
use std::time::Instant;
use tracing::debug;

/// Outcome of running a statement.
pub enum ExecutionOutcome {
    /// The statement produces a result set.
    Rows(Box<dyn Cursor>),
    /// The statement produces no result set (DDL, DML, `SET`, ...).
    NoRows,
}

impl std::fmt::Debug for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionOutcome::Rows(cursor) => f
                .debug_tuple("Rows")
                .field(&cursor.column_names())
                .finish(),
            ExecutionOutcome::NoRows => f.write_str("NoRows"),
        }
    }
}

/// Forward-only view over a result set whose cells are already text.
pub trait Cursor: Send {
    /// Column names, in result-set order.
    fn column_names(&self) -> Vec<String>;

    /// Next row, one cell per column; `None` cells are SQL `NULL`.
    fn next_row(&mut self) -> Option<Vec<Option<String>>>;
}

/// Cursor over rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct BufferedCursor {
    columns: Vec<String>,
    rows: std::collections::VecDeque<Vec<Option<String>>>,
}

impl BufferedCursor {
    /// Create a cursor over the given columns and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }

    /// Convenience constructor for rows without `NULL`s.
    pub fn from_text<C, R>(columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<&'static str>>,
    {
        Self::new(
            columns.into_iter().map(Into::into).collect(),
            rows.into_iter()
                .map(|row| row.into_iter().map(|v| Some(v.to_string())).collect())
                .collect(),
        )
    }
}

impl Cursor for BufferedCursor {
    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn next_row(&mut self) -> Option<Vec<Option<String>>> {
        self.rows.pop_front()
    }
}

/// Cursor over rows fetched from MySQL; cells are rendered on demand.
pub struct MySqlCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<MySqlRow>,
}

impl MySqlCursor {
    fn new(columns: Vec<String>, rows: Vec<MySqlRow>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
        }
    }
}

impl Cursor for MySqlCursor {
    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn next_row(&mut self) -> Option<Vec<Option<String>>> {
        let row = self.rows.next()?;
        Some(
            (0..self.columns.len())
                .map(|idx| TypeMapper::cell_text(&row, idx))
                .collect(),
        )
    }
}

/// A single result row: cells keyed by column name, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    cells: Vec<(String, Option<String>)>,
}

impl ResultRow {
    /// Create an empty result row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell by column name. The outer `Option` is column presence,
    /// the inner one SQL `NULL`.
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_deref())
    }

    /// Set a cell. A column already present keeps its position and takes
    /// the new value.
    pub fn insert(&mut self, column: String, value: Option<String>) {
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Column names of this row, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Normalized result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// Column names in order.
    pub columns: Vec<String>,

    /// Result rows.
    pub rows: Vec<ResultRow>,

    /// Whether rows were dropped because of the row cap.
    pub truncated: bool,
}

/// Drain a cursor into ordered rows keyed by column name.
///
/// Repeated column names (`SELECT e.name, d.name ...`) collapse into one
/// key: it stays at its first position and holds the last value. `columns`
/// lists each name once, so every row has exactly one key per column.
///
/// With `max_rows` set, reading stops after that many rows and the result is
/// marked truncated if the cursor had more.
pub fn normalize(cursor: &mut dyn Cursor, max_rows: Option<usize>) -> QueryResult {
    let source_columns = cursor.column_names();
    let mut rows = Vec::new();
    let mut truncated = false;

    while let Some(cells) = cursor.next_row() {
        if max_rows.is_some_and(|max| rows.len() >= max) {
            truncated = true;
            break;
        }

        let mut row = ResultRow::new();
        let mut cells = cells.into_iter();
        for column in &source_columns {
            row.insert(column.clone(), cells.next().flatten());
        }
        rows.push(row);
    }

    let mut columns: Vec<String> = Vec::with_capacity(source_columns.len());
    for column in source_columns {
        if !columns.contains(&column) {
            columns.push(column);
        }
    }

    QueryResult {
        columns,
        rows,
        truncated,
    }
}

/// Runs generated statements against a MySQL pool.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: MySqlPool,
}

impl QueryExecutor {
    /// Create a new query executor.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Execute a statement with `database` as the default schema.
    ///
    /// The server describes the statement first; one without result columns
    /// is reported as [`ExecutionOutcome::NoRows`] and never run.
    pub async fn execute(
        &self,
        database: &str,
        statement: &str,
    ) -> Result<ExecutionOutcome, ServerError> {
        let start = Instant::now();
        let use_database = format!("USE {}", safe_identifier(database)?);

        debug!(
            "Describing statement in {}: {}",
            database,
            truncate_for_log(statement, LOG_QUERY_PREVIEW_LEN)
        );

        let mut conn = self.pool.acquire().await?;
        (&mut *conn).execute(use_database.as_str()).await?;

        let description = (&mut *conn).describe(statement).await?;
        if description.columns().is_empty() {
            debug!("Statement returns no result set; not executed");
            return Ok(ExecutionOutcome::NoRows);
        }

        let columns: Vec<String> = description
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let rows = (&mut *conn).fetch_all(statement).await?;

        debug!(
            "Statement completed: {} rows in {} ms",
            rows.len(),
            start.elapsed().as_millis()
        );

        Ok(ExecutionOutcome::Rows(Box::new(MySqlCursor::new(columns, rows))))
    }
}

/// Truncate a string for logging purposes.
pub(crate) fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_preserves_order() {
        let mut cursor = BufferedCursor::from_text(["id", "name"], [vec!["1", "a"], vec!["2", "b"]]);
        let result = normalize(&mut cursor, None);

        assert_eq!(result.columns, vec!["id", "name"]);
        assert_eq!(result.rows.len(), 2);
        assert!(!result.truncated);

        let json = serde_json::to_string(&result.rows).unwrap();
        assert_eq!(json, r#"[{"id":"1","name":"a"},{"id":"2","name":"b"}]"#);
    }

    #[test]
    fn test_normalize_keeps_column_order_not_alphabetical() {
        let mut cursor = BufferedCursor::from_text(["zeta", "alpha"], [vec!["z", "a"]]);
        let result = normalize(&mut cursor, None);

        let json = serde_json::to_string(&result.rows[0]).unwrap();
        assert_eq!(json, r#"{"zeta":"z","alpha":"a"}"#);
        assert_eq!(result.rows[0].keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_normalize_null_cells() {
        let mut cursor = BufferedCursor::new(
            vec!["id".to_string(), "note".to_string()],
            vec![vec![Some("1".to_string()), None]],
        );
        let result = normalize(&mut cursor, None);

        assert_eq!(result.rows[0].get("note"), Some(None));
        assert_eq!(result.rows[0].get("id"), Some(Some("1")));
        assert_eq!(result.rows[0].get("missing"), None);

        let json = serde_json::to_value(&result.rows[0]).unwrap();
        assert!(json["note"].is_null());
    }

    #[test]
    fn test_normalize_short_row_padded_with_null() {
        let mut cursor = BufferedCursor::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Some("1".to_string())]],
        );
        let result = normalize(&mut cursor, None);

        assert_eq!(result.rows[0].len(), 2);
        assert_eq!(result.rows[0].get("b"), Some(None));
    }

    #[test]
    fn test_normalize_duplicate_column_names() {
        let mut cursor = BufferedCursor::from_text(
            ["name", "id", "name"],
            [vec!["alice", "7", "sales"]],
        );
        let result = normalize(&mut cursor, None);

        assert_eq!(result.columns, vec!["name", "id"]);
        assert_eq!(result.rows[0].len(), result.columns.len());
        assert_eq!(result.rows[0].get("name"), Some(Some("sales")));

        let json = serde_json::to_string(&result.rows[0]).unwrap();
        assert_eq!(json, r#"{"name":"sales","id":"7"}"#);

        let parsed: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), result.columns.len());
    }

    #[test]
    fn test_normalize_empty_result() {
        let mut cursor = BufferedCursor::from_text(["n"], Vec::<Vec<&'static str>>::new());
        let result = normalize(&mut cursor, None);

        assert_eq!(result.columns, vec!["n"]);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_normalize_row_cap() {
        let mut cursor =
            BufferedCursor::from_text(["n"], [vec!["1"], vec!["2"], vec!["3"]]);
        let result = normalize(&mut cursor, Some(2));

        assert_eq!(result.rows.len(), 2);
        assert!(result.truncated);

        let mut cursor = BufferedCursor::from_text(["n"], [vec!["1"], vec!["2"]]);
        let result = normalize(&mut cursor, Some(2));
        assert!(!result.truncated);
    }

    #[test]
    fn test_outcome_debug() {
        let outcome = ExecutionOutcome::Rows(Box::new(BufferedCursor::from_text(
            ["n"],
            [vec!["42"]],
        )));
        assert_eq!(format!("{:?}", outcome), r#"Rows(["n"])"#);
        assert_eq!(format!("{:?}", ExecutionOutcome::NoRows), "NoRows");
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("this is a long string", 10), "this is a ...");
        assert_eq!(truncate_for_log("ééééé", 2), "éé...");
    }
}
