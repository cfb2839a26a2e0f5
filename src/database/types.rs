//! MySQL type mapping: logical column types and cell stringification.

use crate::error::ServerError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlRow;
use sqlx::{ColumnIndex, Row, ValueRef};
use std::fmt;
use tracing::warn;

/// Logical column type reported by table schema introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalType {
    String,
    Number,
    Boolean,
    Date,
    Datetime,
    Timestamp,
}

impl LogicalType {
    /// Map a MySQL column type as reported by `DESCRIBE` (e.g. `varchar(255)`,
    /// `bigint(20) unsigned`) to its logical type.
    ///
    /// The parameter suffix and trailing attributes are ignored; the bare
    /// type name is matched case-insensitively. Unknown types are an error.
    pub fn from_mysql_type(engine_type: &str) -> Result<Self, ServerError> {
        let bare = bare_type_name(engine_type);

        let logical = match bare.as_str() {
            "varchar" | "char" | "text" | "tinytext" | "mediumtext" | "longtext" | "enum"
            | "set" => LogicalType::String,
            "int" | "integer" | "tinyint" | "smallint" | "mediumint" | "bigint" | "float"
            | "double" | "decimal" | "numeric" => LogicalType::Number,
            "boolean" | "bool" | "bit" => LogicalType::Boolean,
            "date" => LogicalType::Date,
            "datetime" => LogicalType::Datetime,
            "timestamp" => LogicalType::Timestamp,
            _ => return Err(ServerError::schema_mapping(engine_type.trim())),
        };

        Ok(logical)
    }

    /// Wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::String => "STRING",
            LogicalType::Number => "NUMBER",
            LogicalType::Boolean => "BOOLEAN",
            LogicalType::Date => "DATE",
            LogicalType::Datetime => "DATETIME",
            LogicalType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip everything from the first `(` and any attribute after a space.
fn bare_type_name(engine_type: &str) -> String {
    let trimmed = engine_type.trim();
    let without_params = match trimmed.find('(') {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    };
    without_params
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Converts MySQL row cells into text.
pub struct TypeMapper;

impl TypeMapper {
    /// Render cell `idx` of a row as text; SQL `NULL` becomes `None`.
    ///
    /// Every type the engine can return is rendered as a string. Binary
    /// payloads are decoded as lossy UTF-8.
    pub fn cell_text(row: &MySqlRow, idx: usize) -> Option<String> {
        match row.try_get_raw(idx) {
            Ok(raw) if raw.is_null() => return None,
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read column {}: {}", idx, e);
                return None;
            }
        }

        // Strings (most common)
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Some(v);
        }

        // Integers
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            return Some(v.to_string());
        }

        // Floating point
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<f32, _>(idx) {
            return Some(v.to_string());
        }

        // Decimal
        if let Ok(v) = row.try_get::<Decimal, _>(idx) {
            return Some(v.to_string());
        }

        // Boolean
        if let Ok(v) = row.try_get::<bool, _>(idx) {
            return Some(v.to_string());
        }

        // Date/Time types
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<NaiveDate, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<NaiveTime, _>(idx) {
            return Some(v.to_string());
        }
        if let Ok(v) = row.try_get::<DateTime<Utc>, _>(idx) {
            return Some(v.to_rfc3339());
        }

        // Binary, JSON and anything else the server sends as bytes
        if let Ok(v) = row.try_get_unchecked::<Vec<u8>, _>(idx) {
            return Some(String::from_utf8_lossy(&v).into_owned());
        }

        warn!("Unsupported column type at index {}; rendering as null", idx);
        None
    }

    /// Read a text column from an introspection result (`SHOW`/`DESCRIBE`).
    ///
    /// Some servers report these columns as binary strings, so bytes are
    /// accepted as well.
    pub fn text_column<I>(row: &MySqlRow, index: I) -> Result<Option<String>, ServerError>
    where
        I: ColumnIndex<MySqlRow> + Copy,
    {
        if let Ok(v) = row.try_get::<Option<String>, _>(index) {
            return Ok(v);
        }

        let bytes: Option<Vec<u8>> = row.try_get_unchecked(index)?;
        Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_suffix_ignored() {
        assert_eq!(
            LogicalType::from_mysql_type("varchar(255)").unwrap(),
            LogicalType::String
        );
        assert_eq!(
            LogicalType::from_mysql_type("varchar").unwrap(),
            LogicalType::String
        );
        assert_eq!(
            LogicalType::from_mysql_type("decimal(10,2)").unwrap(),
            LogicalType::Number
        );
        assert_eq!(
            LogicalType::from_mysql_type("tinyint(1)").unwrap(),
            LogicalType::Number
        );
    }

    #[test]
    fn test_trailing_attributes_ignored() {
        assert_eq!(
            LogicalType::from_mysql_type("bigint(20) unsigned").unwrap(),
            LogicalType::Number
        );
        assert_eq!(
            LogicalType::from_mysql_type("int unsigned zerofill").unwrap(),
            LogicalType::Number
        );
        assert_eq!(
            LogicalType::from_mysql_type("enum('a','b c')").unwrap(),
            LogicalType::String
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            LogicalType::from_mysql_type("DATETIME").unwrap(),
            LogicalType::Datetime
        );
        assert_eq!(
            LogicalType::from_mysql_type("Timestamp(6)").unwrap(),
            LogicalType::Timestamp
        );
    }

    #[test]
    fn test_full_type_table() {
        let cases = [
            ("char(3)", LogicalType::String),
            ("longtext", LogicalType::String),
            ("mediumint", LogicalType::Number),
            ("double", LogicalType::Number),
            ("float", LogicalType::Number),
            ("bit(1)", LogicalType::Boolean),
            ("boolean", LogicalType::Boolean),
            ("date", LogicalType::Date),
        ];
        for (engine_type, expected) in cases {
            assert_eq!(
                LogicalType::from_mysql_type(engine_type).unwrap(),
                expected,
                "type: {}",
                engine_type
            );
        }
    }

    #[test]
    fn test_unknown_type_is_error() {
        for engine_type in ["geometry", "json", "blob", "varbinary(16)", "time", ""] {
            let err = LogicalType::from_mysql_type(engine_type).unwrap_err();
            assert!(
                matches!(err, ServerError::SchemaMapping { .. }),
                "type: {}",
                engine_type
            );
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_value(LogicalType::Datetime).unwrap(),
            "DATETIME"
        );
        assert_eq!(LogicalType::Number.to_string(), "NUMBER");
    }
}
