//! MySQL identifier escaping utilities.
//!
//! Uses MySQL's backtick notation `` `identifier` `` to safely escape identifiers.

use crate::constants::MAX_IDENTIFIER_LENGTH;
use crate::error::ServerError;

/// Escape a MySQL identifier using backtick notation.
///
/// This function handles:
/// - Database-qualified names (`shop.products` -> `` `shop`.`products` ``)
/// - Simple names (`products` -> `` `products` ``)
/// - Names with spaces or other special characters
/// - Names that contain backticks (escaped by doubling)
///
/// # Examples
///
/// ```
/// use planetscale_ai::security::escape_identifier;
///
/// assert_eq!(escape_identifier("products").unwrap(), "`products`");
/// assert_eq!(escape_identifier("shop.products").unwrap(), "`shop`.`products`");
/// assert_eq!(escape_identifier("order items").unwrap(), "`order items`");
/// ```
pub fn escape_identifier(identifier: &str) -> Result<String, ServerError> {
    if identifier.is_empty() {
        return Err(ServerError::invalid_input("Identifier cannot be empty"));
    }

    if let Some((database, name)) = identifier.split_once('.') {
        let database = escape_single_identifier(database)?;
        let name = escape_single_identifier(name)?;
        return Ok(format!("{}.{}", database, name));
    }

    escape_single_identifier(identifier)
}

/// Escape a single identifier (no dots).
fn escape_single_identifier(identifier: &str) -> Result<String, ServerError> {
    let trimmed = identifier.trim();

    if trimmed.is_empty() {
        return Err(ServerError::invalid_input("Identifier cannot be empty"));
    }

    // Strip outer backticks only when both are present
    let clean = if trimmed.len() >= 2 && trimmed.starts_with('`') && trimmed.ends_with('`') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    if clean.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(ServerError::invalid_input(format!(
            "Identifier exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    Ok(format!("`{}`", clean.replace('`', "``")))
}

/// Validate that an identifier contains only allowed characters.
pub fn validate_identifier(identifier: &str) -> Result<(), ServerError> {
    if identifier.trim().is_empty() {
        return Err(ServerError::invalid_input("Identifier cannot be empty"));
    }

    let dangerous_patterns = [
        "--",   // SQL comment
        "#",    // MySQL line comment
        "/*",   // Multi-line comment start
        "*/",   // Multi-line comment end
        ";",    // Statement separator
        "'",    // String delimiter
        "\"",   // ANSI quoted identifier delimiter
        "\\",   // Escape character
        "\x00", // Null byte
    ];

    for pattern in &dangerous_patterns {
        if identifier.contains(pattern) {
            return Err(ServerError::invalid_input(format!(
                "Identifier contains forbidden character sequence: {}",
                pattern.escape_default()
            )));
        }
    }

    Ok(())
}

/// Validate and escape an identifier for safe use in SQL.
pub fn safe_identifier(identifier: &str) -> Result<String, ServerError> {
    validate_identifier(identifier)?;
    escape_identifier(identifier)
}

/// Validate and escape a `database.table` pair.
pub fn qualified_table(database: &str, table: &str) -> Result<String, ServerError> {
    validate_identifier(database)?;
    validate_identifier(table)?;
    Ok(format!(
        "{}.{}",
        escape_single_identifier(database)?,
        escape_single_identifier(table)?
    ))
}
