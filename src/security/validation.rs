//! Statement validation for generated queries.

use crate::error::ServerError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Statement validation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Read-only mode: only row-reading statements are allowed.
    /// Allows: SELECT, WITH, SHOW, DESCRIBE/DESC, EXPLAIN
    #[default]
    ReadOnly,

    /// Unrestricted mode: any single statement is passed to the engine.
    /// Warning: Use only with database credentials that are themselves read-only.
    Unrestricted,
}

impl std::str::FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "readonly" | "read_only" | "read-only" => Ok(ValidationMode::ReadOnly),
            "unrestricted" => Ok(ValidationMode::Unrestricted),
            _ => Err(format!("invalid validation mode: '{}'", s)),
        }
    }
}

/// Type of SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Show,
    Describe,
    Explain,
    Insert,
    Update,
    Delete,
    Replace,
    Create,
    Alter,
    Drop,
    Truncate,
    Call,
    Grant,
    Revoke,
    Set,
    Other,
}

impl QueryType {
    /// Check if this statement only reads.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            QueryType::Select | QueryType::Show | QueryType::Describe | QueryType::Explain
        )
    }
}

/// Regex patterns for statement type detection.
///
/// These patterns are compiled once at first use (lazy static) for performance.
/// All patterns are hardcoded constants that have been verified to be valid regex.
static QUERY_TYPE_PATTERNS: Lazy<Vec<(Regex, QueryType)>> = Lazy::new(|| {
    fn compile(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap_or_else(|e| {
            panic!("Internal error: invalid regex pattern '{}': {}", pattern, e)
        })
    }

    vec![
        (compile(r"(?i)^\s*\(?\s*SELECT\b"), QueryType::Select),
        (compile(r"(?i)^\s*WITH\b"), QueryType::Select), // CTEs are SELECT
        (compile(r"(?i)^\s*SHOW\b"), QueryType::Show),
        (compile(r"(?i)^\s*(DESCRIBE|DESC)\b"), QueryType::Describe),
        (compile(r"(?i)^\s*EXPLAIN\b"), QueryType::Explain),
        (compile(r"(?i)^\s*INSERT\b"), QueryType::Insert),
        (compile(r"(?i)^\s*UPDATE\b"), QueryType::Update),
        (compile(r"(?i)^\s*DELETE\b"), QueryType::Delete),
        (compile(r"(?i)^\s*REPLACE\b"), QueryType::Replace),
        (compile(r"(?i)^\s*CREATE\b"), QueryType::Create),
        (compile(r"(?i)^\s*ALTER\b"), QueryType::Alter),
        (compile(r"(?i)^\s*DROP\b"), QueryType::Drop),
        (compile(r"(?i)^\s*TRUNCATE\b"), QueryType::Truncate),
        (compile(r"(?i)^\s*CALL\b"), QueryType::Call),
        (compile(r"(?i)^\s*GRANT\b"), QueryType::Grant),
        (compile(r"(?i)^\s*REVOKE\b"), QueryType::Revoke),
        (compile(r"(?i)^\s*SET\b"), QueryType::Set),
    ]
});

/// Clauses that write even inside a SELECT.
static WRITING_CLAUSES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    fn compile(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap_or_else(|e| {
            panic!("Internal error: invalid regex pattern '{}': {}", pattern, e)
        })
    }

    vec![
        (compile(r"(?i)\bINTO\s+OUTFILE\b"), "INTO OUTFILE"),
        (compile(r"(?i)\bINTO\s+DUMPFILE\b"), "INTO DUMPFILE"),
        (compile(r"(?i)\bFOR\s+UPDATE\b"), "FOR UPDATE"),
        (compile(r"(?i)\bLOCK\s+IN\s+SHARE\s+MODE\b"), "LOCK IN SHARE MODE"),
    ]
});

/// Statement validator applied between sanitizing and executing.
#[derive(Debug, Clone)]
pub struct QueryValidator {
    mode: ValidationMode,
    max_length: usize,
}

impl QueryValidator {
    /// Create a new statement validator.
    pub fn new(mode: ValidationMode, max_length: usize) -> Self {
        Self { mode, max_length }
    }

    /// Validate a statement against the current mode, returning its type.
    pub fn validate(&self, query: &str) -> Result<QueryType, ServerError> {
        if query.trim().is_empty() {
            return Err(ServerError::invalid_input("Statement is empty"));
        }

        if query.len() > self.max_length {
            return Err(ServerError::invalid_input(format!(
                "Statement exceeds maximum length of {} bytes",
                self.max_length
            )));
        }

        if has_stacked_statement(query) {
            return Err(ServerError::invalid_input(
                "Multiple statements are not allowed",
            ));
        }

        let query_type = detect_query_type(query);

        match self.mode {
            ValidationMode::ReadOnly => self.validate_read_only(query, query_type),
            ValidationMode::Unrestricted => Ok(query_type),
        }
    }

    /// Validate in read-only mode.
    fn validate_read_only(&self, query: &str, query_type: QueryType) -> Result<QueryType, ServerError> {
        if !query_type.is_read() {
            return Err(ServerError::invalid_input(format!(
                "Statement type {:?} is not allowed in read-only mode",
                query_type
            )));
        }

        for (pattern, clause) in WRITING_CLAUSES.iter() {
            if pattern.is_match(query) {
                return Err(ServerError::invalid_input(format!(
                    "Clause '{}' is not allowed in read-only mode",
                    clause
                )));
            }
        }

        Ok(query_type)
    }

    /// Get the current validation mode.
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }
}

/// Detect the type of a SQL statement.
pub fn detect_query_type(query: &str) -> QueryType {
    let trimmed = remove_leading_comments(query);

    for (pattern, query_type) in QUERY_TYPE_PATTERNS.iter() {
        if pattern.is_match(trimmed) {
            return *query_type;
        }
    }

    QueryType::Other
}

/// Remove leading SQL comments from a statement.
fn remove_leading_comments(query: &str) -> &str {
    let mut rest = query;

    loop {
        let trimmed = rest.trim_start();

        // Line comments: `-- ` and MySQL's `#`
        if trimmed.starts_with("--") || trimmed.starts_with('#') {
            match trimmed.find('\n') {
                Some(newline_pos) => {
                    rest = &trimmed[newline_pos + 1..];
                    continue;
                }
                None => return "",
            }
        }

        if trimmed.starts_with("/*") {
            match trimmed.find("*/") {
                Some(end_pos) => {
                    rest = &trimmed[end_pos + 2..];
                    continue;
                }
                None => return "",
            }
        }

        return trimmed;
    }
}

/// Check for a `;` outside string literals followed by more SQL.
fn has_stacked_statement(query: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut chars = query.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match quote {
            Some(_) if c == '\\' => {
                // Skip the escaped character inside a literal
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                ';' => {
                    let remainder = query[idx + 1..].trim_matches(|ch: char| ch == ';' || ch.is_whitespace());
                    if !remainder.is_empty() {
                        return true;
                    }
                }
                _ => {}
            },
        }
    }

    false
}
