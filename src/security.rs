//! Identifier escaping, completion cleanup, and statement validation.

mod identifiers;
mod sanitize;
mod validation;

pub use identifiers::{escape_identifier, qualified_table, safe_identifier, validate_identifier};
pub use sanitize::sanitize;
pub use validation::{detect_query_type, QueryType, QueryValidator, ValidationMode};
