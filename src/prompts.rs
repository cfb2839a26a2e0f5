//! Prompt rendering for natural-language-to-SQL translation.
//!
//! The prompt is a block of `#`-prefixed instructions listing the tables of
//! the resolved database, followed by the caller's question. The completion
//! model continues the text with a statement, and the `#` stop sequence keeps
//! it from inventing another instruction block.

use crate::constants::SQL_DIALECT;

/// Render the translation prompt for a table list and a question.
///
/// Pure and deterministic: the same inputs always render the same text. The
/// question is appended verbatim as the final line.
///
/// # Examples
///
/// ```
/// use planetscale_ai::prompts::build_prompt;
///
/// let prompt = build_prompt(&["products".to_string()], "how many products?");
/// assert!(prompt.contains("# - products\n"));
/// assert!(prompt.ends_with("#\nhow many products?"));
/// ```
pub fn build_prompt(tables: &[String], natural_language: &str) -> String {
    let mut prompt = format!(
        r#"### Turn this natural language prompt into a SQL query
#
# We are generating {dialect} SQL dialect queries. You should only generate read-only queries.
#
# The user may have specified a database name, or not. The user may use colloquial names for their tables, so make sure
# to use the table list below to look for names (unless they use an exact name matching a table, in which case, use that
# name).
#
# Make sure to only use tables that actually exist in the database. Here is the list of active tables. Also
# keep in mind that the user may use colloquial names from their columns, so make sure to only reference
# columns which exist. If a table exists with different capitalization than an input, it's safe to just
# assume that is the table the user is talking about.
#
# Tables in the database:
"#,
        dialect = SQL_DIALECT
    );

    for table in tables {
        prompt.push_str("# - ");
        prompt.push_str(table);
        prompt.push('\n');
    }

    prompt.push_str("#\n");
    prompt.push_str(natural_language);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_deterministic() {
        let t = tables(&["products", "orders"]);
        assert_eq!(
            build_prompt(&t, "how many orders?"),
            build_prompt(&t, "how many orders?")
        );
    }

    #[test]
    fn test_one_line_per_table_in_order() {
        let prompt = build_prompt(&tables(&["products", "orders"]), "q");
        assert!(prompt.contains("# Tables in the database:\n# - products\n# - orders\n#\nq"));
    }

    #[test]
    fn test_question_is_last_line_verbatim() {
        let question = "list names where note = '# not a comment'";
        let prompt = build_prompt(&tables(&["t"]), question);
        assert_eq!(prompt.lines().last(), Some(question));
    }

    #[test]
    fn test_names_dialect() {
        let prompt = build_prompt(&[], "q");
        assert!(prompt.starts_with("### Turn this natural language prompt into a SQL query\n"));
        assert!(prompt.contains("We are generating MySQL SQL dialect queries."));
    }

    #[test]
    fn test_empty_table_list() {
        let prompt = build_prompt(&[], "q");
        assert!(!prompt.contains("# - "));
        assert!(prompt.ends_with("# Tables in the database:\n#\nq"));
    }
}
