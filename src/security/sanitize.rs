//! Cleanup of raw completion text into a single candidate statement.

/// Normalize raw completion text into a single-line statement.
///
/// Trims surrounding whitespace, removes every embedded line break, and
/// drops one stray leading `?` (which completion models sometimes emit as a
/// continuation marker). Trailing `;` terminators are dropped as well, the
/// same text a `;` stop sequence would have cut. The result is not checked
/// for validity here; see [`QueryValidator`](super::QueryValidator).
///
/// # Examples
///
/// ```
/// use planetscale_ai::security::sanitize;
///
/// assert_eq!(sanitize(" SELECT COUNT(*) AS n FROM products;"), "SELECT COUNT(*) AS n FROM products");
/// assert_eq!(sanitize("?\nSELECT 1"), "SELECT 1");
/// ```
pub fn sanitize(raw_completion: &str) -> String {
    let collapsed: String = raw_completion
        .trim()
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect();

    let statement = match collapsed.strip_prefix('?') {
        Some(rest) => rest.trim(),
        None => collapsed.as_str(),
    };

    strip_terminators(statement).to_string()
}

/// Drop trailing statement terminators and the whitespace around them.
fn strip_terminators(statement: &str) -> &str {
    statement.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(sanitize("  SELECT 1  "), "SELECT 1");
        assert_eq!(sanitize("\t\nSELECT 1\n\n"), "SELECT 1");
    }

    #[test]
    fn test_removes_all_newlines() {
        assert_eq!(
            sanitize("SELECT id,\nname\nFROM users"),
            "SELECT id,nameFROM users"
        );
        assert_eq!(sanitize("SELECT *\r\nFROM t"), "SELECT *FROM t");
        assert!(!sanitize("a\nb\nc\nd").contains('\n'));
    }

    #[test]
    fn test_strips_exactly_one_question_mark() {
        assert_eq!(sanitize("? SELECT 1"), "SELECT 1");
        assert_eq!(sanitize("??SELECT 1"), "?SELECT 1");
        assert_eq!(sanitize("  ?SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_question_mark_elsewhere_untouched() {
        assert_eq!(
            sanitize("SELECT * FROM t WHERE a = '?'"),
            "SELECT * FROM t WHERE a = '?'"
        );
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            " SELECT COUNT(*) AS n FROM products",
            "?\n  SELECT name\nFROM employees  ",
            "\n\n",
            "",
            "SELECT '?' AS q",
            "? ",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_second_question_mark_after_trim_needs_another_pass() {
        // Once one `?` is stripped, any `?` that trimming brings to the front
        // survives the call and is removed by the next one.
        for input in ["??SELECT 1", "? ?SELECT 1", "?\n?SELECT 1"] {
            let once = sanitize(input);
            assert_eq!(once, "?SELECT 1", "input: {:?}", input);
            assert_eq!(sanitize(&once), "SELECT 1");
        }
    }

    #[test]
    fn test_completion_with_leading_space_and_terminator() {
        assert_eq!(
            sanitize(" SELECT COUNT(*) AS n FROM products;"),
            "SELECT COUNT(*) AS n FROM products"
        );
        assert_eq!(sanitize("SELECT 1 ; ;\n"), "SELECT 1");
    }

    #[test]
    fn test_interior_terminator_kept() {
        // Interior terminators are left for the validator to reject.
        assert_eq!(sanitize("SELECT 1; DROP TABLE t"), "SELECT 1; DROP TABLE t");
    }
}
