//! Structural allow-listing for model-authored SQL.
//!
//! A query passes only when it contains none of the forbidden tokens and
//! parses as exactly one plain `SELECT`. The guard never executes anything.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "DELETE", "GRANT", "REVOKE",
    "EXECUTE", "EXEC", "--", "/*", "*/",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlGuardVerdict {
    pub allowed: bool,
    pub reason: String,
}

impl SqlGuardVerdict {
    fn allow() -> Self {
        Self { allowed: true, reason: String::new() }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self { allowed: false, reason: reason.into() }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqlGuard;

impl SqlGuard {
    pub fn validate(&self, query: &str) -> SqlGuardVerdict {
        let query = query.trim();
        let upper = query.to_uppercase();
        // Plain substring match, so keywords inside comments or identifiers also reject.
        if let Some(keyword) = FORBIDDEN_KEYWORDS.iter().find(|keyword| upper.contains(*keyword)) {
            return SqlGuardVerdict::deny(format!(
                "Query contains forbidden keyword or pattern: {keyword}"
            ));
        }

        let statements = match Parser::parse_sql(&GenericDialect {}, query) {
            Ok(statements) => statements,
            Err(error) => return SqlGuardVerdict::deny(format!("Invalid SQL: {error}")),
        };

        match statements.as_slice() {
            [Statement::Query(parsed)] if is_plain_select(parsed) => SqlGuardVerdict::allow(),
            [_] => SqlGuardVerdict::deny("Only SELECT queries are allowed."),
            [] => SqlGuardVerdict::deny("Invalid SQL: empty query"),
            _ => SqlGuardVerdict::deny("Invalid SQL: expected a single statement"),
        }
    }
}

fn is_plain_select(query: &Query) -> bool {
    match query.body.as_ref() {
        SetExpr::Select(select) => select.into.is_none(),
        SetExpr::Query(inner) => is_plain_select(inner),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::SqlGuard;

    #[test]
    fn plain_selects_are_allowed() {
        let guard = SqlGuard;
        for query in [
            "SELECT 1",
            "select name, price from products where price > ?1 order by price",
            "WITH cheap AS (SELECT * FROM products WHERE price < 20) SELECT name FROM cheap;",
            "(SELECT name FROM products)",
        ] {
            let verdict = guard.validate(query);
            assert!(verdict.allowed, "{query}: {}", verdict.reason);
        }
    }

    #[test]
    fn mutating_statements_name_the_forbidden_keyword() {
        let guard = SqlGuard;
        for (query, keyword) in [
            ("DROP TABLE x", "DROP"),
            ("DELETE FROM x", "DELETE"),
            ("UPDATE x SET y=1", "UPDATE"),
            ("TRUNCATE TABLE x", "TRUNCATE"),
            ("SELECT 1 -- trailing", "--"),
            ("SELECT /* hidden */ 1", "/*"),
        ] {
            let verdict = guard.validate(query);
            assert!(!verdict.allowed);
            assert_eq!(verdict.reason, format!("Query contains forbidden keyword or pattern: {keyword}"));
        }
    }

    #[test]
    fn keyword_match_is_a_substring_search() {
        let verdict = SqlGuard.validate("SELECT created_at FROM orders");
        assert!(!verdict.allowed);
        assert!(verdict.reason.ends_with("CREATE"));
    }

    #[test]
    fn non_select_and_garbage_are_rejected() {
        let guard = SqlGuard;

        let verdict = guard.validate("VALUES (1, 2)");
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, "Only SELECT queries are allowed.");

        let verdict = guard.validate("SELECT 1 UNION SELECT 2");
        assert_eq!(verdict.reason, "Only SELECT queries are allowed.");

        let verdict = guard.validate("SELEC name FRM products");
        assert!(verdict.reason.starts_with("Invalid SQL:"));

        let verdict = guard.validate("SELECT 1; SELECT 2");
        assert!(!verdict.allowed);
        assert!(verdict.reason.starts_with("Invalid SQL:"));
    }
}
