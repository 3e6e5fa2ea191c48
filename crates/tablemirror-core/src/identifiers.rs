//! Identifier quoting, validation and DDL placeholder substitution.

use std::sync::OnceLock;

use regex::Regex;

/// Placeholder replaced by the schema namespace in DDL and seed statements.
pub const NS_PLACEHOLDER: &str = "{NS}";

/// Placeholder replaced by the table name in DDL and seed statements.
pub const NAME_PLACEHOLDER: &str = "{NAME}";

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|e| {
            unreachable!("identifier pattern is a valid regex: {e}")
        })
    })
}

/// True if `name` is a plain identifier that never needs quoting.
///
/// Quoted identifiers can contain anything, so this is only used to validate
/// names that are spliced into generated SQL without quoting (namespace names).
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

/// Quote an identifier with double quotes, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal with single quotes, doubling embedded quotes.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Substitute `{NS}` and `{NAME}` in a DDL or seed statement.
pub fn substitute_placeholders(sql: &str, namespace: &str, table_name: &str) -> String {
    sql.replace(NS_PLACEHOLDER, namespace)
        .replace(NAME_PLACEHOLDER, table_name)
}
