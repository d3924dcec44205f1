//! Identifier escaping.
//!
//! Values never reach the SQL text; identifiers do, so this is the only
//! defense against injection through table and column names.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static PLAIN_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap_or_else(|_| unreachable!())
});

/// Pass `name` through when it is a plain identifier, otherwise wrap it in
/// double quotes with embedded quotes doubled.
///
/// # Examples
///
/// ```
/// use genoquery_db::query_builder::escape_identifier;
///
/// assert_eq!(escape_identifier("sampleId"), "sampleId");
/// assert_eq!(escape_identifier("allele freq"), "\"allele freq\"");
/// ```
pub fn escape_identifier(name: &str) -> Cow<'_, str> {
    if PLAIN_IDENTIFIER.is_match(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// Escape a possibly qualified column reference (`table.column`, `*`,
/// `table.*`), one segment at a time.
pub fn escape_column(name: &str) -> String {
    if name == "*" {
        return name.to_string();
    }
    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() == 1 || segments.iter().any(|s| s.is_empty()) {
        return escape_identifier(name).into_owned();
    }
    let last = segments.len() - 1;
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            if i == last && *segment == "*" {
                Cow::Borrowed("*")
            } else {
                escape_identifier(segment)
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
