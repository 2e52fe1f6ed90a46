//! SQL pattern normalization.
//!
//! The normalizer maps SQL text to its aggregation key: whitespace is
//! collapsed, string literals become `:str`, bare numbers become `:num`,
//! and keywords are uppercased. `$n` bind placeholders survive unchanged
//! so prepared statements normalize to themselves. Total by design:
//! any input, including garbage, produces some pattern.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // One pass: string literal | bind placeholder | numeric literal.
    // The alternation keeps digits inside `$17` from matching as numbers.
    static ref LITERALS: Regex =
        Regex::new(r"('(?:[^']|'')*')|(\$\d+)|(\b\d+(?:\.\d+)?\b)").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

const KEYWORDS: &[&str] = &[
    "select", "from", "where", "and", "or", "not", "in", "is", "null", "like", "ilike", "join",
    "inner", "left", "right", "outer", "on", "group", "by", "having", "order", "asc", "desc",
    "limit", "offset", "insert", "into", "values", "update", "set", "delete", "returning", "count",
    "sum", "avg", "min", "max", "distinct", "as", "between", "exists", "union", "all", "case",
    "when", "then", "else", "end", "begin", "commit", "rollback", "for",
];

/// Normalize SQL text into its query pattern. Identical output for SQL
/// that differs only by literal values.
pub fn normalize_pattern(sql: &str) -> String {
    if sql.trim().is_empty() {
        return String::new();
    }

    let erased = LITERALS.replace_all(sql, |caps: &regex::Captures<'_>| {
        if caps.get(1).is_some() {
            ":str".to_string()
        } else if let Some(placeholder) = caps.get(2) {
            placeholder.as_str().to_string()
        } else {
            ":num".to_string()
        }
    });

    let collapsed = WHITESPACE.replace_all(erased.trim(), " ");

    collapsed
        .split(' ')
        .map(|word| {
            if KEYWORDS.contains(&word.to_ascii_lowercase().as_str()) {
                word.to_ascii_uppercase()
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
