//! Read-only checks for generated SQL

use crate::error::AssistantError;
use crate::Result;

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "truncate", "create", "grant", "revoke",
    "copy", "vacuum", "call", "merge", "lock", "comment", "reindex",
];

/// Pull the statement out of a model reply (```sql fences, trailing semicolons)
pub fn extract_sql(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after
            .strip_prefix("sql")
            .or_else(|| after.strip_prefix("SQL"))
            .or_else(|| after.strip_prefix("postgresql"))
            .unwrap_or(after);
        text = match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        };
    }

    text.trim().trim_end_matches(';').trim().to_string()
}

/// Accept a single SELECT / WITH statement that cannot modify data
pub fn ensure_read_only(sql: &str) -> Result<()> {
    if sql.is_empty() {
        return Err(AssistantError::InvalidQuery(
            "No SQL statement was generated".to_string(),
        ));
    }

    let code = mask_quoted(sql);

    if code.contains(';') {
        return Err(AssistantError::InvalidQuery(
            "Only a single statement is allowed".to_string(),
        ));
    }

    let lowered = code.to_lowercase();
    let mut words = lowered
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty());

    match words.next() {
        Some("select") | Some("with") => {}
        _ => {
            return Err(AssistantError::InvalidQuery(format!(
                "Only SELECT queries are allowed: {}",
                sql
            )))
        }
    }

    if let Some(keyword) = words.find(|w| FORBIDDEN_KEYWORDS.contains(w)) {
        return Err(AssistantError::InvalidQuery(format!(
            "Statement contains forbidden keyword '{}'",
            keyword
        )));
    }

    Ok(())
}

/// Blank out the contents of '...' literals and "..." identifiers.
/// A doubled quote inside a literal closes and reopens it, so it stays masked.
fn mask_quoted(sql: &str) -> String {
    let mut open: Option<char> = None;

    sql.chars()
        .map(|c| match (open, c) {
            (None, '\'' | '"') => {
                open = Some(c);
                c
            }
            (Some(q), _) if c == q => {
                open = None;
                c
            }
            (Some(_), _) => ' ',
            (None, _) => c,
        })
        .collect()
}
