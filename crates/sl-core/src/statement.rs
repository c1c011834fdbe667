//! Statement rendering, secret redaction and truncation.
//!
//! Statements may reference per-database secrets as `${{ secrets.NAME }}`.
//! The rendered text is only ever handed to the driver; anything that ends up
//! in logs or error messages must go through [`redact_secrets`] or use the
//! original statement.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Upper bound on statement text kept in logs and error messages.
pub const MAX_STATEMENT_RECORD_SIZE: usize = 2 * 1024 * 1024;

static SECRET_PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn secret_placeholder_re() -> &'static Regex {
    SECRET_PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"\$\{\{\s*secrets\.([A-Za-z0-9_]+)\s*\}\}").expect("valid regex")
    })
}

/// Substitute `${{ secrets.NAME }}` placeholders with secret values.
///
/// Unknown names are left untouched.
pub fn render_statement(statement: &str, secrets: &BTreeMap<String, String>) -> String {
    if secrets.is_empty() {
        return statement.to_string();
    }
    secret_placeholder_re()
        .replace_all(statement, |caps: &Captures<'_>| match secrets.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Replace every secret value occurring in `text` with its placeholder.
pub fn redact_secrets(text: &str, secrets: &BTreeMap<String, String>) -> String {
    let mut by_length: Vec<(&String, &String)> =
        secrets.iter().filter(|(_, v)| !v.is_empty()).collect();
    // Longest values first so a secret that contains another is not split.
    by_length.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut redacted = text.to_string();
    for (name, value) in by_length {
        redacted = redacted.replace(value.as_str(), &format!("${{{{ secrets.{name} }}}}"));
    }
    redacted
}

/// Cut `s` to at most `max` bytes on a char boundary.
///
/// Returns the (possibly shortened) text and whether it was truncated.
pub fn truncate_statement(s: &str, max: usize) -> (&str, bool) {
    if s.len() <= max {
        return (s, false);
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    (&s[..end], true)
}

#[cfg(test)]
#[path = "statement_test.rs"]
mod tests;
