use super::*;

fn secrets() -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert("PASSWORD".to_string(), "hunter2".to_string());
    m.insert("TOKEN".to_string(), "tok_123".to_string());
    m
}

#[test]
fn test_render_substitutes_known_secrets() {
    let rendered = render_statement(
        "CREATE USER app WITH PASSWORD '${{ secrets.PASSWORD }}'; -- ${{secrets.TOKEN}}",
        &secrets(),
    );
    assert_eq!(rendered, "CREATE USER app WITH PASSWORD 'hunter2'; -- tok_123");
}

#[test]
fn test_render_leaves_unknown_placeholders() {
    let rendered = render_statement("SELECT '${{ secrets.MISSING }}'", &secrets());
    assert_eq!(rendered, "SELECT '${{ secrets.MISSING }}'");
}

#[test]
fn test_render_without_secrets_is_identity() {
    let stmt = "SELECT '${{ secrets.PASSWORD }}'";
    assert_eq!(render_statement(stmt, &BTreeMap::new()), stmt);
}

#[test]
fn test_redact_restores_placeholders() {
    let redacted = redact_secrets("syntax error near 'hunter2'", &secrets());
    assert_eq!(redacted, "syntax error near '${{ secrets.PASSWORD }}'");
    assert!(!redacted.contains("hunter2"));
}

#[test]
fn test_redact_prefers_longer_values() {
    let mut m = BTreeMap::new();
    m.insert("SHORT".to_string(), "abc".to_string());
    m.insert("LONG".to_string(), "abcdef".to_string());
    let redacted = redact_secrets("value=abcdef", &m);
    assert_eq!(redacted, "value=${{ secrets.LONG }}");
}

#[test]
fn test_truncate_respects_char_boundaries() {
    let (t, truncated) = truncate_statement("héllo", 2);
    assert_eq!(t, "h");
    assert!(truncated);

    let (t, truncated) = truncate_statement("short", 100);
    assert_eq!(t, "short");
    assert!(!truncated);
}
