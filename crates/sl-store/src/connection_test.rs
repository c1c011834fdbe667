//! Tests for DuckDbStore connection and migrations.

use crate::DuckDbStore;

fn count(store: &DuckDbStore, sql: &str) -> i64 {
    store
        .with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get::<_, i64>(0))?))
        .unwrap()
}

#[test]
fn open_memory_succeeds() {
    let store = DuckDbStore::open_memory().unwrap();
    assert_eq!(
        count(&store, "SELECT COUNT(*) FROM sluice.schema_version"),
        crate::ddl::MIGRATIONS.len() as i64
    );
}

#[test]
fn open_file_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sluice.duckdb");
    assert!(!path.exists());
    let _store = DuckDbStore::open(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn open_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sluice.duckdb");
    {
        let _first = DuckDbStore::open(&path).unwrap();
    }
    let second = DuckDbStore::open(&path).unwrap();
    assert_eq!(
        count(&second, "SELECT COUNT(*) FROM sluice.schema_version"),
        crate::ddl::MIGRATIONS.len() as i64,
        "schema_version should have one row per migration"
    );
}

#[test]
fn new_handles_memory_path() {
    let store = DuckDbStore::new(":memory:").unwrap();
    assert_eq!(count(&store, "SELECT COUNT(*) FROM sluice.changelog"), 0);
}

#[test]
fn changelog_status_is_constrained() {
    let store = DuckDbStore::open_memory().unwrap();
    let result = store.with_conn(|conn| {
        Ok(conn.execute(
            "INSERT INTO sluice.changelog (uid, database_uid, status, payload) VALUES (1, 1, 'RUNNING', '{}')",
            [],
        )?)
    });
    assert!(result.is_err());
}
