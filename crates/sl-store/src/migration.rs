//! Schema migration runner for the metadata store.
//!
//! Applied versions are tracked in `sluice.schema_version`; any unapplied
//! migration runs on each open.

use crate::ddl::MIGRATIONS;
use crate::error::{StoreError, StoreResult};
use duckdb::Connection;

fn ensure_version_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE SCHEMA IF NOT EXISTS sluice;
         CREATE TABLE IF NOT EXISTS sluice.schema_version (
             version    INTEGER NOT NULL,
             applied_at TIMESTAMP NOT NULL DEFAULT now()
         );",
    )
    .map_err(|e| {
        StoreError::MigrationError(format!("failed to create schema_version table: {e}"))
    })
}

/// Highest applied migration version, or 0 if none.
fn current_version(conn: &Connection) -> StoreResult<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM sluice.schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::MigrationError(format!("failed to read schema version: {e}")))
}

/// Run all unapplied migrations against `conn`.
///
/// A migration and its version row are committed together.
pub fn run_migrations(conn: &Connection) -> StoreResult<()> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        log::debug!("Applying store migration v{:03}", migration.version);

        let script = format!(
            "BEGIN TRANSACTION;\n{}\nINSERT INTO sluice.schema_version (version) VALUES ({});\nCOMMIT;",
            migration.sql, migration.version
        );
        if let Err(e) = conn.execute_batch(&script) {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(StoreError::MigrationError(format!(
                "migration v{:03} failed: {e}",
                migration.version
            )));
        }
    }
    Ok(())
}
