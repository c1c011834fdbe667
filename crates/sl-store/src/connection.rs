//! Metadata store connection wrapper.
//!
//! [`DuckDbStore`] owns a DuckDB [`Connection`] behind a mutex and provides
//! helpers for opening, migrating and querying the store.

use crate::error::{StoreError, StoreResult};
use crate::migration::run_migrations;
use duckdb::{Connection, Params, Row};
use std::path::Path;
use std::sync::Mutex;

/// DuckDB-backed implementation of [`crate::Store`].
///
/// Each call locks the connection for its duration, so every store write is
/// its own commit.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Open (or create) the store at `path` and run pending migrations.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::ConnectionError(format!("{e}: {}", path.display())))?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store with all migrations applied.
    pub fn open_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open from a configured path string (handles the :memory: special case)
    pub fn new(path: &str) -> StoreResult<Self> {
        if path == ":memory:" {
            Self::open_memory()
        } else {
            Self::open(Path::new(path))
        }
    }

    /// Run `body` with the locked connection.
    pub fn with_conn<T>(&self, body: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::MutexPoisoned(e.to_string()))?;
        body(&conn)
    }
}

/// Draw the next uid from `sluice.{sequence}`.
pub(crate) fn next_uid(conn: &Connection, sequence: &str) -> StoreResult<i64> {
    let uid = conn.query_row(&format!("SELECT nextval('sluice.{sequence}')"), [], |row| {
        row.get(0)
    })?;
    Ok(uid)
}

/// Run a query expected to match at most one row.
pub(crate) fn query_opt<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> StoreResult<Option<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> duckdb::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query_map(params, f)?;
    Ok(rows.next().transpose()?)
}

/// Run a query and collect every row.
pub(crate) fn query_all<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> StoreResult<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> duckdb::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, f)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
