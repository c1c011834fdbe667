//! DuckDB driver implementation

use crate::cancel::CancelToken;
use crate::error::{DbError, DbResult};
use crate::options::ExecuteOptions;
use crate::traits::{ConnectionContext, DriverFactory, DriverSession};
use async_trait::async_trait;
use dashmap::DashMap;
use duckdb::{Connection, InterruptHandle};
use sl_core::schema::{ColumnSchema, TableSchema};
use sl_core::{DatabaseRecord, Engine, InstanceRecord, SchemaSnapshot};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "pg_catalog"];

/// How often an interrupt is re-sent until the running statement stops.
const INTERRUPT_RETRY: Duration = Duration::from_millis(50);

/// Out-of-band controls of a live session
#[derive(Clone)]
struct SessionControl {
    terminated: CancelToken,
    interrupt: Arc<InterruptHandle>,
}

impl SessionControl {
    fn terminate(&self) {
        self.terminated.cancel();
        self.interrupt.interrupt();
    }
}

/// Opens sessions on DuckDB instances.
///
/// One root connection is kept per instance so that `:memory:` instances
/// share their database across sessions; each session gets its own clone.
#[derive(Default)]
pub struct DuckDbDriverFactory {
    roots: Mutex<HashMap<String, Connection>>,
    live: Arc<DashMap<String, SessionControl>>,
}

impl DuckDbDriverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions that have not been closed
    pub fn live_sessions(&self) -> usize {
        self.live.len()
    }

    fn open_root(data_source: &str) -> DbResult<Connection> {
        let conn = if data_source == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(Path::new(data_source))
        };
        conn.map_err(|e| DbError::ConnectionError(format!("{}: {}", data_source, e)))
    }

    fn connect(&self, instance: &InstanceRecord) -> DbResult<Connection> {
        let mut roots = self
            .roots
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
        if !roots.contains_key(&instance.resource_id) {
            let root = Self::open_root(&instance.data_source)?;
            roots.insert(instance.resource_id.clone(), root);
        }
        let root = roots
            .get(&instance.resource_id)
            .ok_or_else(|| DbError::Internal("root connection vanished".to_string()))?;
        root.try_clone()
            .map_err(|e| DbError::ConnectionError(e.to_string()))
    }
}

#[async_trait]
impl DriverFactory for DuckDbDriverFactory {
    async fn get_admin_driver(
        &self,
        instance: &InstanceRecord,
        database: Option<&DatabaseRecord>,
        _context: ConnectionContext,
    ) -> DbResult<Box<dyn DriverSession>> {
        if instance.engine != Engine::DuckDb {
            return Err(DbError::NotImplemented {
                engine: instance.engine.to_string(),
                feature: "admin driver".to_string(),
            });
        }

        let conn = self.connect(instance)?;
        let session = DuckDbSession::new(conn, Arc::clone(&self.live));
        log::debug!(
            "Opened DuckDB session {} on instance {} (database: {})",
            session.connection_id,
            instance.resource_id,
            database.map(|d| d.database_name.as_str()).unwrap_or("-")
        );
        Ok(Box::new(session))
    }

    async fn terminate_connection(&self, connection_id: &str) -> DbResult<bool> {
        match self.live.get(connection_id) {
            Some(control) => {
                control.terminate();
                log::debug!("Interrupted DuckDB session {}", connection_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// A single DuckDB connection handed out by [`DuckDbDriverFactory`]
pub struct DuckDbSession {
    connection_id: String,
    conn: Arc<Mutex<Connection>>,
    control: SessionControl,
    live: Arc<DashMap<String, SessionControl>>,
}

impl DuckDbSession {
    fn new(conn: Connection, live: Arc<DashMap<String, SessionControl>>) -> Self {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let control = SessionControl {
            terminated: CancelToken::new(),
            interrupt: conn.interrupt_handle(),
        };
        live.insert(connection_id.clone(), control.clone());
        Self {
            connection_id,
            conn: Arc::new(Mutex::new(conn)),
            control,
            live,
        }
    }

    fn canceled(&self) -> DbError {
        DbError::Canceled {
            connection_id: self.connection_id.clone(),
        }
    }

    /// Run `statement` on the blocking pool.
    ///
    /// On cancellation the statement is interrupted and awaited, so the
    /// call only returns once DuckDB has stopped working on it.
    async fn run_batch(&self, statement: &str, cancel: &CancelToken) -> DbResult<()> {
        let conn = Arc::clone(&self.conn);
        let terminated = self.control.terminated.clone();
        let canceled = self.canceled();
        let sql = statement.to_string();
        let mut task = tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
            if terminated.is_canceled() {
                return Err(canceled);
            }
            conn.execute_batch(&sql)
                .map_err(|e| DbError::ExecutionError(e.to_string()))
        });

        tokio::select! {
            joined = &mut task => return flatten_join(joined),
            _ = cancel.canceled() => {}
            _ = self.control.terminated.canceled() => {}
        }

        // An interrupt sent before DuckDB starts the statement is lost, so
        // keep sending until the blocking task finishes.
        let joined = loop {
            self.control.interrupt.interrupt();
            tokio::select! {
                joined = &mut task => break joined,
                _ = tokio::time::sleep(INTERRUPT_RETRY) => {}
            }
        };
        match flatten_join(joined) {
            Ok(()) => {
                log::warn!(
                    "Statement on DuckDB session {} completed before the interrupt took effect",
                    self.connection_id
                );
                Ok(())
            }
            Err(e) => {
                log::debug!("DuckDB session {} interrupted: {}", self.connection_id, e);
                Err(self.canceled())
            }
        }
    }
}

fn flatten_join(joined: Result<DbResult<()>, tokio::task::JoinError>) -> DbResult<()> {
    joined.unwrap_or_else(|e| Err(DbError::Internal(format!("statement task failed: {}", e))))
}

/// Dump schema synchronously
fn dump_schema_sync(conn: &Connection) -> DbResult<SchemaSnapshot> {
    let mut stmt = conn.prepare(
        "SELECT table_schema, table_name, column_name, data_type, is_nullable \
         FROM information_schema.columns \
         ORDER BY table_schema, table_name, ordinal_position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut snapshot = SchemaSnapshot::default();
    for row in rows {
        let (schema, table, column, data_type, is_nullable) = row?;
        if SYSTEM_SCHEMAS.contains(&schema.as_str()) {
            continue;
        }
        let column = ColumnSchema {
            name: column,
            data_type,
            nullable: is_nullable.eq_ignore_ascii_case("YES"),
        };
        match snapshot.tables.last_mut() {
            Some(last) if last.schema == schema && last.name == table => last.columns.push(column),
            _ => snapshot.tables.push(TableSchema {
                schema,
                name: table,
                columns: vec![column],
            }),
        }
    }
    Ok(snapshot)
}

#[async_trait]
impl DriverSession for DuckDbSession {
    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    async fn execute(
        &self,
        statement: &str,
        opts: &ExecuteOptions,
        cancel: &CancelToken,
    ) -> DbResult<()> {
        let _tracked = opts.track_connection(&self.connection_id);
        opts.log_command_execute(statement).await;

        let result = if cancel.is_canceled() || self.control.terminated.is_canceled() {
            Err(self.canceled())
        } else {
            self.run_batch(statement, cancel).await
        };

        let error = result
            .as_ref()
            .err()
            .map(ToString::to_string)
            .unwrap_or_default();
        opts.log_command_response(&error).await;
        result
    }

    async fn dump_schema(&self) -> DbResult<SchemaSnapshot> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
            dump_schema_sync(&conn)
        })
        .await
        .map_err(|e| DbError::Internal(format!("schema dump task failed: {}", e)))?
    }

    fn close(&self) {
        if self.live.remove(&self.connection_id).is_some() {
            log::debug!("Closed DuckDB session {}", self.connection_id);
        }
    }
}

impl Drop for DuckDbSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
