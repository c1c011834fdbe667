//! Driver trait definitions

use crate::cancel::CancelToken;
use crate::error::DbResult;
use crate::options::ExecuteOptions;
use async_trait::async_trait;
use sl_core::{DatabaseRecord, InstanceRecord, SchemaSnapshot};

/// How a driver should authenticate against the target database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionContext {
    /// Connect as the database owner rather than the instance admin
    pub use_database_owner: bool,
}

/// An open administrative connection to one instance or database.
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait DriverSession: Send + Sync {
    /// Identifier that [`DriverFactory::terminate_connection`] accepts
    fn connection_id(&self) -> &str;

    /// Execute a (possibly multi-statement) script.
    ///
    /// Returns [`crate::DbError::Canceled`] if `cancel` fires or the
    /// connection is terminated before the script completes.
    async fn execute(
        &self,
        statement: &str,
        opts: &ExecuteOptions,
        cancel: &CancelToken,
    ) -> DbResult<()>;

    /// Dump the current schema of the connected database
    async fn dump_schema(&self) -> DbResult<SchemaSnapshot>;

    /// Release the connection. Idempotent; also performed on drop.
    fn close(&self);
}

/// Opens driver sessions and interrupts running ones.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Open an admin session on `instance`, scoped to `database` when given
    async fn get_admin_driver(
        &self,
        instance: &InstanceRecord,
        database: Option<&DatabaseRecord>,
        context: ConnectionContext,
    ) -> DbResult<Box<dyn DriverSession>>;

    /// Interrupt the statement running on `connection_id`.
    ///
    /// Returns false when no live session has that id.
    async fn terminate_connection(&self, connection_id: &str) -> DbResult<bool>;
}
