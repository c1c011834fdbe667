//! Schema history snapshots.

use crate::error::{StoreError, StoreResult};
use crate::traits::Store;
use async_trait::async_trait;
use sl_core::DatabaseRecord;
use sl_db::{ConnectionContext, DriverFactory};
use std::sync::Arc;

/// Captures a database's current schema into a history record.
#[async_trait]
pub trait SchemaSyncer: Send + Sync {
    /// Snapshot `database` and return the new history uid
    async fn sync_schema_to_history(&self, database: &DatabaseRecord) -> StoreResult<i64>;
}

/// [`SchemaSyncer`] that dumps through a driver session and persists the
/// snapshot in the store.
pub struct DriverSchemaSyncer {
    store: Arc<dyn Store>,
    drivers: Arc<dyn DriverFactory>,
}

impl DriverSchemaSyncer {
    pub fn new(store: Arc<dyn Store>, drivers: Arc<dyn DriverFactory>) -> Self {
        Self { store, drivers }
    }
}

#[async_trait]
impl SchemaSyncer for DriverSchemaSyncer {
    async fn sync_schema_to_history(&self, database: &DatabaseRecord) -> StoreResult<i64> {
        let instance = self
            .store
            .get_instance(database.instance_uid)
            .await?
            .ok_or_else(|| StoreError::not_found("instance", database.instance_uid))?;

        let session = self
            .drivers
            .get_admin_driver(&instance, Some(database), ConnectionContext::default())
            .await?;
        let dumped = session.dump_schema().await;
        session.close();
        let schema = dumped?;

        let uid = self
            .store
            .create_sync_history(database.uid, &schema)
            .await?;
        log::debug!(
            "Synced schema of database {} ({} tables) to history {}",
            database.database_name,
            schema.tables.len(),
            uid
        );
        Ok(uid)
    }
}

#[cfg(test)]
#[path = "schema_sync_test.rs"]
mod tests;
