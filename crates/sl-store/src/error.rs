//! Error types for the metadata store.

use sl_core::CoreError;
use thiserror::Error;

/// Metadata store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open or create the store (S001).
    #[error("[S001] Store connection failed: {0}")]
    ConnectionError(String),

    /// Schema migration failed (S002).
    #[error("[S002] Store migration failed: {0}")]
    MigrationError(String),

    /// SQL execution error inside the store (S003).
    #[error("[S003] Store query failed: {0}")]
    QueryError(String),

    /// A referenced row does not exist (S004).
    #[error("[S004] {entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A write would violate a uniqueness or state rule (S005).
    #[error("[S005] Store conflict: {0}")]
    Conflict(String),

    /// Store mutex poisoned (S006).
    #[error("[S006] Store mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Stored JSON column could not be (de)serialized (S007).
    #[error("[S007] Store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stored value failed domain validation (S008).
    #[error("[S008] Invalid stored value: {0}")]
    Core(#[from] CoreError),

    /// Schema dump failed while syncing history (S009).
    #[error("[S009] Schema sync failed: {0}")]
    Sync(#[from] sl_db::DbError),

    /// DuckDB driver error with preserved source chain (S010).
    #[error("[S010] DuckDB error")]
    DuckDb(#[source] duckdb::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

/// Result type alias for [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("Duplicate key") || message.contains("violates unique constraint") {
            StoreError::Conflict(message)
        } else {
            StoreError::DuckDb(err)
        }
    }
}
