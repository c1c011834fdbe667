//! Error types for sl-db

use thiserror::Error;

/// Driver errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Statement execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Execution interrupted by a cancellation request (D003)
    #[error("[D003] Execution canceled on connection {connection_id}")]
    Canceled { connection_id: String },

    /// Not implemented (D004)
    #[error("[D004] Feature not implemented for {engine}: {feature}")]
    NotImplemented { engine: String, feature: String },

    /// Mutex poisoned (D005)
    #[error("[D005] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Internal error (D006)
    #[error("[D006] Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, DbError::Canceled { .. })
    }
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::ExecutionError(err.to_string())
    }
}
