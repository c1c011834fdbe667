//! Error types for the execution core

use sl_core::TaskType;
use sl_db::DbError;
use sl_store::StoreError;
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug)]
pub enum RunnerError {
    /// A referenced catalog row is missing (R001)
    #[error("[R001] {entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Task payload could not be interpreted (R002)
    #[error("[R002] Invalid task payload: {0}")]
    InvalidPayload(String),

    /// Statement is empty for a type that requires one (R003)
    #[error("[R003] empty statement")]
    EmptyStatement,

    /// Store read failed while building the execution context (R004)
    #[error("[R004] {context}: {source}")]
    Resolve {
        context: String,
        source: StoreError,
    },

    /// Ledger or catalog write failed (R005)
    #[error("[R005] {context}: {source}")]
    Store {
        context: String,
        source: StoreError,
    },

    /// Schema snapshot failed (R006)
    #[error("[R006] failed to sync database metadata and schema: {0}")]
    Sync(#[source] StoreError),

    /// Driver could not be acquired or failed outside statement execution (R007)
    #[error("[R007] {context}: {source}")]
    Driver { context: String, source: DbError },

    /// The statement itself failed (R008)
    ///
    /// `statement` is the unrendered text, truncated; `message` has secrets
    /// redacted.
    #[error("[R008] Failed to execute statement {statement:?}: {message}")]
    Execution { statement: String, message: String },

    /// Execution was interrupted by a cancellation request (R009)
    #[error("[R009] Task run canceled")]
    Canceled,

    /// The executor panicked (R010)
    #[error("[R010] Task executor panicked: {0}")]
    Panic(String),

    /// No executor handles this task type (R011)
    #[error("[R011] Unsupported task type: {0}")]
    UnsupportedTask(TaskType),
}

impl RunnerError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        RunnerError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn resolve(context: impl Into<String>) -> impl FnOnce(StoreError) -> Self {
        let context = context.into();
        move |source| RunnerError::Resolve { context, source }
    }

    pub fn store(context: impl Into<String>) -> impl FnOnce(StoreError) -> Self {
        let context = context.into();
        move |source| RunnerError::Store { context, source }
    }

    /// Whether the task run should stop rather than be retried.
    ///
    /// Only store reads while resolving the context are retryable; they may
    /// be caused by store state that is not yet consistent.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunnerError::Resolve { .. })
    }
}

/// Result type alias for RunnerError
pub type RunnerResult<T> = Result<T, RunnerError>;
