//! Per-execution hooks handed to a driver session.
//!
//! The caller decides what happens when a session announces its connection
//! id (so the connection can be terminated out-of-band) and where progress
//! events go. Drivers only call the hooks.

use crate::error::DbResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sl_core::TaskRunLog;
use std::sync::Arc;

/// Receives the live connection id of an executing session.
pub trait ConnectionTracker: Send + Sync {
    fn set_connection_id(&self, connection_id: &str);
    fn delete_connection_id(&self);
}

/// Persists progress events of a task run.
#[async_trait]
pub trait TaskRunLogger: Send + Sync {
    async fn create_task_run_log(&self, at: DateTime<Utc>, entry: TaskRunLog) -> DbResult<()>;
}

/// Hooks recognised by [`crate::DriverSession::execute`].
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    pub connection_tracker: Option<Arc<dyn ConnectionTracker>>,
    pub task_run_logger: Option<Arc<dyn TaskRunLogger>>,
}

impl std::fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("connection_tracker", &self.connection_tracker.is_some())
            .field("task_run_logger", &self.task_run_logger.is_some())
            .finish()
    }
}

impl ExecuteOptions {
    /// Announce `connection_id` and return a guard that withdraws it when
    /// dropped, including on unwind or when the execution future is dropped.
    pub fn track_connection(&self, connection_id: &str) -> TrackedConnection {
        if let Some(tracker) = &self.connection_tracker {
            tracker.set_connection_id(connection_id);
        }
        TrackedConnection {
            tracker: self.connection_tracker.clone(),
        }
    }

    pub async fn log_database_sync_start(&self) {
        self.log(TaskRunLog::DatabaseSyncStart).await;
    }

    pub async fn log_database_sync_end(&self, error: &str) {
        self.log(TaskRunLog::DatabaseSyncEnd {
            error: error.to_string(),
        })
        .await;
    }

    /// The statement is passed through whole; the logger owns redaction
    /// and any size limit.
    pub async fn log_command_execute(&self, statement: &str) {
        self.log(TaskRunLog::CommandExecute {
            statement: statement.to_string(),
        })
        .await;
    }

    pub async fn log_command_response(&self, error: &str) {
        self.log(TaskRunLog::CommandResponse {
            error: error.to_string(),
        })
        .await;
    }

    async fn log(&self, entry: TaskRunLog) {
        let Some(logger) = &self.task_run_logger else {
            return;
        };
        if let Err(e) = logger.create_task_run_log(Utc::now(), entry).await {
            log::warn!("Failed to create task run log: {}", e);
        }
    }
}

/// Guard returned by [`ExecuteOptions::track_connection`].
pub struct TrackedConnection {
    tracker: Option<Arc<dyn ConnectionTracker>>,
}

impl Drop for TrackedConnection {
    fn drop(&mut self) {
        if let Some(tracker) = &self.tracker {
            tracker.delete_connection_id();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTracker {
        current: Mutex<Option<String>>,
    }

    impl ConnectionTracker for RecordingTracker {
        fn set_connection_id(&self, connection_id: &str) {
            *self.current.lock().unwrap() = Some(connection_id.to_string());
        }

        fn delete_connection_id(&self) {
            *self.current.lock().unwrap() = None;
        }
    }

    #[test]
    fn test_tracked_connection_clears_on_drop() {
        let tracker = Arc::new(RecordingTracker::default());
        let opts = ExecuteOptions {
            connection_tracker: Some(tracker.clone()),
            task_run_logger: None,
        };

        {
            let _guard = opts.track_connection("conn-1");
            assert_eq!(tracker.current.lock().unwrap().as_deref(), Some("conn-1"));
        }
        assert!(tracker.current.lock().unwrap().is_none());
    }

    #[test]
    fn test_tracked_connection_clears_on_panic() {
        let tracker = Arc::new(RecordingTracker::default());
        let opts = ExecuteOptions {
            connection_tracker: Some(tracker.clone()),
            task_run_logger: None,
        };

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = opts.track_connection("conn-2");
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(tracker.current.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logging_without_logger_is_noop() {
        let opts = ExecuteOptions::default();
        opts.log_database_sync_start().await;
        opts.log_command_response("").await;
    }
}
