//! Progress entries persisted while a task run executes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskRunLog {
    DatabaseSyncStart,
    DatabaseSyncEnd {
        /// Empty on success
        #[serde(default)]
        error: String,
    },
    CommandExecute {
        /// Statement as sent, truncated and with secrets redacted
        statement: String,
    },
    CommandResponse {
        /// Empty on success
        #[serde(default)]
        error: String,
    },
}

/// A persisted progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunLogRecord {
    pub task_run_uid: i64,
    pub created_at: DateTime<Utc>,
    pub deploy_id: String,
    pub entry: TaskRunLog,
}
