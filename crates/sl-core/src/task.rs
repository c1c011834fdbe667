//! Tasks, their payloads, and the results of running them.

use crate::changelog::ChangelogType;
use crate::error::{CoreError, CoreResult};
use crate::migration::MigrationType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    General,
    DatabaseCreate,
    DatabaseSchemaBaseline,
    DatabaseSchemaUpdate,
    DatabaseSchemaUpdateSdl,
    DatabaseSchemaUpdateGhostSync,
    DatabaseSchemaUpdateGhostCutover,
    DatabaseDataUpdate,
    DatabaseDataExport,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::General => "general",
            TaskType::DatabaseCreate => "database_create",
            TaskType::DatabaseSchemaBaseline => "database_schema_baseline",
            TaskType::DatabaseSchemaUpdate => "database_schema_update",
            TaskType::DatabaseSchemaUpdateSdl => "database_schema_update_sdl",
            TaskType::DatabaseSchemaUpdateGhostSync => "database_schema_update_ghost_sync",
            TaskType::DatabaseSchemaUpdateGhostCutover => "database_schema_update_ghost_cutover",
            TaskType::DatabaseDataUpdate => "database_data_update",
            TaskType::DatabaseDataExport => "database_data_export",
        }
    }

    /// The migration this task applies, or `None` for tasks that do not run
    /// through the migration protocol.
    pub fn migration_type(&self) -> Option<MigrationType> {
        match self {
            TaskType::DatabaseSchemaBaseline => Some(MigrationType::Baseline),
            TaskType::DatabaseSchemaUpdate => Some(MigrationType::Migrate),
            TaskType::DatabaseSchemaUpdateSdl => Some(MigrationType::MigrateSdl),
            TaskType::DatabaseSchemaUpdateGhostSync => Some(MigrationType::GhostSync),
            TaskType::DatabaseSchemaUpdateGhostCutover => Some(MigrationType::GhostCutover),
            TaskType::DatabaseDataUpdate => Some(MigrationType::Data),
            TaskType::General | TaskType::DatabaseCreate | TaskType::DatabaseDataExport => None,
        }
    }

    /// Tag recorded on the changelog row for tasks of this kind.
    pub fn changelog_type(&self) -> ChangelogType {
        match self {
            TaskType::DatabaseDataUpdate => ChangelogType::Data,
            TaskType::DatabaseSchemaBaseline => ChangelogType::Baseline,
            TaskType::DatabaseSchemaUpdate => ChangelogType::Migrate,
            TaskType::DatabaseSchemaUpdateSdl => ChangelogType::MigrateSdl,
            TaskType::DatabaseSchemaUpdateGhostSync | TaskType::DatabaseSchemaUpdateGhostCutover => {
                ChangelogType::MigrateGhost
            }
            TaskType::General | TaskType::DatabaseCreate | TaskType::DatabaseDataExport => {
                ChangelogType::Unspecified
            }
        }
    }

    /// Whether the task payload is a [`DatabaseUpdatePayload`].
    pub fn has_database_update_payload(&self) -> bool {
        self.migration_type().is_some()
    }

    /// Whether command-level progress is persisted as task-run logs.
    pub fn records_task_run_log(&self) -> bool {
        matches!(
            self,
            TaskType::DatabaseSchemaUpdate | TaskType::DatabaseDataUpdate
        )
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let all = [
            TaskType::General,
            TaskType::DatabaseCreate,
            TaskType::DatabaseSchemaBaseline,
            TaskType::DatabaseSchemaUpdate,
            TaskType::DatabaseSchemaUpdateSdl,
            TaskType::DatabaseSchemaUpdateGhostSync,
            TaskType::DatabaseSchemaUpdateGhostCutover,
            TaskType::DatabaseDataUpdate,
            TaskType::DatabaseDataExport,
        ];
        all.into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTag {
                kind: "task type",
                value: s.to_string(),
            })
    }
}

/// A scheduled unit of work against one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub uid: i64,
    pub pipeline_uid: i64,
    pub stage_id: i64,
    pub instance_uid: i64,
    /// `None` for instance-scoped tasks.
    pub database_uid: Option<i64>,
    pub name: String,
    pub task_type: TaskType,
    /// Raw JSON payload; its shape depends on `task_type`.
    pub payload: String,
}

impl TaskRecord {
    /// Decode the payload of a migration-bearing task.
    pub fn database_update_payload(&self) -> CoreResult<DatabaseUpdatePayload> {
        if self.payload.trim().is_empty() {
            return Ok(DatabaseUpdatePayload::default());
        }
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Payload of schema/data update tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseUpdatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<i64>,

    /// Target schema version; empty disables version tracking.
    #[serde(default)]
    pub schema_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_release_source: Option<TaskReleaseSource>,
}

/// Release file a task was generated from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReleaseSource {
    /// Format: `projects/{project}/releases/{release}/files/{file}`
    #[serde(default)]
    pub file: String,
}

/// Lifecycle of one task run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskRunStatus {
    /// Waiting to be (re)tried
    Pending,
    Running,
    Done,
    Failed,
    Canceled,
}

impl TaskRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskRunStatus::Pending => "PENDING",
            TaskRunStatus::Running => "RUNNING",
            TaskRunStatus::Done => "DONE",
            TaskRunStatus::Failed => "FAILED",
            TaskRunStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for TaskRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskRunStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "PENDING" => Ok(TaskRunStatus::Pending),
            "RUNNING" => Ok(TaskRunStatus::Running),
            "DONE" => Ok(TaskRunStatus::Done),
            "FAILED" => Ok(TaskRunStatus::Failed),
            "CANCELED" => Ok(TaskRunStatus::Canceled),
            other => Err(CoreError::UnknownTag {
                kind: "task run status",
                value: other.to_string(),
            }),
        }
    }
}

/// Human-facing result of a finished task run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunResult {
    pub detail: String,

    /// Changelog resource name; empty when nothing was recorded.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub changelog: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// A persisted task run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunRecord {
    pub uid: i64,
    pub task_uid: i64,
    pub status: TaskRunStatus,
    pub result: Option<TaskRunResult>,
    pub error: Option<String>,
}

#[cfg(test)]
#[path = "task_test.rs"]
mod tests;
