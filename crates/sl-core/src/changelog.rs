//! Changelog: the audit record of one migration attempt.
//!
//! A changelog is created `Pending` before anything touches the target
//! database and moves to `Done` or `Failed` exactly once afterwards. A row
//! left `Pending` means the runner died mid-migration.

use crate::error::{CoreError, CoreResult};
use crate::plan::ChangedResources;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// State of a changelog row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangelogStatus {
    Pending,
    Done,
    Failed,
}

impl ChangelogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangelogStatus::Pending => "PENDING",
            ChangelogStatus::Done => "DONE",
            ChangelogStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChangelogStatus::Pending)
    }
}

impl fmt::Display for ChangelogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangelogStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "PENDING" => Ok(ChangelogStatus::Pending),
            "DONE" => Ok(ChangelogStatus::Done),
            "FAILED" => Ok(ChangelogStatus::Failed),
            other => Err(CoreError::UnknownTag {
                kind: "changelog status",
                value: other.to_string(),
            }),
        }
    }
}

/// Change kind recorded on the changelog, derived from the task type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangelogType {
    #[default]
    Unspecified,
    Baseline,
    Migrate,
    MigrateSdl,
    MigrateGhost,
    Data,
}

impl ChangelogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangelogType::Unspecified => "UNSPECIFIED",
            ChangelogType::Baseline => "BASELINE",
            ChangelogType::Migrate => "MIGRATE",
            ChangelogType::MigrateSdl => "MIGRATE_SDL",
            ChangelogType::MigrateGhost => "MIGRATE_GHOST",
            ChangelogType::Data => "DATA",
        }
    }
}

/// Snapshot of what an attempt was about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogPayload {
    /// Task run resource name
    #[serde(default)]
    pub task_run: String,

    /// Issue resource name; empty when the pipeline has no issue
    #[serde(default)]
    pub issue: String,

    /// Revision uid created on success; 0 until then
    #[serde(default)]
    pub revision: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_resources: Option<ChangedResources>,

    /// Sheet resource name; empty for sheet-less runs
    #[serde(default)]
    pub sheet: String,

    #[serde(default)]
    pub version: String,

    #[serde(rename = "type", default)]
    pub change_type: ChangelogType,
}

/// Insert request for a new pending changelog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateChangelog {
    pub database_uid: i64,
    pub prev_sync_history_uid: Option<i64>,
    pub payload: ChangelogPayload,
}

/// Terminal transition of a pending changelog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateChangelog {
    pub uid: i64,
    pub status: ChangelogStatus,
    pub sync_history_uid: Option<i64>,
    pub revision_uid: Option<i64>,
}

/// A persisted changelog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogRecord {
    pub uid: i64,
    pub database_uid: i64,
    pub status: ChangelogStatus,
    pub prev_sync_history_uid: Option<i64>,
    pub sync_history_uid: Option<i64>,
    pub revision_uid: Option<i64>,
    pub payload: ChangelogPayload,
}
