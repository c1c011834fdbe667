//! Plans and plan-check runs.
//!
//! Only the pieces the executor reads are modelled: the statement summary
//! report and the set of resources it says a statement changes.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A change plan that produced a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub uid: i64,
    pub project_id: String,
    pub pipeline_uid: Option<i64>,
    pub name: String,
}

/// Kind of plan check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanCheckRunType {
    DatabaseStatementAdvise,
    DatabaseStatementSummaryReport,
    DatabaseConnect,
}

impl PlanCheckRunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanCheckRunType::DatabaseStatementAdvise => "DATABASE_STATEMENT_ADVISE",
            PlanCheckRunType::DatabaseStatementSummaryReport => {
                "DATABASE_STATEMENT_SUMMARY_REPORT"
            }
            PlanCheckRunType::DatabaseConnect => "DATABASE_CONNECT",
        }
    }
}

impl FromStr for PlanCheckRunType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "DATABASE_STATEMENT_ADVISE" => Ok(PlanCheckRunType::DatabaseStatementAdvise),
            "DATABASE_STATEMENT_SUMMARY_REPORT" => {
                Ok(PlanCheckRunType::DatabaseStatementSummaryReport)
            }
            "DATABASE_CONNECT" => Ok(PlanCheckRunType::DatabaseConnect),
            other => Err(CoreError::UnknownTag {
                kind: "plan check run type",
                value: other.to_string(),
            }),
        }
    }
}

/// Status of a plan-check run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanCheckRunStatus {
    Running,
    Done,
    Failed,
    Canceled,
}

impl PlanCheckRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanCheckRunStatus::Running => "RUNNING",
            PlanCheckRunStatus::Done => "DONE",
            PlanCheckRunStatus::Failed => "FAILED",
            PlanCheckRunStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for PlanCheckRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanCheckRunStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "RUNNING" => Ok(PlanCheckRunStatus::Running),
            "DONE" => Ok(PlanCheckRunStatus::Done),
            "FAILED" => Ok(PlanCheckRunStatus::Failed),
            "CANCELED" => Ok(PlanCheckRunStatus::Canceled),
            other => Err(CoreError::UnknownTag {
                kind: "plan check run status",
                value: other.to_string(),
            }),
        }
    }
}

/// What a plan check was run against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCheckRunConfig {
    pub instance_uid: i64,
    pub database_name: String,
    #[serde(default)]
    pub sheet_uid: i64,
}

/// Outcome of a single check inside a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckResultStatus {
    #[default]
    StatusUnspecified,
    Error,
    Warning,
    Success,
}

/// Results of a plan-check run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCheckRunResult {
    #[serde(default)]
    pub results: Vec<CheckResult>,
}

/// One reported finding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    #[serde(default)]
    pub status: CheckResultStatus,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_summary_report: Option<SqlSummaryReport>,
}

/// Static summary of a statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlSummaryReport {
    #[serde(default)]
    pub statement_types: Vec<String>,
    #[serde(default)]
    pub affected_rows: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_resources: Option<ChangedResources>,
}

/// Resources a statement touches, grouped database > schema > table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedResources {
    #[serde(default)]
    pub databases: Vec<ChangedDatabase>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedDatabase {
    pub name: String,
    #[serde(default)]
    pub schemas: Vec<ChangedSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedSchema {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<ChangedTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedTable {
    pub name: String,
}

/// A plan-check run row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCheckRun {
    pub uid: i64,
    pub plan_uid: i64,
    pub run_type: PlanCheckRunType,
    pub status: PlanCheckRunStatus,
    pub config: PlanCheckRunConfig,
    pub result: Option<PlanCheckRunResult>,
}

impl PlanCheckRun {
    /// Whether this run checked the given instance/database (and sheet, when
    /// one is given).
    pub fn targets(&self, instance_uid: i64, database_name: &str, sheet_uid: Option<i64>) -> bool {
        self.config.instance_uid == instance_uid
            && self.config.database_name == database_name
            && sheet_uid.map_or(true, |uid| self.config.sheet_uid == uid)
    }

    /// The summary report of the first successful result, if any.
    ///
    /// The report may itself carry no changed resources; that still counts as
    /// found.
    pub fn successful_summary(&self) -> Option<&SqlSummaryReport> {
        self.result
            .as_ref()?
            .results
            .iter()
            .filter(|r| r.status == CheckResultStatus::Success)
            .find_map(|r| r.sql_summary_report.as_ref())
    }
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;
