//! Catalog records: the instances, databases and workflow objects a task
//! refers to.
//!
//! These are plain snapshots read from the store. They carry no behaviour
//! beyond a few derived accessors.

use crate::checksum::sha256_hex;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Database engine of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// DuckDB (the engine with a bundled driver)
    #[default]
    DuckDb,
    /// PostgreSQL
    Postgres,
    /// MySQL
    MySql,
    /// Microsoft SQL Server
    MsSql,
    /// Oracle
    Oracle,
    /// Snowflake
    Snowflake,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::DuckDb => "duckdb",
            Engine::Postgres => "postgres",
            Engine::MySql => "mysql",
            Engine::MsSql => "mssql",
            Engine::Oracle => "oracle",
            Engine::Snowflake => "snowflake",
        }
    }

    /// Whether drivers for this engine report per-command progress that is
    /// worth persisting as task-run logs.
    pub fn supports_task_run_log(&self) -> bool {
        !matches!(self, Engine::Snowflake)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "duckdb" => Ok(Engine::DuckDb),
            "postgres" => Ok(Engine::Postgres),
            "mysql" => Ok(Engine::MySql),
            "mssql" => Ok(Engine::MsSql),
            "oracle" => Ok(Engine::Oracle),
            "snowflake" => Ok(Engine::Snowflake),
            other => Err(CoreError::UnknownTag {
                kind: "engine",
                value: other.to_string(),
            }),
        }
    }
}

/// Deployment environment (e.g. test, prod)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub resource_id: String,
    pub title: String,
}

/// Project owning databases, sheets and pipelines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub uid: i64,
    pub resource_id: String,
    pub title: String,
    /// Connect to Postgres databases as the database owner instead of the
    /// instance admin.
    pub postgres_database_tenant_mode: bool,
}

/// A database server registered with Sluice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub uid: i64,
    pub resource_id: String,
    pub engine: Engine,
    /// Connection target; a file path (or `:memory:`) for DuckDB.
    pub data_source: String,
    pub environment_id: Option<String>,
}

/// A logical database on an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub uid: i64,
    pub instance_uid: i64,
    pub instance_id: String,
    pub project_id: String,
    /// Explicit environment override; falls back to the instance environment.
    pub environment_id: Option<String>,
    pub database_name: String,
    /// Secret material substituted into `${{ secrets.NAME }}` placeholders.
    pub secrets: BTreeMap<String, String>,
}

impl DatabaseRecord {
    /// The environment this database effectively belongs to.
    pub fn effective_environment_id<'a>(&'a self, instance: &'a InstanceRecord) -> Option<&'a str> {
        self.environment_id
            .as_deref()
            .or(instance.environment_id.as_deref())
    }
}

/// A rollout: the ordered stages and tasks produced from a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub uid: i64,
    pub project_id: String,
    pub name: String,
}

/// Stored SQL content referenced by tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRecord {
    pub uid: i64,
    pub project_id: String,
    pub title: String,
    pub statement: String,
}

impl SheetRecord {
    /// Hex-encoded SHA-256 of the sheet content.
    pub fn sha256_hex(&self) -> String {
        sha256_hex(&self.statement)
    }
}

/// Issue wrapping a pipeline for review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub uid: i64,
    pub project_uid: i64,
    pub project_id: String,
    pub pipeline_uid: Option<i64>,
    pub title: String,
}

/// Anomaly kinds recorded against a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    /// Live schema differs from the latest recorded schema
    DatabaseSchemaDrift,
    /// Database could not be reached
    DatabaseConnection,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::DatabaseSchemaDrift => "DATABASE_SCHEMA_DRIFT",
            AnomalyType::DatabaseConnection => "DATABASE_CONNECTION",
        }
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
