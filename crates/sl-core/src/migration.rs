//! Migration types and the immutable description of one migration.
//!
//! Behaviour that varies by migration type (whether the schema is dumped
//! around the change, whether the statement is executed at all, whether an
//! empty statement is acceptable) lives in a single capability table,
//! [`MigrationType::capabilities`], so the execution phases never branch on
//! individual types.

use crate::plan::ChangedResources;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a migration changes the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationType {
    /// Records a starting version without running SQL
    Baseline,
    /// Imperative, version-numbered schema change
    Migrate,
    /// Declarative (state-based) schema change
    MigrateSdl,
    /// Online schema change: copy phase
    GhostSync,
    /// Online schema change: table swap
    GhostCutover,
    /// DML-only change
    Data,
}

/// Per-type behaviour switches for the execution phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationCapabilities {
    /// Snapshot the schema before and after the change.
    pub needs_dump: bool,
    /// Send the statement to the driver.
    pub executes_statement: bool,
    /// An empty statement is a valid request.
    pub allows_empty_statement: bool,
}

impl MigrationType {
    pub const fn capabilities(self) -> MigrationCapabilities {
        let (needs_dump, executes_statement, allows_empty_statement) = match self {
            MigrationType::Baseline => (true, false, true),
            MigrationType::Migrate => (true, true, false),
            MigrationType::MigrateSdl => (true, true, true),
            MigrationType::GhostSync => (false, true, false),
            MigrationType::GhostCutover => (true, true, false),
            MigrationType::Data => (false, true, false),
        };
        MigrationCapabilities {
            needs_dump,
            executes_statement,
            allows_empty_statement,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationType::Baseline => "BASELINE",
            MigrationType::Migrate => "MIGRATE",
            MigrationType::MigrateSdl => "MIGRATE_SDL",
            MigrationType::GhostSync => "GHOST_SYNC",
            MigrationType::GhostCutover => "GHOST_CUTOVER",
            MigrationType::Data => "DATA",
        }
    }
}

impl fmt::Display for MigrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the migration request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationSource {
    #[default]
    Ui,
    Vcs,
    Libraries,
}

impl MigrationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationSource::Ui => "UI",
            MigrationSource::Vcs => "VCS",
            MigrationSource::Libraries => "LIBRARIES",
        }
    }
}

/// Data carried alongside a migration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPayload {
    /// Resources touched by the statement, taken from a plan-check report.
    #[serde(default)]
    pub changed_resources: Option<ChangedResources>,
}

/// Immutable description of what is being applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub instance_uid: i64,
    pub database_uid: i64,
    pub project_uid: Option<i64>,
    pub issue_uid: Option<i64>,
    pub release_version: String,
    pub migration_type: MigrationType,
    pub source: MigrationSource,
    pub description: String,
    pub environment: String,
    pub database: String,
    pub namespace: String,
    pub payload: MigrationPayload,
}

impl MigrationInfo {
    pub fn capabilities(&self) -> MigrationCapabilities {
        self.migration_type.capabilities()
    }

    /// Whether the statement should actually be sent to the database.
    ///
    /// Baseline records intent only, even when a statement was supplied.
    pub fn executes(&self, statement: &str) -> bool {
        !statement.is_empty() && self.capabilities().executes_statement
    }
}
