//! sl-core - Core library for Sluice
//!
//! This crate provides the shared domain types used across all Sluice
//! components: catalog records, migration types and their capabilities, the
//! changelog and revision contracts, resource names, statement rendering and
//! the `sluice.yml` configuration.

pub mod catalog;
pub mod changelog;
pub mod checksum;
pub mod config;
pub mod error;
pub mod migration;
pub mod plan;
pub mod resource_name;
pub mod revision;
pub mod schema;
pub mod statement;
pub mod task;
pub mod task_run_log;

pub use catalog::{
    AnomalyType, DatabaseRecord, Engine, EnvironmentRecord, InstanceRecord, IssueRecord,
    PipelineRecord, ProjectRecord, SheetRecord,
};
pub use changelog::{
    ChangelogPayload, ChangelogRecord, ChangelogStatus, ChangelogType, CreateChangelog,
    UpdateChangelog,
};
pub use config::{Config, Profile};
pub use error::{CoreError, CoreResult};
pub use migration::{
    MigrationCapabilities, MigrationInfo, MigrationPayload, MigrationSource, MigrationType,
};
pub use plan::{
    ChangedResources, PlanCheckRun, PlanCheckRunStatus, PlanCheckRunType, PlanRecord,
};
pub use revision::{CreateRevision, RevisionPayload, RevisionRecord};
pub use schema::{SchemaSnapshot, SyncHistoryRecord};
pub use task::{
    DatabaseUpdatePayload, TaskRecord, TaskRunRecord, TaskRunResult, TaskRunStatus, TaskType,
};
pub use task_run_log::{TaskRunLog, TaskRunLogRecord};
