//! Store trait definition

use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sl_core::{
    AnomalyType, ChangelogRecord, CreateChangelog, CreateRevision, DatabaseRecord,
    EnvironmentRecord, InstanceRecord, IssueRecord, PipelineRecord, PlanCheckRun,
    PlanCheckRunStatus, PlanCheckRunType, PlanRecord, ProjectRecord, RevisionRecord,
    SchemaSnapshot, SheetRecord, TaskRunLog, TaskRunRecord, TaskRunResult, TaskRunStatus,
    UpdateChangelog,
};

/// Filter for [`Store::list_plans`]
#[derive(Debug, Clone, Default)]
pub struct FindPlan {
    pub pipeline_uid: Option<i64>,
}

/// Filter for [`Store::list_plan_check_runs`]
#[derive(Debug, Clone, Default)]
pub struct FindPlanCheckRun {
    pub plan_uid: i64,
    /// Only these run types, when set
    pub types: Option<Vec<PlanCheckRunType>>,
    /// Only these statuses, when set
    pub statuses: Option<Vec<PlanCheckRunStatus>>,
}

/// Filter for [`Store::get_issue`]
#[derive(Debug, Clone, Default)]
pub struct FindIssue {
    pub uid: Option<i64>,
    pub pipeline_uid: Option<i64>,
}

/// Filter for [`Store::list_revisions`]
#[derive(Debug, Clone, Default)]
pub struct FindRevision {
    pub database_uid: i64,
    pub version: Option<String>,
}

/// Status change for a task run
#[derive(Debug, Clone)]
pub struct UpdateTaskRun {
    pub uid: i64,
    pub status: TaskRunStatus,
    pub result: Option<TaskRunResult>,
    pub error: Option<String>,
}

/// Persistence consumed by the execution core.
///
/// Lookups return `Ok(None)` for missing rows; callers decide whether that
/// is an error. Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_instance(&self, uid: i64) -> StoreResult<Option<InstanceRecord>>;

    async fn get_database(&self, uid: i64) -> StoreResult<Option<DatabaseRecord>>;

    async fn get_environment(&self, resource_id: &str) -> StoreResult<Option<EnvironmentRecord>>;

    async fn get_project(&self, resource_id: &str) -> StoreResult<Option<ProjectRecord>>;

    async fn get_pipeline(&self, uid: i64) -> StoreResult<Option<PipelineRecord>>;

    async fn get_sheet(&self, uid: i64) -> StoreResult<Option<SheetRecord>>;

    async fn list_plans(&self, find: &FindPlan) -> StoreResult<Vec<PlanRecord>>;

    /// Plan-check runs ordered by uid ascending
    async fn list_plan_check_runs(&self, find: &FindPlanCheckRun)
        -> StoreResult<Vec<PlanCheckRun>>;

    async fn get_issue(&self, find: &FindIssue) -> StoreResult<Option<IssueRecord>>;

    async fn list_revisions(&self, find: &FindRevision) -> StoreResult<Vec<RevisionRecord>>;

    /// Fails with `Conflict` when (database, version) already has a revision
    async fn create_revision(&self, create: &CreateRevision) -> StoreResult<RevisionRecord>;

    /// Insert a `Pending` changelog and return its uid
    async fn create_changelog(&self, create: &CreateChangelog) -> StoreResult<i64>;

    /// Move a `Pending` changelog to its terminal state.
    ///
    /// Fails with `Conflict` when the row is no longer pending.
    async fn update_changelog(&self, update: &UpdateChangelog) -> StoreResult<()>;

    async fn get_changelog(&self, uid: i64) -> StoreResult<Option<ChangelogRecord>>;

    /// Returns whether an anomaly was removed
    async fn delete_anomaly(&self, database_uid: i64, anomaly: AnomalyType) -> StoreResult<bool>;

    async fn create_task_run_log(
        &self,
        task_run_uid: i64,
        at: DateTime<Utc>,
        deploy_id: &str,
        entry: &TaskRunLog,
    ) -> StoreResult<()>;

    /// Persist a schema snapshot and return its history uid
    async fn create_sync_history(
        &self,
        database_uid: i64,
        schema: &SchemaSnapshot,
    ) -> StoreResult<i64>;

    async fn create_task_run(&self, task_uid: i64) -> StoreResult<TaskRunRecord>;

    async fn update_task_run(&self, update: &UpdateTaskRun) -> StoreResult<()>;
}
