//! Building the execution context of one migration attempt.
//!
//! [`MigrationContextResolver::resolve`] gathers instance, database, sheet,
//! pipeline, issue and plan-check data for a task into a [`MigrationInfo`]
//! and a [`MigrationExecutionContext`]. Both are built fresh per attempt.

use crate::error::{RunnerError, RunnerResult};
use sl_core::resource_name::{
    format_issue, format_release, format_sheet, format_task_run, parse_release_file,
};
use sl_core::{
    DatabaseRecord, Engine, InstanceRecord, MigrationInfo, MigrationPayload, MigrationSource,
    MigrationType, PlanCheckRunStatus, PlanCheckRunType, Profile, SheetRecord, TaskRecord,
};
use sl_store::{FindIssue, FindPlan, FindPlanCheckRun, Store};
use std::sync::Arc;

/// Release provenance recorded on the revision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseProvenance {
    /// Format: `projects/{project}/releases/{release}`
    pub release: String,
    /// Format: `projects/{project}/releases/{release}/files/{file}`
    pub file: String,
}

/// Per-attempt state threaded through the begin/run/end phases.
///
/// The changelog uid is not part of it: BEGIN returns it and END takes it.
#[derive(Debug, Clone)]
pub struct MigrationExecutionContext {
    pub instance: InstanceRecord,
    pub database: DatabaseRecord,
    /// `None` for baseline tasks without content
    pub sheet: Option<SheetRecord>,
    /// Empty when there is no sheet
    pub sheet_name: String,
    pub task: TaskRecord,
    pub task_run_uid: i64,
    pub task_run_name: String,
    /// Empty when the pipeline has no issue
    pub issue_name: String,
    /// Empty means the attempt is not version-tracked
    pub version: String,
    pub release: ReleaseProvenance,
    /// Trimmed statement
    pub statement: String,
    /// Connect as the database owner (Postgres tenant mode)
    pub use_database_owner: bool,
}

/// What to resolve
#[derive(Debug, Clone)]
pub struct MigrationRequest<'a> {
    pub task: &'a TaskRecord,
    pub task_run_uid: i64,
    pub migration_type: MigrationType,
    pub statement: &'a str,
    pub schema_version: &'a str,
    pub sheet_uid: Option<i64>,
}

pub struct MigrationContextResolver {
    store: Arc<dyn Store>,
    profile: Profile,
}

impl MigrationContextResolver {
    pub fn new(store: Arc<dyn Store>, profile: Profile) -> Self {
        Self { store, profile }
    }

    pub async fn resolve(
        &self,
        req: &MigrationRequest<'_>,
    ) -> RunnerResult<(MigrationInfo, MigrationExecutionContext)> {
        let task = req.task;

        let instance = self
            .store
            .get_instance(task.instance_uid)
            .await
            .map_err(RunnerError::resolve("failed to get instance"))?
            .ok_or_else(|| RunnerError::not_found("instance", task.instance_uid))?;

        let database_uid = task
            .database_uid
            .ok_or_else(|| RunnerError::not_found("database", format!("task {}", task.uid)))?;
        let database = self
            .store
            .get_database(database_uid)
            .await
            .map_err(RunnerError::resolve("failed to get database"))?
            .ok_or_else(|| RunnerError::not_found("database", database_uid))?;

        let environment_id = database
            .effective_environment_id(&instance)
            .ok_or_else(|| {
                RunnerError::not_found("environment", format!("database {}", database.uid))
            })?
            .to_string();
        let environment = self
            .store
            .get_environment(&environment_id)
            .await
            .map_err(RunnerError::resolve("failed to get environment"))?
            .ok_or_else(|| RunnerError::not_found("environment", &environment_id))?;

        let mut info = MigrationInfo {
            instance_uid: instance.uid,
            database_uid: database.uid,
            project_uid: None,
            issue_uid: None,
            release_version: self.profile.release_version.clone(),
            migration_type: req.migration_type,
            source: MigrationSource::Ui,
            description: task.name.clone(),
            environment: environment.resource_id,
            database: database.database_name.clone(),
            namespace: database.database_name.clone(),
            payload: MigrationPayload::default(),
        };

        let pipeline = self
            .store
            .get_pipeline(task.pipeline_uid)
            .await
            .map_err(RunnerError::resolve("failed to get pipeline"))?
            .ok_or_else(|| RunnerError::not_found("pipeline", task.pipeline_uid))?;

        let (sheet, sheet_name) = match req.sheet_uid {
            Some(sheet_uid) => {
                let sheet = self
                    .store
                    .get_sheet(sheet_uid)
                    .await
                    .map_err(RunnerError::resolve("failed to get sheet"))?
                    .ok_or_else(|| RunnerError::not_found("sheet", sheet_uid))?;
                (Some(sheet), format_sheet(&pipeline.project_id, sheet_uid))
            }
            None if req.migration_type == MigrationType::Baseline => (None, String::new()),
            None => {
                return Err(RunnerError::InvalidPayload(format!(
                    "{} task {} has no sheet",
                    req.migration_type, task.uid
                )))
            }
        };

        let mut release = ReleaseProvenance::default();
        if task.task_type.has_database_update_payload() {
            let payload = task.database_update_payload().map_err(|e| {
                RunnerError::InvalidPayload(format!("failed to unmarshal task payload: {e}"))
            })?;
            if let Some(file) = payload
                .task_release_source
                .map(|s| s.file)
                .filter(|f| !f.is_empty())
            {
                let parsed = parse_release_file(&file).map_err(|e| {
                    RunnerError::InvalidPayload(format!("failed to parse file {file}: {e}"))
                })?;
                release.release = format_release(&parsed.project_id, &parsed.release_id);
                release.file = file;
            }
        }

        info.payload.changed_resources = self.changed_resources(req, &database).await?;

        let mut issue_name = String::new();
        match self
            .store
            .get_issue(&FindIssue {
                pipeline_uid: Some(task.pipeline_uid),
                ..Default::default()
            })
            .await
        {
            Ok(Some(issue)) => {
                info.description = format!("{} - {}", issue.title, task.name);
                info.project_uid = Some(issue.project_uid);
                info.issue_uid = Some(issue.uid);
                issue_name = format_issue(&issue.project_id, issue.uid);
            }
            Ok(None) => {}
            Err(e) => log::error!("Failed to find containing issue: {}", e),
        }

        let use_database_owner = self.use_database_owner(&instance, &database).await?;

        let statement = req.statement.trim();
        if statement.is_empty() && !info.capabilities().allows_empty_statement {
            return Err(RunnerError::EmptyStatement);
        }

        let context = MigrationExecutionContext {
            task_run_name: format_task_run(
                &pipeline.project_id,
                pipeline.uid,
                task.stage_id,
                task.uid,
                req.task_run_uid,
            ),
            instance,
            database,
            sheet,
            sheet_name,
            task: task.clone(),
            task_run_uid: req.task_run_uid,
            issue_name,
            version: req.schema_version.to_string(),
            release,
            statement: statement.to_string(),
            use_database_owner,
        };
        Ok((info, context))
    }

    /// Changed resources from the pipeline's plan-check summary, if exactly
    /// one plan exists and a matching successful report is found.
    async fn changed_resources(
        &self,
        req: &MigrationRequest<'_>,
        database: &DatabaseRecord,
    ) -> RunnerResult<Option<sl_core::ChangedResources>> {
        let plans = self
            .store
            .list_plans(&FindPlan {
                pipeline_uid: Some(req.task.pipeline_uid),
            })
            .await
            .map_err(RunnerError::resolve("failed to list plans"))?;
        let [plan] = plans.as_slice() else {
            return Ok(None);
        };

        let mut runs = self
            .store
            .list_plan_check_runs(&FindPlanCheckRun {
                plan_uid: plan.uid,
                types: Some(vec![PlanCheckRunType::DatabaseStatementSummaryReport]),
                statuses: Some(vec![PlanCheckRunStatus::Done]),
            })
            .await
            .map_err(RunnerError::resolve("failed to list plan check runs"))?;
        runs.sort_by(|a, b| b.uid.cmp(&a.uid));

        Ok(runs
            .iter()
            .filter(|run| run.targets(req.task.instance_uid, &database.database_name, req.sheet_uid))
            .find_map(|run| run.successful_summary())
            .and_then(|report| report.changed_resources.clone()))
    }

    async fn use_database_owner(
        &self,
        instance: &InstanceRecord,
        database: &DatabaseRecord,
    ) -> RunnerResult<bool> {
        if instance.engine != Engine::Postgres {
            return Ok(false);
        }
        let project = self
            .store
            .get_project(&database.project_id)
            .await
            .map_err(RunnerError::resolve("failed to get project"))?;
        Ok(project.is_some_and(|p| p.postgres_database_tenant_mode))
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
