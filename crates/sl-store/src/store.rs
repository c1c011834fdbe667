//! [`Store`] implementation for [`DuckDbStore`].

use crate::connection::{next_uid, query_all, query_opt, DuckDbStore};
use crate::error::{StoreError, StoreResult};
use crate::traits::{FindIssue, FindPlan, FindPlanCheckRun, FindRevision, Store, UpdateTaskRun};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection, Row};
use sl_core::plan::{PlanCheckRunConfig, PlanCheckRunResult};
use sl_core::{
    AnomalyType, ChangelogRecord, ChangelogStatus, CreateChangelog, CreateRevision,
    DatabaseRecord, EnvironmentRecord, InstanceRecord, IssueRecord, PipelineRecord, PlanCheckRun,
    PlanRecord, ProjectRecord, RevisionRecord, SchemaSnapshot, SheetRecord, TaskRunLog,
    TaskRunRecord, TaskRunStatus, UpdateChangelog,
};
use std::collections::BTreeMap;

pub(crate) const INSTANCE_SELECT: &str =
    "SELECT uid, resource_id, engine, data_source, environment_id FROM sluice.instance";

pub(crate) const DATABASE_SELECT: &str =
    "SELECT d.uid, d.instance_uid, i.resource_id, d.project_id, d.environment_id, \
     d.database_name, d.secrets \
     FROM sluice.db d JOIN sluice.instance i ON i.uid = d.instance_uid";

pub(crate) const PROJECT_SELECT: &str =
    "SELECT uid, resource_id, title, postgres_database_tenant_mode FROM sluice.project";

const ISSUE_SELECT: &str = "SELECT s.uid, s.project_uid, p.resource_id, s.pipeline_uid, s.title \
     FROM sluice.issue s JOIN sluice.project p ON p.uid = s.project_uid";

const CHANGELOG_SELECT: &str = "SELECT uid, database_uid, status, prev_sync_history_uid, \
     sync_history_uid, revision_uid, payload FROM sluice.changelog";

const TASK_RUN_SELECT: &str = "SELECT uid, task_uid, status, result, error FROM sluice.task_run";

// Raw rows: columns read as stored, decoded outside the DuckDB row callback.

type InstanceRow = (i64, String, String, String, Option<String>);
type DatabaseRow = (i64, i64, String, String, Option<String>, String, String);
type ChangelogRow = (i64, i64, String, Option<i64>, Option<i64>, Option<i64>, String);
type PlanCheckRunRow = (i64, i64, String, String, String, Option<String>);
type TaskRunRow = (i64, i64, String, Option<String>, Option<String>);

fn read_instance(row: &Row<'_>) -> duckdb::Result<InstanceRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

pub(crate) fn decode_instance(raw: InstanceRow) -> StoreResult<InstanceRecord> {
    let (uid, resource_id, engine, data_source, environment_id) = raw;
    Ok(InstanceRecord {
        uid,
        resource_id,
        engine: engine.parse()?,
        data_source,
        environment_id,
    })
}

fn read_database(row: &Row<'_>) -> duckdb::Result<DatabaseRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

pub(crate) fn decode_database(raw: DatabaseRow) -> StoreResult<DatabaseRecord> {
    let (uid, instance_uid, instance_id, project_id, environment_id, database_name, secrets) = raw;
    let secrets: BTreeMap<String, String> = serde_json::from_str(&secrets)?;
    Ok(DatabaseRecord {
        uid,
        instance_uid,
        instance_id,
        project_id,
        environment_id,
        database_name,
        secrets,
    })
}

pub(crate) fn read_project(row: &Row<'_>) -> duckdb::Result<ProjectRecord> {
    Ok(ProjectRecord {
        uid: row.get(0)?,
        resource_id: row.get(1)?,
        title: row.get(2)?,
        postgres_database_tenant_mode: row.get(3)?,
    })
}

fn read_changelog(row: &Row<'_>) -> duckdb::Result<ChangelogRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn decode_changelog(raw: ChangelogRow) -> StoreResult<ChangelogRecord> {
    let (uid, database_uid, status, prev_sync_history_uid, sync_history_uid, revision_uid, payload) =
        raw;
    Ok(ChangelogRecord {
        uid,
        database_uid,
        status: status.parse()?,
        prev_sync_history_uid,
        sync_history_uid,
        revision_uid,
        payload: serde_json::from_str(&payload)?,
    })
}

fn read_plan_check_run(row: &Row<'_>) -> duckdb::Result<PlanCheckRunRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

pub(crate) fn decode_plan_check_run(raw: PlanCheckRunRow) -> StoreResult<PlanCheckRun> {
    let (uid, plan_uid, run_type, status, config, result) = raw;
    let config: PlanCheckRunConfig = serde_json::from_str(&config)?;
    let result: Option<PlanCheckRunResult> = result
        .map(|r| serde_json::from_str(&r))
        .transpose()?;
    Ok(PlanCheckRun {
        uid,
        plan_uid,
        run_type: run_type.parse()?,
        status: status.parse()?,
        config,
        result,
    })
}

fn read_task_run(row: &Row<'_>) -> duckdb::Result<TaskRunRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

pub(crate) fn decode_task_run(raw: TaskRunRow) -> StoreResult<TaskRunRecord> {
    let (uid, task_uid, status, result, error) = raw;
    Ok(TaskRunRecord {
        uid,
        task_uid,
        status: status.parse()?,
        result: result.map(|r| serde_json::from_str(&r)).transpose()?,
        error,
    })
}

fn read_revision(row: &Row<'_>) -> duckdb::Result<(i64, i64, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_revision(raw: (i64, i64, String, String)) -> StoreResult<RevisionRecord> {
    let (uid, database_uid, version, payload) = raw;
    Ok(RevisionRecord {
        uid,
        database_uid,
        version,
        payload: serde_json::from_str(&payload)?,
    })
}

pub(crate) fn find_instance(conn: &Connection, uid: i64) -> StoreResult<Option<InstanceRecord>> {
    query_opt(
        conn,
        &format!("{INSTANCE_SELECT} WHERE uid = ?"),
        params![uid],
        read_instance,
    )?
    .map(decode_instance)
    .transpose()
}

pub(crate) fn find_instance_by_resource_id(
    conn: &Connection,
    resource_id: &str,
) -> StoreResult<Option<InstanceRecord>> {
    query_opt(
        conn,
        &format!("{INSTANCE_SELECT} WHERE resource_id = ?"),
        params![resource_id],
        read_instance,
    )?
    .map(decode_instance)
    .transpose()
}

pub(crate) fn find_database(conn: &Connection, uid: i64) -> StoreResult<Option<DatabaseRecord>> {
    query_opt(
        conn,
        &format!("{DATABASE_SELECT} WHERE d.uid = ?"),
        params![uid],
        read_database,
    )?
    .map(decode_database)
    .transpose()
}

pub(crate) fn find_database_by_name(
    conn: &Connection,
    instance_id: &str,
    database_name: &str,
) -> StoreResult<Option<DatabaseRecord>> {
    query_opt(
        conn,
        &format!("{DATABASE_SELECT} WHERE i.resource_id = ? AND d.database_name = ?"),
        params![instance_id, database_name],
        read_database,
    )?
    .map(decode_database)
    .transpose()
}

pub(crate) fn find_project(
    conn: &Connection,
    resource_id: &str,
) -> StoreResult<Option<ProjectRecord>> {
    query_opt(
        conn,
        &format!("{PROJECT_SELECT} WHERE resource_id = ?"),
        params![resource_id],
        read_project,
    )
}

pub(crate) fn find_changelogs(
    conn: &Connection,
    database_uid: i64,
) -> StoreResult<Vec<ChangelogRecord>> {
    query_all(
        conn,
        &format!("{CHANGELOG_SELECT} WHERE database_uid = ? ORDER BY uid"),
        params![database_uid],
        read_changelog,
    )?
    .into_iter()
    .map(decode_changelog)
    .collect()
}

pub(crate) fn find_task_run(conn: &Connection, uid: i64) -> StoreResult<Option<TaskRunRecord>> {
    query_opt(
        conn,
        &format!("{TASK_RUN_SELECT} WHERE uid = ?"),
        params![uid],
        read_task_run,
    )?
    .map(decode_task_run)
    .transpose()
}

fn find_revisions(conn: &Connection, find: &FindRevision) -> StoreResult<Vec<RevisionRecord>> {
    let select = "SELECT uid, database_uid, version, payload FROM sluice.revision";
    let raw = match &find.version {
        Some(version) => query_all(
            conn,
            &format!("{select} WHERE database_uid = ? AND version = ? ORDER BY uid"),
            params![find.database_uid, version],
            read_revision,
        )?,
        None => query_all(
            conn,
            &format!("{select} WHERE database_uid = ? ORDER BY uid"),
            params![find.database_uid],
            read_revision,
        )?,
    };
    raw.into_iter().map(decode_revision).collect()
}

#[async_trait]
impl Store for DuckDbStore {
    async fn get_instance(&self, uid: i64) -> StoreResult<Option<InstanceRecord>> {
        self.with_conn(|conn| find_instance(conn, uid))
    }

    async fn get_database(&self, uid: i64) -> StoreResult<Option<DatabaseRecord>> {
        self.with_conn(|conn| find_database(conn, uid))
    }

    async fn get_environment(&self, resource_id: &str) -> StoreResult<Option<EnvironmentRecord>> {
        self.with_conn(|conn| {
            query_opt(
                conn,
                "SELECT resource_id, title FROM sluice.environment WHERE resource_id = ?",
                params![resource_id],
                |row| {
                    Ok(EnvironmentRecord {
                        resource_id: row.get(0)?,
                        title: row.get(1)?,
                    })
                },
            )
        })
    }

    async fn get_project(&self, resource_id: &str) -> StoreResult<Option<ProjectRecord>> {
        self.with_conn(|conn| find_project(conn, resource_id))
    }

    async fn get_pipeline(&self, uid: i64) -> StoreResult<Option<PipelineRecord>> {
        self.with_conn(|conn| {
            query_opt(
                conn,
                "SELECT uid, project_id, name FROM sluice.pipeline WHERE uid = ?",
                params![uid],
                |row| {
                    Ok(PipelineRecord {
                        uid: row.get(0)?,
                        project_id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
        })
    }

    async fn get_sheet(&self, uid: i64) -> StoreResult<Option<SheetRecord>> {
        self.with_conn(|conn| {
            query_opt(
                conn,
                "SELECT uid, project_id, title, statement FROM sluice.sheet WHERE uid = ?",
                params![uid],
                |row| {
                    Ok(SheetRecord {
                        uid: row.get(0)?,
                        project_id: row.get(1)?,
                        title: row.get(2)?,
                        statement: row.get(3)?,
                    })
                },
            )
        })
    }

    async fn list_plans(&self, find: &FindPlan) -> StoreResult<Vec<PlanRecord>> {
        let read = |row: &Row<'_>| -> duckdb::Result<PlanRecord> {
            Ok(PlanRecord {
                uid: row.get(0)?,
                project_id: row.get(1)?,
                pipeline_uid: row.get(2)?,
                name: row.get(3)?,
            })
        };
        let select = "SELECT uid, project_id, pipeline_uid, name FROM sluice.plan";
        self.with_conn(|conn| match find.pipeline_uid {
            Some(pipeline_uid) => query_all(
                conn,
                &format!("{select} WHERE pipeline_uid = ? ORDER BY uid"),
                params![pipeline_uid],
                read,
            ),
            None => query_all(conn, &format!("{select} ORDER BY uid"), [], read),
        })
    }

    async fn list_plan_check_runs(
        &self,
        find: &FindPlanCheckRun,
    ) -> StoreResult<Vec<PlanCheckRun>> {
        let raw = self.with_conn(|conn| {
            query_all(
                conn,
                "SELECT uid, plan_uid, run_type, status, config, result \
                 FROM sluice.plan_check_run WHERE plan_uid = ? ORDER BY uid",
                params![find.plan_uid],
                read_plan_check_run,
            )
        })?;

        let mut runs = Vec::with_capacity(raw.len());
        for row in raw {
            let run = decode_plan_check_run(row)?;
            let type_ok = find
                .types
                .as_ref()
                .map_or(true, |types| types.contains(&run.run_type));
            let status_ok = find
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&run.status));
            if type_ok && status_ok {
                runs.push(run);
            }
        }
        Ok(runs)
    }

    async fn get_issue(&self, find: &FindIssue) -> StoreResult<Option<IssueRecord>> {
        let read = |row: &Row<'_>| -> duckdb::Result<IssueRecord> {
            Ok(IssueRecord {
                uid: row.get(0)?,
                project_uid: row.get(1)?,
                project_id: row.get(2)?,
                pipeline_uid: row.get(3)?,
                title: row.get(4)?,
            })
        };
        self.with_conn(|conn| match (find.uid, find.pipeline_uid) {
            (Some(uid), _) => query_opt(
                conn,
                &format!("{ISSUE_SELECT} WHERE s.uid = ?"),
                params![uid],
                read,
            ),
            (None, Some(pipeline_uid)) => query_opt(
                conn,
                &format!("{ISSUE_SELECT} WHERE s.pipeline_uid = ? ORDER BY s.uid"),
                params![pipeline_uid],
                read,
            ),
            (None, None) => Err(StoreError::QueryError(
                "issue lookup needs a uid or a pipeline uid".to_string(),
            )),
        })
    }

    async fn list_revisions(&self, find: &FindRevision) -> StoreResult<Vec<RevisionRecord>> {
        self.with_conn(|conn| find_revisions(conn, find))
    }

    async fn create_revision(&self, create: &CreateRevision) -> StoreResult<RevisionRecord> {
        let payload = serde_json::to_string(&create.payload)?;
        self.with_conn(|conn| {
            let uid = next_uid(conn, "revision_seq")?;
            conn.execute(
                "INSERT INTO sluice.revision (uid, database_uid, version, payload) VALUES (?, ?, ?, ?)",
                params![uid, create.database_uid, create.version, payload],
            )
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => StoreError::Conflict(format!(
                    "revision {} already exists for database {}",
                    create.version, create.database_uid
                )),
                other => other,
            })?;
            Ok(RevisionRecord {
                uid,
                database_uid: create.database_uid,
                version: create.version.clone(),
                payload: create.payload.clone(),
            })
        })
    }

    async fn create_changelog(&self, create: &CreateChangelog) -> StoreResult<i64> {
        let payload = serde_json::to_string(&create.payload)?;
        self.with_conn(|conn| {
            let uid = next_uid(conn, "changelog_seq")?;
            conn.execute(
                "INSERT INTO sluice.changelog (uid, database_uid, status, prev_sync_history_uid, payload) \
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    uid,
                    create.database_uid,
                    ChangelogStatus::Pending.as_str(),
                    create.prev_sync_history_uid,
                    payload
                ],
            )?;
            Ok(uid)
        })
    }

    async fn update_changelog(&self, update: &UpdateChangelog) -> StoreResult<()> {
        if !update.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "changelog {} cannot move back to {}",
                update.uid, update.status
            )));
        }
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE sluice.changelog SET status = ?, sync_history_uid = ?, revision_uid = ? \
                 WHERE uid = ? AND status = 'PENDING'",
                params![
                    update.status.as_str(),
                    update.sync_history_uid,
                    update.revision_uid,
                    update.uid
                ],
            )?;
            if changed == 1 {
                return Ok(());
            }
            match query_opt(
                conn,
                "SELECT status FROM sluice.changelog WHERE uid = ?",
                params![update.uid],
                |row| row.get::<_, String>(0),
            )? {
                Some(status) => Err(StoreError::Conflict(format!(
                    "changelog {} is already {}",
                    update.uid, status
                ))),
                None => Err(StoreError::not_found("changelog", update.uid)),
            }
        })
    }

    async fn get_changelog(&self, uid: i64) -> StoreResult<Option<ChangelogRecord>> {
        self.with_conn(|conn| {
            query_opt(
                conn,
                &format!("{CHANGELOG_SELECT} WHERE uid = ?"),
                params![uid],
                read_changelog,
            )?
            .map(decode_changelog)
            .transpose()
        })
    }

    async fn delete_anomaly(&self, database_uid: i64, anomaly: AnomalyType) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM sluice.anomaly WHERE database_uid = ? AND anomaly_type = ?",
                params![database_uid, anomaly.as_str()],
            )?;
            Ok(deleted > 0)
        })
    }

    async fn create_task_run_log(
        &self,
        task_run_uid: i64,
        at: DateTime<Utc>,
        deploy_id: &str,
        entry: &TaskRunLog,
    ) -> StoreResult<()> {
        let payload = serde_json::to_string(entry)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sluice.task_run_log (task_run_uid, created_at, deploy_id, payload) \
                 VALUES (?, ?, ?, ?)",
                params![task_run_uid, at.to_rfc3339(), deploy_id, payload],
            )?;
            Ok(())
        })
    }

    async fn create_sync_history(
        &self,
        database_uid: i64,
        schema: &SchemaSnapshot,
    ) -> StoreResult<i64> {
        let schema_json = serde_json::to_string(schema)?;
        self.with_conn(|conn| {
            let uid = next_uid(conn, "sync_history_seq")?;
            conn.execute(
                "INSERT INTO sluice.sync_history (uid, database_uid, schema_json) VALUES (?, ?, ?)",
                params![uid, database_uid, schema_json],
            )?;
            Ok(uid)
        })
    }

    async fn create_task_run(&self, task_uid: i64) -> StoreResult<TaskRunRecord> {
        self.with_conn(|conn| {
            let uid = next_uid(conn, "task_run_seq")?;
            conn.execute(
                "INSERT INTO sluice.task_run (uid, task_uid, status) VALUES (?, ?, ?)",
                params![uid, task_uid, TaskRunStatus::Running.as_str()],
            )?;
            Ok(TaskRunRecord {
                uid,
                task_uid,
                status: TaskRunStatus::Running,
                result: None,
                error: None,
            })
        })
    }

    async fn update_task_run(&self, update: &UpdateTaskRun) -> StoreResult<()> {
        let result = update
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE sluice.task_run SET status = ?, result = ?, error = ? WHERE uid = ?",
                params![update.status.as_str(), result, update.error, update.uid],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("task run", update.uid));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
