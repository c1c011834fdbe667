//! Catalog administration: registering instances, databases and workflow
//! objects, and reading back history for reporting.
//!
//! These are synchronous inherent methods on [`DuckDbStore`]; the execution
//! core only ever goes through [`crate::Store`].

use crate::connection::{next_uid, query_all, query_opt, DuckDbStore};
use crate::error::{StoreError, StoreResult};
use crate::store::{
    decode_plan_check_run, decode_task_run, find_changelogs, find_database,
    find_database_by_name, find_instance_by_resource_id, find_project,
    find_task_run,
};
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use sl_core::plan::{PlanCheckRunConfig, PlanCheckRunResult};
use sl_core::{
    AnomalyType, ChangelogRecord, DatabaseRecord, Engine, EnvironmentRecord, InstanceRecord,
    IssueRecord, PipelineRecord, PlanCheckRun, PlanCheckRunStatus, PlanCheckRunType, PlanRecord,
    ProjectRecord, SchemaSnapshot, SheetRecord, SyncHistoryRecord, TaskRecord, TaskRunLogRecord,
    TaskRunRecord, TaskType,
};
use std::collections::BTreeMap;

/// Instance registration
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub resource_id: String,
    pub engine: Engine,
    pub data_source: String,
    pub environment_id: Option<String>,
}

/// Database registration; `instance_id` is the instance resource id
#[derive(Debug, Clone)]
pub struct NewDatabase {
    pub instance_id: String,
    pub database_name: String,
    pub project_id: String,
    pub environment_id: Option<String>,
    pub secrets: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub pipeline_uid: i64,
    pub stage_id: i64,
    pub instance_uid: i64,
    pub database_uid: Option<i64>,
    pub name: String,
    pub task_type: TaskType,
    pub payload: String,
}

#[derive(Debug, Clone)]
pub struct NewPlanCheckRun {
    pub plan_uid: i64,
    pub run_type: PlanCheckRunType,
    pub status: PlanCheckRunStatus,
    pub config: PlanCheckRunConfig,
    pub result: Option<PlanCheckRunResult>,
}

fn lookup_uid(conn: &Connection, sql: &str, key: &str) -> StoreResult<Option<i64>> {
    query_opt(conn, sql, params![key], |row| row.get(0))
}

impl DuckDbStore {
    pub fn upsert_environment(&self, resource_id: &str, title: &str) -> StoreResult<EnvironmentRecord> {
        self.with_conn(|conn| {
            let existing: Option<String> = query_opt(
                conn,
                "SELECT resource_id FROM sluice.environment WHERE resource_id = ?",
                params![resource_id],
                |row| row.get(0),
            )?;
            if existing.is_some() {
                conn.execute(
                    "UPDATE sluice.environment SET title = ? WHERE resource_id = ?",
                    params![title, resource_id],
                )?;
            } else {
                conn.execute(
                    "INSERT INTO sluice.environment (resource_id, title) VALUES (?, ?)",
                    params![resource_id, title],
                )?;
            }
            Ok(EnvironmentRecord {
                resource_id: resource_id.to_string(),
                title: title.to_string(),
            })
        })
    }

    pub fn upsert_project(
        &self,
        resource_id: &str,
        title: &str,
        postgres_database_tenant_mode: bool,
    ) -> StoreResult<ProjectRecord> {
        self.with_conn(|conn| {
            let uid = match lookup_uid(
                conn,
                "SELECT uid FROM sluice.project WHERE resource_id = ?",
                resource_id,
            )? {
                Some(uid) => {
                    conn.execute(
                        "UPDATE sluice.project SET title = ?, postgres_database_tenant_mode = ? WHERE uid = ?",
                        params![title, postgres_database_tenant_mode, uid],
                    )?;
                    uid
                }
                None => {
                    let uid = next_uid(conn, "project_seq")?;
                    conn.execute(
                        "INSERT INTO sluice.project (uid, resource_id, title, postgres_database_tenant_mode) \
                         VALUES (?, ?, ?, ?)",
                        params![uid, resource_id, title, postgres_database_tenant_mode],
                    )?;
                    uid
                }
            };
            Ok(ProjectRecord {
                uid,
                resource_id: resource_id.to_string(),
                title: title.to_string(),
                postgres_database_tenant_mode,
            })
        })
    }

    pub fn upsert_instance(&self, new: &NewInstance) -> StoreResult<InstanceRecord> {
        self.with_conn(|conn| {
            let uid = match lookup_uid(
                conn,
                "SELECT uid FROM sluice.instance WHERE resource_id = ?",
                &new.resource_id,
            )? {
                Some(uid) => {
                    conn.execute(
                        "UPDATE sluice.instance SET engine = ?, data_source = ?, environment_id = ? WHERE uid = ?",
                        params![new.engine.as_str(), new.data_source, new.environment_id, uid],
                    )?;
                    uid
                }
                None => {
                    let uid = next_uid(conn, "instance_seq")?;
                    conn.execute(
                        "INSERT INTO sluice.instance (uid, resource_id, engine, data_source, environment_id) \
                         VALUES (?, ?, ?, ?, ?)",
                        params![
                            uid,
                            new.resource_id,
                            new.engine.as_str(),
                            new.data_source,
                            new.environment_id
                        ],
                    )?;
                    uid
                }
            };
            Ok(InstanceRecord {
                uid,
                resource_id: new.resource_id.clone(),
                engine: new.engine,
                data_source: new.data_source.clone(),
                environment_id: new.environment_id.clone(),
            })
        })
    }

    pub fn upsert_database(&self, new: &NewDatabase) -> StoreResult<DatabaseRecord> {
        let secrets = serde_json::to_string(&new.secrets)?;
        self.with_conn(|conn| {
            let instance = find_instance_by_resource_id(conn, &new.instance_id)?
                .ok_or_else(|| StoreError::not_found("instance", &new.instance_id))?;
            let existing = find_database_by_name(conn, &new.instance_id, &new.database_name)?;
            let uid = match existing {
                Some(db) => {
                    conn.execute(
                        "UPDATE sluice.db SET project_id = ?, environment_id = ?, secrets = ? WHERE uid = ?",
                        params![new.project_id, new.environment_id, secrets, db.uid],
                    )?;
                    db.uid
                }
                None => {
                    let uid = next_uid(conn, "db_seq")?;
                    conn.execute(
                        "INSERT INTO sluice.db (uid, instance_uid, project_id, environment_id, database_name, secrets) \
                         VALUES (?, ?, ?, ?, ?, ?)",
                        params![
                            uid,
                            instance.uid,
                            new.project_id,
                            new.environment_id,
                            new.database_name,
                            secrets
                        ],
                    )?;
                    uid
                }
            };
            find_database(conn, uid)?.ok_or_else(|| StoreError::not_found("database", uid))
        })
    }

    pub fn find_instance(&self, resource_id: &str) -> StoreResult<Option<InstanceRecord>> {
        self.with_conn(|conn| find_instance_by_resource_id(conn, resource_id))
    }

    pub fn find_database(
        &self,
        instance_id: &str,
        database_name: &str,
    ) -> StoreResult<Option<DatabaseRecord>> {
        self.with_conn(|conn| find_database_by_name(conn, instance_id, database_name))
    }

    pub fn create_pipeline(&self, project_id: &str, name: &str) -> StoreResult<PipelineRecord> {
        self.with_conn(|conn| {
            let uid = next_uid(conn, "pipeline_seq")?;
            conn.execute(
                "INSERT INTO sluice.pipeline (uid, project_id, name) VALUES (?, ?, ?)",
                params![uid, project_id, name],
            )?;
            Ok(PipelineRecord {
                uid,
                project_id: project_id.to_string(),
                name: name.to_string(),
            })
        })
    }

    pub fn create_sheet(
        &self,
        project_id: &str,
        title: &str,
        statement: &str,
    ) -> StoreResult<SheetRecord> {
        self.with_conn(|conn| {
            let uid = next_uid(conn, "sheet_seq")?;
            conn.execute(
                "INSERT INTO sluice.sheet (uid, project_id, title, statement) VALUES (?, ?, ?, ?)",
                params![uid, project_id, title, statement],
            )?;
            Ok(SheetRecord {
                uid,
                project_id: project_id.to_string(),
                title: title.to_string(),
                statement: statement.to_string(),
            })
        })
    }

    pub fn create_issue(
        &self,
        project_id: &str,
        pipeline_uid: Option<i64>,
        title: &str,
    ) -> StoreResult<IssueRecord> {
        self.with_conn(|conn| {
            let project = find_project(conn, project_id)?
                .ok_or_else(|| StoreError::not_found("project", project_id))?;
            let uid = next_uid(conn, "issue_seq")?;
            conn.execute(
                "INSERT INTO sluice.issue (uid, project_uid, pipeline_uid, title) VALUES (?, ?, ?, ?)",
                params![uid, project.uid, pipeline_uid, title],
            )?;
            Ok(IssueRecord {
                uid,
                project_uid: project.uid,
                project_id: project.resource_id,
                pipeline_uid,
                title: title.to_string(),
            })
        })
    }

    pub fn create_plan(
        &self,
        project_id: &str,
        pipeline_uid: Option<i64>,
        name: &str,
    ) -> StoreResult<PlanRecord> {
        self.with_conn(|conn| {
            let uid = next_uid(conn, "plan_seq")?;
            conn.execute(
                "INSERT INTO sluice.plan (uid, project_id, pipeline_uid, name) VALUES (?, ?, ?, ?)",
                params![uid, project_id, pipeline_uid, name],
            )?;
            Ok(PlanRecord {
                uid,
                project_id: project_id.to_string(),
                pipeline_uid,
                name: name.to_string(),
            })
        })
    }

    pub fn create_plan_check_run(&self, new: &NewPlanCheckRun) -> StoreResult<PlanCheckRun> {
        let config = serde_json::to_string(&new.config)?;
        let result = new.result.as_ref().map(serde_json::to_string).transpose()?;
        self.with_conn(|conn| {
            let uid = next_uid(conn, "plan_check_run_seq")?;
            conn.execute(
                "INSERT INTO sluice.plan_check_run (uid, plan_uid, run_type, status, config, result) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    uid,
                    new.plan_uid,
                    new.run_type.as_str(),
                    new.status.as_str(),
                    config,
                    result
                ],
            )?;
            decode_plan_check_run((
                uid,
                new.plan_uid,
                new.run_type.as_str().to_string(),
                new.status.as_str().to_string(),
                config.clone(),
                result.clone(),
            ))
        })
    }

    pub fn create_task(&self, new: &NewTask) -> StoreResult<TaskRecord> {
        self.with_conn(|conn| {
            let uid = next_uid(conn, "task_seq")?;
            conn.execute(
                "INSERT INTO sluice.task (uid, pipeline_uid, stage_id, instance_uid, database_uid, name, task_type, payload) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    uid,
                    new.pipeline_uid,
                    new.stage_id,
                    new.instance_uid,
                    new.database_uid,
                    new.name,
                    new.task_type.as_str(),
                    new.payload
                ],
            )?;
            Ok(TaskRecord {
                uid,
                pipeline_uid: new.pipeline_uid,
                stage_id: new.stage_id,
                instance_uid: new.instance_uid,
                database_uid: new.database_uid,
                name: new.name.clone(),
                task_type: new.task_type,
                payload: new.payload.clone(),
            })
        })
    }

    pub fn get_task(&self, uid: i64) -> StoreResult<Option<TaskRecord>> {
        let raw = self.with_conn(|conn| {
            query_opt(
                conn,
                "SELECT uid, pipeline_uid, stage_id, instance_uid, database_uid, name, task_type, payload \
                 FROM sluice.task WHERE uid = ?",
                params![uid],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
        })?;
        raw.map(
            |(uid, pipeline_uid, stage_id, instance_uid, database_uid, name, task_type, payload)| {
                Ok(TaskRecord {
                    uid,
                    pipeline_uid,
                    stage_id,
                    instance_uid,
                    database_uid,
                    name,
                    task_type: task_type.parse()?,
                    payload,
                })
            },
        )
        .transpose()
    }

    pub fn get_task_run(&self, uid: i64) -> StoreResult<Option<TaskRunRecord>> {
        self.with_conn(|conn| find_task_run(conn, uid))
    }

    /// Task runs of a task, oldest first
    pub fn list_task_runs(&self, task_uid: i64) -> StoreResult<Vec<TaskRunRecord>> {
        type Raw = (i64, i64, String, Option<String>, Option<String>);
        let raw: Vec<Raw> = self.with_conn(|conn| {
            query_all(
                conn,
                "SELECT uid, task_uid, status, result, error FROM sluice.task_run \
                 WHERE task_uid = ? ORDER BY uid",
                params![task_uid],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
        })?;
        raw.into_iter().map(decode_task_run).collect()
    }

    pub fn create_anomaly(&self, database_uid: i64, anomaly: AnomalyType) -> StoreResult<()> {
        self.with_conn(|conn| {
            let uid = next_uid(conn, "anomaly_seq")?;
            conn.execute(
                "INSERT INTO sluice.anomaly (uid, database_uid, anomaly_type) VALUES (?, ?, ?)",
                params![uid, database_uid, anomaly.as_str()],
            )?;
            Ok(())
        })
    }

    /// Anomaly type names currently recorded for a database
    pub fn list_anomalies(&self, database_uid: i64) -> StoreResult<Vec<String>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                "SELECT anomaly_type FROM sluice.anomaly WHERE database_uid = ? ORDER BY uid",
                params![database_uid],
                |row| row.get(0),
            )
        })
    }

    /// Changelogs of a database, oldest first
    pub fn list_changelogs(&self, database_uid: i64) -> StoreResult<Vec<ChangelogRecord>> {
        self.with_conn(|conn| find_changelogs(conn, database_uid))
    }

    pub fn list_task_run_logs(&self, task_run_uid: i64) -> StoreResult<Vec<TaskRunLogRecord>> {
        let raw: Vec<(String, String, String)> = self.with_conn(|conn| {
            query_all(
                conn,
                "SELECT created_at, deploy_id, payload FROM sluice.task_run_log \
                 WHERE task_run_uid = ? ORDER BY created_at, rowid",
                params![task_run_uid],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
        })?;
        raw.into_iter()
            .map(|(created_at, deploy_id, payload)| {
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| StoreError::QueryError(format!("bad log timestamp: {e}")))?;
                Ok(TaskRunLogRecord {
                    task_run_uid,
                    created_at: created_at.with_timezone(&Utc),
                    deploy_id,
                    entry: serde_json::from_str(&payload)?,
                })
            })
            .collect()
    }

    pub fn get_sync_history(&self, uid: i64) -> StoreResult<Option<SyncHistoryRecord>> {
        let raw: Option<(i64, String)> = self.with_conn(|conn| {
            query_opt(
                conn,
                "SELECT database_uid, schema_json FROM sluice.sync_history WHERE uid = ?",
                params![uid],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
        })?;
        raw.map(|(database_uid, schema_json)| {
            let schema: SchemaSnapshot = serde_json::from_str(&schema_json)?;
            Ok(SyncHistoryRecord {
                uid,
                database_uid,
                schema,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
