use super::*;
use sl_core::plan::{
    ChangedDatabase, ChangedResources, CheckResult, CheckResultStatus, PlanCheckRunConfig,
    PlanCheckRunResult, SqlSummaryReport,
};
use sl_core::{PipelineRecord, TaskType};
use sl_store::{DuckDbStore, NewDatabase, NewInstance, NewPlanCheckRun, NewTask};
use std::collections::BTreeMap;

struct Fixture {
    store: Arc<DuckDbStore>,
    instance: InstanceRecord,
    database: DatabaseRecord,
    pipeline: PipelineRecord,
}

fn fixture() -> Fixture {
    let store = Arc::new(DuckDbStore::open_memory().unwrap());
    store.upsert_environment("prod", "Production").unwrap();
    store.upsert_project("app", "App", false).unwrap();
    let instance = store
        .upsert_instance(&NewInstance {
            resource_id: "local".to_string(),
            engine: Engine::DuckDb,
            data_source: ":memory:".to_string(),
            environment_id: Some("prod".to_string()),
        })
        .unwrap();
    let database = store
        .upsert_database(&NewDatabase {
            instance_id: "local".to_string(),
            database_name: "mydb".to_string(),
            project_id: "app".to_string(),
            environment_id: None,
            secrets: BTreeMap::new(),
        })
        .unwrap();
    let pipeline = store.create_pipeline("app", "deploy").unwrap();
    Fixture {
        store,
        instance,
        database,
        pipeline,
    }
}

impl Fixture {
    fn resolver(&self) -> MigrationContextResolver {
        MigrationContextResolver::new(self.store.clone(), Profile::default())
    }

    fn task(&self, task_type: TaskType, payload: &str) -> TaskRecord {
        self.store
            .create_task(&NewTask {
                pipeline_uid: self.pipeline.uid,
                stage_id: 1,
                instance_uid: self.instance.uid,
                database_uid: Some(self.database.uid),
                name: "create t".to_string(),
                task_type,
                payload: payload.to_string(),
            })
            .unwrap()
    }
}

fn request<'a>(
    task: &'a TaskRecord,
    statement: &'a str,
    sheet_uid: Option<i64>,
) -> MigrationRequest<'a> {
    MigrationRequest {
        task,
        task_run_uid: 42,
        migration_type: task.task_type.migration_type().unwrap(),
        statement,
        schema_version: "202401010000",
        sheet_uid,
    }
}

#[tokio::test]
async fn resolves_names_and_trimmed_statement() {
    let f = fixture();
    let sheet = f.store.create_sheet("app", "v1", "CREATE TABLE t(id int)").unwrap();
    let task = f.task(TaskType::DatabaseSchemaUpdate, "");

    let (info, ctx) = f
        .resolver()
        .resolve(&request(&task, "  CREATE TABLE t(id int)\n", Some(sheet.uid)))
        .await
        .unwrap();

    assert_eq!(info.database_uid, f.database.uid);
    assert_eq!(info.environment, "prod");
    assert_eq!(info.namespace, "mydb");
    assert_eq!(info.description, "create t");
    assert_eq!(ctx.statement, "CREATE TABLE t(id int)");
    assert_eq!(ctx.version, "202401010000");
    assert_eq!(ctx.sheet_name, format!("projects/app/sheets/{}", sheet.uid));
    assert_eq!(
        ctx.task_run_name,
        format!(
            "projects/app/rollouts/{}/stages/1/tasks/{}/taskRuns/42",
            f.pipeline.uid, task.uid
        )
    );
    assert!(ctx.issue_name.is_empty());
    assert!(!ctx.use_database_owner);
}

#[tokio::test]
async fn issue_prefixes_description() {
    let f = fixture();
    let sheet = f.store.create_sheet("app", "v1", "SELECT 1").unwrap();
    let issue = f
        .store
        .create_issue("app", Some(f.pipeline.uid), "Add table t")
        .unwrap();
    let task = f.task(TaskType::DatabaseSchemaUpdate, "");

    let (info, ctx) = f
        .resolver()
        .resolve(&request(&task, "SELECT 1", Some(sheet.uid)))
        .await
        .unwrap();

    assert_eq!(info.description, "Add table t - create t");
    assert_eq!(info.issue_uid, Some(issue.uid));
    assert_eq!(ctx.issue_name, format!("projects/app/issues/{}", issue.uid));
}

#[tokio::test]
async fn missing_database_is_not_found() {
    let f = fixture();
    let mut task = f.task(TaskType::DatabaseSchemaUpdate, "");
    task.database_uid = Some(9999);

    let err = f
        .resolver()
        .resolve(&request(&task, "SELECT 1", None))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::NotFound { entity: "database", .. }));
    assert!(err.is_terminal());
}

#[tokio::test]
async fn empty_statement_depends_on_type() {
    let f = fixture();
    let sheet = f.store.create_sheet("app", "v1", "  ").unwrap();

    let migrate = f.task(TaskType::DatabaseSchemaUpdate, "");
    let err = f
        .resolver()
        .resolve(&request(&migrate, "   \n", Some(sheet.uid)))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::EmptyStatement));

    let baseline = f.task(TaskType::DatabaseSchemaBaseline, "");
    let (_, ctx) = f
        .resolver()
        .resolve(&request(&baseline, "", None))
        .await
        .unwrap();
    assert!(ctx.sheet.is_none());
    assert!(ctx.sheet_name.is_empty());
}

#[tokio::test]
async fn missing_sheet_rejected_outside_baseline() {
    let f = fixture();
    let task = f.task(TaskType::DatabaseDataUpdate, "");
    let err = f
        .resolver()
        .resolve(&request(&task, "DELETE FROM t", None))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::InvalidPayload(_)));
}

#[tokio::test]
async fn release_file_sets_provenance() {
    let f = fixture();
    let sheet = f.store.create_sheet("app", "v1", "SELECT 1").unwrap();
    let task = f.task(
        TaskType::DatabaseSchemaUpdate,
        r#"{"taskReleaseSource":{"file":"projects/app/releases/r1/files/f1"}}"#,
    );

    let (_, ctx) = f
        .resolver()
        .resolve(&request(&task, "SELECT 1", Some(sheet.uid)))
        .await
        .unwrap();
    assert_eq!(ctx.release.release, "projects/app/releases/r1");
    assert_eq!(ctx.release.file, "projects/app/releases/r1/files/f1");
}

#[tokio::test]
async fn malformed_release_file_is_invalid_payload() {
    let f = fixture();
    let sheet = f.store.create_sheet("app", "v1", "SELECT 1").unwrap();
    let task = f.task(
        TaskType::DatabaseSchemaUpdate,
        r#"{"taskReleaseSource":{"file":"projects/app/files/f1"}}"#,
    );

    let err = f
        .resolver()
        .resolve(&request(&task, "SELECT 1", Some(sheet.uid)))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::InvalidPayload(_)));
}

fn summary_run(
    plan_uid: i64,
    instance_uid: i64,
    sheet_uid: i64,
    table_db: &str,
) -> NewPlanCheckRun {
    NewPlanCheckRun {
        plan_uid,
        run_type: PlanCheckRunType::DatabaseStatementSummaryReport,
        status: PlanCheckRunStatus::Done,
        config: PlanCheckRunConfig {
            instance_uid,
            database_name: "mydb".to_string(),
            sheet_uid,
        },
        result: Some(PlanCheckRunResult {
            results: vec![CheckResult {
                status: CheckResultStatus::Success,
                sql_summary_report: Some(SqlSummaryReport {
                    changed_resources: Some(ChangedResources {
                        databases: vec![ChangedDatabase {
                            name: table_db.to_string(),
                            schemas: vec![],
                        }],
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }],
        }),
    }
}

#[tokio::test]
async fn latest_matching_summary_supplies_changed_resources() {
    let f = fixture();
    let sheet = f.store.create_sheet("app", "v1", "SELECT 1").unwrap();
    let plan = f
        .store
        .create_plan("app", Some(f.pipeline.uid), "plan")
        .unwrap();
    f.store
        .create_plan_check_run(&summary_run(plan.uid, f.instance.uid, sheet.uid, "older"))
        .unwrap();
    f.store
        .create_plan_check_run(&summary_run(plan.uid, f.instance.uid, sheet.uid, "newer"))
        .unwrap();
    // Different sheet: never matches.
    f.store
        .create_plan_check_run(&summary_run(plan.uid, f.instance.uid, sheet.uid + 1, "other"))
        .unwrap();
    let task = f.task(TaskType::DatabaseSchemaUpdate, "");

    let (info, _) = f
        .resolver()
        .resolve(&request(&task, "SELECT 1", Some(sheet.uid)))
        .await
        .unwrap();
    let changed = info.payload.changed_resources.unwrap();
    assert_eq!(changed.databases[0].name, "newer");
}

#[tokio::test]
async fn ambiguous_plans_leave_changed_resources_empty() {
    let f = fixture();
    let sheet = f.store.create_sheet("app", "v1", "SELECT 1").unwrap();
    for name in ["a", "b"] {
        let plan = f
            .store
            .create_plan("app", Some(f.pipeline.uid), name)
            .unwrap();
        f.store
            .create_plan_check_run(&summary_run(plan.uid, f.instance.uid, sheet.uid, name))
            .unwrap();
    }
    let task = f.task(TaskType::DatabaseSchemaUpdate, "");

    let (info, _) = f
        .resolver()
        .resolve(&request(&task, "SELECT 1", Some(sheet.uid)))
        .await
        .unwrap();
    assert!(info.payload.changed_resources.is_none());
}

#[tokio::test]
async fn postgres_tenant_mode_uses_database_owner() {
    let f = fixture();
    f.store.upsert_project("app", "App", true).unwrap();
    let sheet = f.store.create_sheet("app", "v1", "SELECT 1").unwrap();
    let task = f.task(TaskType::DatabaseSchemaUpdate, "");

    let (_, ctx) = f
        .resolver()
        .resolve(&request(&task, "SELECT 1", Some(sheet.uid)))
        .await
        .unwrap();
    // DuckDB instances never connect as owner.
    assert!(!ctx.use_database_owner);

    let mut instance = f.instance.clone();
    instance.engine = Engine::Postgres;
    let owner = f
        .resolver()
        .use_database_owner(&instance, &f.database)
        .await
        .unwrap();
    assert!(owner);
}
