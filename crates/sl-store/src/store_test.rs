use crate::catalog::{NewDatabase, NewInstance, NewPlanCheckRun};
use crate::traits::*;
use crate::{DuckDbStore, StoreError};
use chrono::Utc;
use sl_core::plan::{
    CheckResult, CheckResultStatus, PlanCheckRunConfig, PlanCheckRunResult, SqlSummaryReport,
};
use sl_core::{
    AnomalyType, ChangelogPayload, ChangelogStatus, CreateChangelog, CreateRevision, Engine,
    PlanCheckRunStatus, PlanCheckRunType, RevisionPayload, SchemaSnapshot, TaskRunLog,
    TaskRunResult, TaskRunStatus, UpdateChangelog,
};
use std::collections::BTreeMap;

fn seeded() -> (DuckDbStore, i64) {
    let store = DuckDbStore::open_memory().unwrap();
    store.upsert_environment("test", "Test").unwrap();
    store.upsert_project("app", "App", false).unwrap();
    store
        .upsert_instance(&NewInstance {
            resource_id: "local".to_string(),
            engine: Engine::DuckDb,
            data_source: ":memory:".to_string(),
            environment_id: Some("test".to_string()),
        })
        .unwrap();
    let db = store
        .upsert_database(&NewDatabase {
            instance_id: "local".to_string(),
            database_name: "mydb".to_string(),
            project_id: "app".to_string(),
            environment_id: None,
            secrets: BTreeMap::from([("PASSWORD".to_string(), "hunter2".to_string())]),
        })
        .unwrap();
    (store, db.uid)
}

fn pending(database_uid: i64) -> CreateChangelog {
    CreateChangelog {
        database_uid,
        prev_sync_history_uid: Some(7),
        payload: ChangelogPayload {
            version: "202401010000".to_string(),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn test_get_database_joins_instance() {
    let (store, db_uid) = seeded();
    let db = store.get_database(db_uid).await.unwrap().unwrap();
    assert_eq!(db.instance_id, "local");
    assert_eq!(db.database_name, "mydb");
    assert_eq!(db.secrets.get("PASSWORD").map(String::as_str), Some("hunter2"));

    let instance = store.get_instance(db.instance_uid).await.unwrap().unwrap();
    assert_eq!(instance.engine, Engine::DuckDb);
    assert_eq!(
        db.effective_environment_id(&instance),
        Some("test"),
        "database without override inherits the instance environment"
    );
    assert!(store.get_database(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn test_revision_unique_per_version() {
    let (store, db_uid) = seeded();
    let create = CreateRevision {
        database_uid: db_uid,
        version: "202401010000".to_string(),
        payload: RevisionPayload {
            sheet: "projects/app/sheets/101".to_string(),
            ..Default::default()
        },
    };
    let revision = store.create_revision(&create).await.unwrap();
    assert_eq!(revision.version, "202401010000");

    let err = store.create_revision(&create).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");

    let found = store
        .list_revisions(&FindRevision {
            database_uid: db_uid,
            version: Some("202401010000".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(found, vec![revision]);

    let other = store
        .list_revisions(&FindRevision {
            database_uid: db_uid,
            version: Some("202401020000".to_string()),
        })
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn test_changelog_transitions_once() {
    let (store, db_uid) = seeded();
    let uid = store.create_changelog(&pending(db_uid)).await.unwrap();

    let created = store.get_changelog(uid).await.unwrap().unwrap();
    assert_eq!(created.status, ChangelogStatus::Pending);
    assert_eq!(created.prev_sync_history_uid, Some(7));
    assert_eq!(created.payload.version, "202401010000");

    store
        .update_changelog(&UpdateChangelog {
            uid,
            status: ChangelogStatus::Done,
            sync_history_uid: Some(8),
            revision_uid: Some(3),
        })
        .await
        .unwrap();
    let done = store.get_changelog(uid).await.unwrap().unwrap();
    assert_eq!(done.status, ChangelogStatus::Done);
    assert_eq!(done.sync_history_uid, Some(8));
    assert_eq!(done.revision_uid, Some(3));

    let again = store
        .update_changelog(&UpdateChangelog {
            uid,
            status: ChangelogStatus::Failed,
            sync_history_uid: None,
            revision_uid: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(again, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_update_changelog_rejects_pending_and_unknown() {
    let (store, db_uid) = seeded();
    let uid = store.create_changelog(&pending(db_uid)).await.unwrap();

    let back = store
        .update_changelog(&UpdateChangelog {
            uid,
            status: ChangelogStatus::Pending,
            sync_history_uid: None,
            revision_uid: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(back, StoreError::Conflict(_)));

    let missing = store
        .update_changelog(&UpdateChangelog {
            uid: 424242,
            status: ChangelogStatus::Failed,
            sync_history_uid: None,
            revision_uid: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(missing, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_plan_check_run_filters() {
    let (store, _) = seeded();
    let plan = store.create_plan("app", Some(1), "plan").unwrap();
    let config = PlanCheckRunConfig {
        instance_uid: 101,
        database_name: "mydb".to_string(),
        sheet_uid: 5,
    };
    let result = PlanCheckRunResult {
        results: vec![CheckResult {
            status: CheckResultStatus::Success,
            sql_summary_report: Some(SqlSummaryReport::default()),
            ..Default::default()
        }],
    };
    for (run_type, status) in [
        (PlanCheckRunType::DatabaseStatementSummaryReport, PlanCheckRunStatus::Done),
        (PlanCheckRunType::DatabaseStatementSummaryReport, PlanCheckRunStatus::Failed),
        (PlanCheckRunType::DatabaseConnect, PlanCheckRunStatus::Done),
    ] {
        store
            .create_plan_check_run(&NewPlanCheckRun {
                plan_uid: plan.uid,
                run_type,
                status,
                config: config.clone(),
                result: Some(result.clone()),
            })
            .unwrap();
    }

    let all = store
        .list_plan_check_runs(&FindPlanCheckRun {
            plan_uid: plan.uid,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let summaries = store
        .list_plan_check_runs(&FindPlanCheckRun {
            plan_uid: plan.uid,
            types: Some(vec![PlanCheckRunType::DatabaseStatementSummaryReport]),
            statuses: Some(vec![PlanCheckRunStatus::Done]),
        })
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].config, config);
    assert!(summaries[0].successful_summary().is_some());

    let plans = store
        .list_plans(&FindPlan {
            pipeline_uid: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(plans, vec![plan]);
}

#[tokio::test]
async fn test_issue_lookup_by_pipeline() {
    let (store, _) = seeded();
    let pipeline = store.create_pipeline("app", "rollout").unwrap();
    let issue = store
        .create_issue("app", Some(pipeline.uid), "Add users table")
        .unwrap();

    let found = store
        .get_issue(&FindIssue {
            pipeline_uid: Some(pipeline.uid),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found, Some(issue));

    let none = store
        .get_issue(&FindIssue {
            pipeline_uid: Some(pipeline.uid + 1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(none.is_none());

    assert!(store.get_issue(&FindIssue::default()).await.is_err());
}

#[tokio::test]
async fn test_delete_anomaly() {
    let (store, db_uid) = seeded();
    store
        .create_anomaly(db_uid, AnomalyType::DatabaseSchemaDrift)
        .unwrap();
    store
        .create_anomaly(db_uid, AnomalyType::DatabaseConnection)
        .unwrap();

    assert!(store
        .delete_anomaly(db_uid, AnomalyType::DatabaseSchemaDrift)
        .await
        .unwrap());
    assert!(!store
        .delete_anomaly(db_uid, AnomalyType::DatabaseSchemaDrift)
        .await
        .unwrap());
    assert_eq!(
        store.list_anomalies(db_uid).unwrap(),
        vec!["DATABASE_CONNECTION".to_string()]
    );
}

#[tokio::test]
async fn test_task_run_and_logs() {
    let (store, _) = seeded();
    let run = store.create_task_run(42).await.unwrap();
    assert_eq!(run.status, TaskRunStatus::Running);

    store
        .create_task_run_log(run.uid, Utc::now(), "local", &TaskRunLog::DatabaseSyncStart)
        .await
        .unwrap();
    store
        .create_task_run_log(
            run.uid,
            Utc::now(),
            "local",
            &TaskRunLog::CommandResponse {
                error: String::new(),
            },
        )
        .await
        .unwrap();
    let logs = store.list_task_run_logs(run.uid).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].entry, TaskRunLog::DatabaseSyncStart);
    assert_eq!(logs[0].deploy_id, "local");

    store
        .update_task_run(&UpdateTaskRun {
            uid: run.uid,
            status: TaskRunStatus::Done,
            result: Some(TaskRunResult {
                detail: "ok".to_string(),
                ..Default::default()
            }),
            error: None,
        })
        .await
        .unwrap();
    let done = store.get_task_run(run.uid).unwrap().unwrap();
    assert_eq!(done.status, TaskRunStatus::Done);
    assert_eq!(done.result.unwrap().detail, "ok");
}

#[tokio::test]
async fn test_sync_history_round_trip() {
    let (store, db_uid) = seeded();
    let uid = store
        .create_sync_history(db_uid, &SchemaSnapshot::default())
        .await
        .unwrap();
    let history = store.get_sync_history(uid).unwrap().unwrap();
    assert_eq!(history.database_uid, db_uid);
    assert!(history.schema.tables.is_empty());
}
