use super::*;
use crate::traits::Store;

fn instance(data_source: &str) -> NewInstance {
    NewInstance {
        resource_id: "local".to_string(),
        engine: Engine::DuckDb,
        data_source: data_source.to_string(),
        environment_id: None,
    }
}

#[test]
fn upserts_keep_uids_stable() {
    let store = DuckDbStore::open_memory().unwrap();
    let first = store.upsert_instance(&instance("a.duckdb")).unwrap();
    let second = store.upsert_instance(&instance("b.duckdb")).unwrap();
    assert_eq!(first.uid, second.uid);
    assert_eq!(
        store.find_instance("local").unwrap().unwrap().data_source,
        "b.duckdb"
    );

    let p1 = store.upsert_project("app", "App", false).unwrap();
    let p2 = store.upsert_project("app", "Application", true).unwrap();
    assert_eq!(p1.uid, p2.uid);
}

#[test]
fn upsert_database_requires_instance() {
    let store = DuckDbStore::open_memory().unwrap();
    let err = store
        .upsert_database(&NewDatabase {
            instance_id: "missing".to_string(),
            database_name: "db".to_string(),
            project_id: "app".to_string(),
            environment_id: None,
            secrets: BTreeMap::new(),
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn upsert_database_updates_secrets() {
    let store = DuckDbStore::open_memory().unwrap();
    store.upsert_instance(&instance(":memory:")).unwrap();
    let mut new = NewDatabase {
        instance_id: "local".to_string(),
        database_name: "db".to_string(),
        project_id: "app".to_string(),
        environment_id: Some("prod".to_string()),
        secrets: BTreeMap::new(),
    };
    let first = store.upsert_database(&new).unwrap();
    new.secrets.insert("TOKEN".to_string(), "abc".to_string());
    let second = store.upsert_database(&new).unwrap();

    assert_eq!(first.uid, second.uid);
    assert_eq!(second.secrets.get("TOKEN").map(String::as_str), Some("abc"));
    assert_eq!(second.environment_id.as_deref(), Some("prod"));
    assert_eq!(
        store.find_database("local", "db").unwrap().unwrap().uid,
        first.uid
    );
}

#[tokio::test]
async fn task_round_trip() {
    let store = DuckDbStore::open_memory().unwrap();
    let pipeline = store.create_pipeline("app", "rollout").unwrap();
    let task = store
        .create_task(&NewTask {
            pipeline_uid: pipeline.uid,
            stage_id: 1,
            instance_uid: 101,
            database_uid: Some(101),
            name: "Add users".to_string(),
            task_type: TaskType::DatabaseSchemaUpdate,
            payload: r#"{"schemaVersion":"v1"}"#.to_string(),
        })
        .unwrap();
    assert_eq!(store.get_task(task.uid).unwrap(), Some(task.clone()));
    assert_eq!(
        store.get_pipeline(pipeline.uid).await.unwrap(),
        Some(pipeline)
    );

    let run = store.create_task_run(task.uid).await.unwrap();
    assert_eq!(store.list_task_runs(task.uid).unwrap(), vec![run]);
}

#[tokio::test]
async fn sheet_round_trip() {
    let store = DuckDbStore::open_memory().unwrap();
    let sheet = store
        .create_sheet("app", "001_users.sql", "CREATE TABLE users (id INT);")
        .unwrap();
    let found = store.get_sheet(sheet.uid).await.unwrap().unwrap();
    assert_eq!(found.statement, "CREATE TABLE users (id INT);");
    assert_eq!(found.sha256_hex(), sheet.sha256_hex());
}
