use super::*;
use crate::catalog::{NewDatabase, NewInstance};
use crate::DuckDbStore;
use sl_core::Engine;
use sl_db::{CancelToken, DuckDbDriverFactory, ExecuteOptions};
use std::collections::BTreeMap;

#[tokio::test]
async fn test_sync_persists_driver_snapshot() {
    let store = Arc::new(DuckDbStore::open_memory().unwrap());
    let drivers = Arc::new(DuckDbDriverFactory::new());

    let instance = store
        .upsert_instance(&NewInstance {
            resource_id: "local".to_string(),
            engine: Engine::DuckDb,
            data_source: ":memory:".to_string(),
            environment_id: None,
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

    let session = drivers
        .get_admin_driver(&instance, Some(&database), ConnectionContext::default())
        .await
        .unwrap();
    session
        .execute(
            "CREATE TABLE users (id INTEGER)",
            &ExecuteOptions::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();
    session.close();

    let syncer = DriverSchemaSyncer::new(store.clone(), drivers.clone());
    let uid = syncer.sync_schema_to_history(&database).await.unwrap();

    let history = store.get_sync_history(uid).unwrap().unwrap();
    assert_eq!(history.database_uid, database.uid);
    assert!(history.schema.table("main", "users").is_some());
    assert_eq!(drivers.live_sessions(), 0, "sync session must be closed");
}

#[tokio::test]
async fn test_sync_unknown_instance() {
    let store = Arc::new(DuckDbStore::open_memory().unwrap());
    let syncer = DriverSchemaSyncer::new(store, Arc::new(DuckDbDriverFactory::new()));
    let database = DatabaseRecord {
        uid: 1,
        instance_uid: 999,
        instance_id: "ghost".to_string(),
        project_id: "app".to_string(),
        environment_id: None,
        database_name: "db".to_string(),
        secrets: BTreeMap::new(),
    };
    let err = syncer.sync_schema_to_history(&database).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}
