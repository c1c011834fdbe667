use super::*;
use tempfile::TempDir;

const FULL_CONFIG: &str = r#"
name: warehouse
store:
  path: target/sluice.duckdb
profile:
  deploy_id: deploy-1
  release_version: "3.1.0"
environments:
  - id: test
  - id: prod
    title: Production
projects:
  - id: analytics
    postgres_database_tenant_mode: true
instances:
  - id: local
    engine: duckdb
    data_source: warehouse.duckdb
    environment: test
databases:
  - instance: local
    name: main
    project: analytics
    environment: prod
    secrets:
      PASSWORD: hunter2
"#;

#[test]
fn test_parse_full_config() {
    let config: Config = serde_yaml::from_str(FULL_CONFIG).unwrap();
    config.validate().unwrap();

    assert_eq!(config.name, "warehouse");
    assert_eq!(config.store.path, "target/sluice.duckdb");
    assert_eq!(config.profile.deploy_id, "deploy-1");
    assert_eq!(config.instances[0].engine, Engine::DuckDb);
    assert!(config.projects[0].postgres_database_tenant_mode);

    let db = config.database("local", "main").unwrap();
    assert_eq!(db.environment.as_deref(), Some("prod"));
    assert_eq!(db.secrets.get("PASSWORD").map(String::as_str), Some("hunter2"));
}

#[test]
fn test_defaults_applied() {
    let config: Config = serde_yaml::from_str("name: minimal").unwrap();
    assert_eq!(config.store.path, "sluice.duckdb");
    assert_eq!(config.profile.deploy_id, "local");
    assert!(config.databases.is_empty());
}

#[test]
fn test_unknown_fields_rejected() {
    let result: Result<Config, _> = serde_yaml::from_str("name: x\nbogus: 1");
    assert!(result.is_err());
}

#[test]
fn test_validate_rejects_unknown_references() {
    let config: Config = serde_yaml::from_str(
        r#"
name: x
projects: [{id: p}]
instances: [{id: i, data_source: ":memory:"}]
databases: [{instance: missing, name: main, project: p}]
"#,
    )
    .unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Unknown instance 'missing'"));
}

#[test]
fn test_validate_rejects_duplicate_database() {
    let config: Config = serde_yaml::from_str(
        r#"
name: x
projects: [{id: p}]
instances: [{id: i, data_source: ":memory:"}]
databases:
  - {instance: i, name: main, project: p}
  - {instance: i, name: main, project: p}
"#,
    )
    .unwrap();
    assert!(matches!(
        config.validate(),
        Err(CoreError::ConfigInvalid { .. })
    ));
}

#[test]
fn test_load_from_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("sluice.yml"), FULL_CONFIG).unwrap();

    let config = Config::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.name, "warehouse");
}

#[test]
fn test_load_from_dir_missing() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        Config::load_from_dir(dir.path()),
        Err(CoreError::ConfigNotFound { .. })
    ));
}
