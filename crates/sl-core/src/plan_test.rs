use super::*;

fn run_with(results: Vec<CheckResult>) -> PlanCheckRun {
    PlanCheckRun {
        uid: 1,
        plan_uid: 1,
        run_type: PlanCheckRunType::DatabaseStatementSummaryReport,
        status: PlanCheckRunStatus::Done,
        config: PlanCheckRunConfig {
            instance_uid: 4,
            database_name: "mydb".to_string(),
            sheet_uid: 9,
        },
        result: Some(PlanCheckRunResult { results }),
    }
}

fn resources(table: &str) -> ChangedResources {
    ChangedResources {
        databases: vec![ChangedDatabase {
            name: "mydb".to_string(),
            schemas: vec![ChangedSchema {
                name: "main".to_string(),
                tables: vec![ChangedTable {
                    name: table.to_string(),
                }],
            }],
        }],
    }
}

#[test]
fn test_targets_matches_instance_database_and_sheet() {
    let run = run_with(vec![]);
    assert!(run.targets(4, "mydb", Some(9)));
    assert!(run.targets(4, "mydb", None));
    assert!(!run.targets(4, "mydb", Some(10)));
    assert!(!run.targets(5, "mydb", Some(9)));
    assert!(!run.targets(4, "other", Some(9)));
}

#[test]
fn test_successful_summary_skips_failed_results() {
    let run = run_with(vec![
        CheckResult {
            status: CheckResultStatus::Error,
            sql_summary_report: Some(SqlSummaryReport {
                changed_resources: Some(resources("wrong")),
                ..Default::default()
            }),
            ..Default::default()
        },
        CheckResult {
            status: CheckResultStatus::Success,
            sql_summary_report: Some(SqlSummaryReport {
                changed_resources: Some(resources("orders")),
                ..Default::default()
            }),
            ..Default::default()
        },
    ]);

    let summary = run.successful_summary().unwrap();
    assert_eq!(summary.changed_resources, Some(resources("orders")));
}

#[test]
fn test_successful_summary_none_without_result() {
    let mut run = run_with(vec![]);
    run.result = None;
    assert!(run.successful_summary().is_none());
}

#[test]
fn test_result_parses_camel_case_json() {
    let json = r#"{"results":[{"status":"SUCCESS","sqlSummaryReport":{"statementTypes":["CREATE_TABLE"],"affectedRows":0,
        "changedResources":{"databases":[{"name":"mydb","schemas":[{"name":"main","tables":[{"name":"t"}]}]}]}}}]}"#;
    let parsed: PlanCheckRunResult = serde_json::from_str(json).unwrap();
    let report = parsed.results[0].sql_summary_report.as_ref().unwrap();
    assert_eq!(report.statement_types, vec!["CREATE_TABLE"]);
    assert_eq!(
        report.changed_resources.as_ref().unwrap().databases[0].schemas[0].tables[0].name,
        "t"
    );
}
