//! Apply command implementation

use anyhow::{Context, Result};
use sl_core::task::TaskReleaseSource;
use sl_core::{DatabaseUpdatePayload, TaskRunStatus};
use sl_db::DuckDbDriverFactory;
use sl_runner::{ConnectionRegistry, DatabaseMigrateExecutor, TaskRunner};
use sl_store::{DriverSchemaSyncer, DuckDbStore, NewTask};
use std::sync::Arc;

use crate::cli::{ApplyArgs, GlobalArgs};
use crate::commands::common::{find_target, load_workspace, open_store, sync_catalog, ExitCode};

/// Execute the apply command
pub async fn execute(args: &ApplyArgs, global: &GlobalArgs) -> Result<()> {
    let workspace = load_workspace(global)?;
    let store = Arc::new(open_store(&workspace)?);
    sync_catalog(&store, &workspace)?;

    let (instance, database) = find_target(&store, &args.target)?;
    let project_id = args.project.clone().unwrap_or_else(|| database.project_id.clone());
    let task_type = args.kind.task_type();

    let pipeline = store.create_pipeline(&project_id, &format!("apply {}", database.database_name))?;
    if let Some(title) = &args.issue {
        store.create_issue(&project_id, Some(pipeline.uid), title)?;
    }

    let sheet_id = match &args.file {
        Some(path) => {
            let statement = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read migration file {path}"))?;
            Some(store.create_sheet(&project_id, path, &statement)?.uid)
        }
        None => None,
    };

    let payload = DatabaseUpdatePayload {
        sheet_id,
        schema_version: args.schema_version.clone(),
        task_release_source: args
            .release_file
            .clone()
            .map(|file| TaskReleaseSource { file }),
    };
    let task = store.create_task(&NewTask {
        pipeline_uid: pipeline.uid,
        stage_id: 1,
        instance_uid: instance.uid,
        database_uid: Some(database.uid),
        name: format!("{} {}", task_type, database.database_name),
        task_type,
        payload: serde_json::to_string(&payload)?,
    })?;

    let runner = build_runner(Arc::clone(&store), &workspace.config.profile);
    let run = runner.run(&task);
    tokio::pin!(run);
    let report = tokio::select! {
        report = &mut run => report,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupt received, canceling...");
            for task_run in store.list_task_runs(task.uid)? {
                runner.cancel(task_run.uid).await?;
            }
            run.await
        }
    }?;

    let task_run = report.task_run;
    match task_run.status {
        TaskRunStatus::Done => {
            let result = task_run.result.unwrap_or_default();
            println!("{}", result.detail);
            if !result.changelog.is_empty() {
                println!("  Changelog: {}", result.changelog);
            }
            Ok(())
        }
        status => {
            eprintln!(
                "Task run {} {}: {}",
                task_run.uid,
                status,
                task_run.error.unwrap_or_default()
            );
            Err(ExitCode(1).into())
        }
    }
}

fn build_runner(store: Arc<DuckDbStore>, profile: &sl_core::Profile) -> TaskRunner {
    let drivers = Arc::new(DuckDbDriverFactory::new());
    let registry = ConnectionRegistry::new();
    let syncer = Arc::new(DriverSchemaSyncer::new(store.clone(), drivers.clone()));
    let executor = Arc::new(DatabaseMigrateExecutor::new(
        store.clone(),
        drivers.clone(),
        syncer,
        registry.clone(),
        profile.clone(),
    ));
    TaskRunner::new(store, executor, drivers, registry)
}

#[cfg(test)]
#[path = "apply_test.rs"]
mod tests;
