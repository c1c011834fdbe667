//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use sl_core::{Config, DatabaseRecord, InstanceRecord};
use sl_store::{DuckDbStore, NewDatabase, NewInstance};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cli::{GlobalArgs, TargetArgs};

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run before the process ends.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; never shown to the user.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Loaded configuration and the directory it is resolved against
pub(crate) struct Workspace {
    pub config: Config,
    pub root: PathBuf,
}

impl Workspace {
    /// Path of the metadata store; relative paths resolve against the root
    pub fn store_path(&self) -> String {
        resolve_path(&self.root, &self.config.store.path)
    }
}

/// Resolve `path` against `root` unless it is absolute or `:memory:`
pub(crate) fn resolve_path(root: &Path, path: &str) -> String {
    if path == ":memory:" || Path::new(path).is_absolute() {
        path.to_string()
    } else {
        root.join(path).display().to_string()
    }
}

/// Load sluice.yml from the global arguments
pub(crate) fn load_workspace(global: &GlobalArgs) -> Result<Workspace> {
    let root = PathBuf::from(&global.project_dir);
    let config = match &global.config {
        Some(path) => Config::load(Path::new(path)),
        None => Config::load_from_dir(&root),
    }
    .context("Failed to load sluice.yml")?;
    Ok(Workspace { config, root })
}

/// Open the metadata store, applying schema migrations
pub(crate) fn open_store(workspace: &Workspace) -> Result<DuckDbStore> {
    let path = workspace.store_path();
    DuckDbStore::new(&path).with_context(|| format!("Failed to open metadata store at {path}"))
}

/// Counts of catalog rows written by [`sync_catalog`]
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CatalogSummary {
    pub environments: usize,
    pub projects: usize,
    pub instances: usize,
    pub databases: usize,
}

/// Upsert every environment, project, instance and database in the config.
///
/// Instance data sources are resolved against the workspace root.
pub(crate) fn sync_catalog(store: &DuckDbStore, workspace: &Workspace) -> Result<CatalogSummary> {
    let config = &workspace.config;
    let mut summary = CatalogSummary::default();

    for env in &config.environments {
        store
            .upsert_environment(&env.id, env.title.as_deref().unwrap_or(&env.id))
            .with_context(|| format!("Failed to write environment '{}'", env.id))?;
        summary.environments += 1;
    }
    for project in &config.projects {
        store
            .upsert_project(
                &project.id,
                project.title.as_deref().unwrap_or(&project.id),
                project.postgres_database_tenant_mode,
            )
            .with_context(|| format!("Failed to write project '{}'", project.id))?;
        summary.projects += 1;
    }
    for instance in &config.instances {
        store
            .upsert_instance(&NewInstance {
                resource_id: instance.id.clone(),
                engine: instance.engine,
                data_source: resolve_path(&workspace.root, &instance.data_source),
                environment_id: instance.environment.clone(),
            })
            .with_context(|| format!("Failed to write instance '{}'", instance.id))?;
        summary.instances += 1;
    }
    for db in &config.databases {
        store
            .upsert_database(&NewDatabase {
                instance_id: db.instance.clone(),
                database_name: db.name.clone(),
                project_id: db.project.clone(),
                environment_id: db.environment.clone(),
                secrets: db.secrets.clone(),
            })
            .with_context(|| format!("Failed to write database '{}/{}'", db.instance, db.name))?;
        summary.databases += 1;
    }

    Ok(summary)
}

/// Look up the instance and database named by `target`
pub(crate) fn find_target(
    store: &DuckDbStore,
    target: &TargetArgs,
) -> Result<(InstanceRecord, DatabaseRecord)> {
    let instance = store
        .find_instance(&target.instance)?
        .with_context(|| format!("Instance '{}' not found; run `sluice init` first", target.instance))?;
    let database = store
        .find_database(&target.instance, &target.database)?
        .with_context(|| {
            format!(
                "Database '{}' not found on instance '{}'",
                target.database, target.instance
            )
        })?;
    Ok((instance, database))
}

#[cfg(test)]
#[path = "common_test.rs"]
pub(crate) mod tests;
