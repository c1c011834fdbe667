//! Configuration types and parsing for sluice.yml

use crate::catalog::Engine;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Main configuration from sluice.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Workspace name
    pub name: String,

    /// Metadata store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Identity of this deployment
    #[serde(default)]
    pub profile: Profile,

    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,

    #[serde(default)]
    pub projects: Vec<ProjectConfig>,

    #[serde(default)]
    pub instances: Vec<InstanceConfig>,

    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

/// Metadata store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// DuckDB file holding changelogs, revisions and the catalog (or :memory:)
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Deployment identity stamped on logs and migration records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// Identifier of the running deployment
    #[serde(default = "default_deploy_id")]
    pub deploy_id: String,

    /// Version of the running release
    #[serde(default = "default_release_version")]
    pub release_version: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            deploy_id: default_deploy_id(),
            release_version: default_release_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Connect to Postgres databases as their owner
    #[serde(default)]
    pub postgres_database_tenant_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    pub id: String,
    #[serde(default)]
    pub engine: Engine,
    /// Connection target (file path or :memory: for DuckDB)
    pub data_source: String,
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub instance: String,
    pub name: String,
    pub project: String,
    /// Overrides the instance environment
    #[serde(default)]
    pub environment: Option<String>,
    /// Values for `${{ secrets.NAME }}` placeholders
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
}

const DEFAULT_STORE_PATH: &str = "sluice.duckdb";

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}

fn default_deploy_id() -> String {
    "local".to_string()
}

fn default_release_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory
    /// Looks for sluice.yml or sluice.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("sluice.yml");
        let yaml_path = dir.join("sluice.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Find a configured database by instance id and name
    pub fn database(&self, instance: &str, name: &str) -> Option<&DatabaseConfig> {
        self.databases
            .iter()
            .find(|d| d.instance == instance && d.name == name)
    }

    /// Validate names and cross references
    fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(invalid("Workspace name cannot be empty"));
        }

        let environments = unique_ids("environment", self.environments.iter().map(|e| &e.id))?;
        let projects = unique_ids("project", self.projects.iter().map(|p| &p.id))?;
        let instances = unique_ids("instance", self.instances.iter().map(|i| &i.id))?;

        for instance in &self.instances {
            if instance.data_source.is_empty() {
                return Err(invalid(format!(
                    "Instance '{}' has an empty data_source",
                    instance.id
                )));
            }
            check_ref("environment", &environments, instance.environment.as_deref())?;
        }

        let mut seen = HashSet::new();
        for db in &self.databases {
            if db.name.is_empty() {
                return Err(invalid(format!(
                    "Database on instance '{}' has an empty name",
                    db.instance
                )));
            }
            if !seen.insert((db.instance.as_str(), db.name.as_str())) {
                return Err(invalid(format!(
                    "Duplicate database '{}' on instance '{}'",
                    db.name, db.instance
                )));
            }
            check_ref("instance", &instances, Some(db.instance.as_str()))?;
            check_ref("project", &projects, Some(db.project.as_str()))?;
            check_ref("environment", &environments, db.environment.as_deref())?;
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::ConfigInvalid {
        message: message.into(),
    }
}

fn unique_ids<'a>(
    kind: &str,
    ids: impl Iterator<Item = &'a String>,
) -> CoreResult<HashSet<&'a str>> {
    let mut set = HashSet::new();
    for id in ids {
        if id.is_empty() {
            return Err(invalid(format!("Empty {kind} id")));
        }
        if !set.insert(id.as_str()) {
            return Err(invalid(format!("Duplicate {kind} id '{id}'")));
        }
    }
    Ok(set)
}

fn check_ref(kind: &str, known: &HashSet<&str>, id: Option<&str>) -> CoreResult<()> {
    match id {
        Some(id) if !known.contains(id) => Err(invalid(format!("Unknown {kind} '{id}'"))),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
