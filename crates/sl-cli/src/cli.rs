//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use sl_core::TaskType;

/// Sluice - apply versioned database migrations with a durable ledger
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to workspace directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the metadata store and load the catalog from sluice.yml
    Init(InitArgs),

    /// Apply a migration file to a database
    Apply(ApplyArgs),

    /// Show the changelog of a database
    History(TargetArgs),

    /// List versions applied to a database
    Revisions(TargetArgs),
}

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Print the loaded catalog without writing the store
    #[arg(long)]
    pub dry_run: bool,
}

/// Instance and database selecting a migration target
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Instance id from sluice.yml
    #[arg(short, long)]
    pub instance: String,

    /// Database name on the instance
    #[arg(short, long)]
    pub database: String,
}

/// Arguments for the apply command
#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// SQL file to apply (optional for baselines)
    #[arg(short, long)]
    pub file: Option<String>,

    /// Schema version; omit for untracked changes
    #[arg(long, default_value = "")]
    pub schema_version: String,

    /// Kind of migration
    #[arg(short = 'k', long, value_enum, default_value = "migrate")]
    pub kind: MigrationKind,

    /// Project owning the change (defaults to the database's project)
    #[arg(long)]
    pub project: Option<String>,

    /// Issue title to attach the change to
    #[arg(long)]
    pub issue: Option<String>,

    /// Release file the change comes from
    /// (projects/{project}/releases/{release}/files/{file})
    #[arg(long)]
    pub release_file: Option<String>,
}

/// Migration kinds accepted by apply
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationKind {
    /// Record a starting version without running SQL
    Baseline,
    /// Imperative schema change
    Migrate,
    /// Declarative schema change
    Sdl,
    /// Online schema change, copy phase
    GhostSync,
    /// Online schema change, table swap
    GhostCutover,
    /// Data-only change
    Data,
}

impl MigrationKind {
    pub fn task_type(self) -> TaskType {
        match self {
            MigrationKind::Baseline => TaskType::DatabaseSchemaBaseline,
            MigrationKind::Migrate => TaskType::DatabaseSchemaUpdate,
            MigrationKind::Sdl => TaskType::DatabaseSchemaUpdateSdl,
            MigrationKind::GhostSync => TaskType::DatabaseSchemaUpdateGhostSync,
            MigrationKind::GhostCutover => TaskType::DatabaseSchemaUpdateGhostCutover,
            MigrationKind::Data => TaskType::DatabaseDataUpdate,
        }
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
