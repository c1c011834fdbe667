//! sl-runner - Migration execution engine for Sluice
//!
//! Resolves the context of a migration task, applies it through the
//! begin/run/end protocol with the changelog and revision ledger, and
//! supervises task runs including cancellation and panic containment.

pub mod context;
pub mod error;
pub mod executor;
pub mod registry;
pub mod runner;
pub mod task_executor;

pub use context::{
    MigrationContextResolver, MigrationExecutionContext, MigrationRequest, ReleaseProvenance,
};
pub use error::{RunnerError, RunnerResult};
pub use executor::{BeginOutcome, MigrationExecutor, MigrationOutcome};
pub use registry::ConnectionRegistry;
pub use runner::{TaskRunReport, TaskRunner};
pub use task_executor::{run_executor_once, DatabaseMigrateExecutor, Executor, TaskRunOutcome};
