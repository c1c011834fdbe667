//! sl-store - Metadata store for Sluice
//!
//! Provides the `Store` trait consumed by the execution core, a DuckDB-backed
//! implementation holding the catalog, changelogs, revisions, task runs and
//! schema history, and the `SchemaSyncer` that snapshots target databases.

pub mod catalog;
pub mod connection;
pub mod ddl;
pub mod error;
pub mod migration;
pub mod schema_sync;
pub mod store;
pub mod traits;

pub use catalog::{NewDatabase, NewInstance, NewPlanCheckRun, NewTask};
pub use connection::DuckDbStore;
pub use error::{StoreError, StoreResult};
pub use schema_sync::{DriverSchemaSyncer, SchemaSyncer};
pub use traits::{FindIssue, FindPlan, FindPlanCheckRun, FindRevision, Store, UpdateTaskRun};
