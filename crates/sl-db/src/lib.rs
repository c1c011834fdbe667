//! sl-db - Driver layer for Sluice
//!
//! This crate provides the `DriverFactory` / `DriverSession` traits used to
//! reach target databases, the hooks a session reports through while
//! executing, and the bundled DuckDB driver.

pub mod cancel;
pub mod duckdb;
pub mod error;
pub mod options;
pub mod traits;

pub use cancel::CancelToken;
pub use duckdb::{DuckDbDriverFactory, DuckDbSession};
pub use error::{DbError, DbResult};
pub use options::{ConnectionTracker, ExecuteOptions, TaskRunLogger, TrackedConnection};
pub use traits::{ConnectionContext, DriverFactory, DriverSession};
