//! Revision: durable proof that a version was applied to a database.
//!
//! At most one revision exists per `(database, version)`; the store enforces
//! it and the executor relies on it to skip already-applied versions.

use serde::{Deserialize, Serialize};

/// Provenance of an applied version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionPayload {
    /// Format: `projects/{project}/releases/{release}`
    #[serde(default)]
    pub release: String,

    /// Format: `projects/{project}/releases/{release}/files/{file}`
    #[serde(default)]
    pub file: String,

    #[serde(default)]
    pub sheet: String,

    #[serde(default)]
    pub sheet_sha256: String,

    #[serde(default)]
    pub task_run: String,
}

/// Insert request for a revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRevision {
    pub database_uid: i64,
    pub version: String,
    pub payload: RevisionPayload,
}

/// A persisted revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub uid: i64,
    pub database_uid: i64,
    pub version: String,
    pub payload: RevisionPayload,
}
