//! Point-in-time schema snapshots.

use serde::{Deserialize, Serialize};

/// Schema of a database as dumped by a driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<TableSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl SchemaSnapshot {
    /// Look up a table by schema and name.
    pub fn table(&self, schema: &str, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.schema == schema && t.name == name)
    }
}

/// A persisted snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHistoryRecord {
    pub uid: i64,
    pub database_uid: i64,
    pub schema: SchemaSnapshot,
}
