//! Live connection ids of running task runs.

use dashmap::DashMap;
use sl_db::ConnectionTracker;
use std::sync::Arc;

/// Maps a task-run uid to the connection currently executing its statement.
///
/// Cancellation looks the connection up here and terminates it out-of-band.
/// Entries are written through [`RegistryTracker`] and removed when the
/// driver's tracking guard drops, so every exit path releases them.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    entries: Arc<DashMap<i64, String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that records connection ids under `task_run_uid`
    pub fn tracker(&self, task_run_uid: i64) -> Arc<dyn ConnectionTracker> {
        Arc::new(RegistryTracker {
            entries: Arc::clone(&self.entries),
            task_run_uid,
        })
    }

    pub fn connection_id(&self, task_run_uid: i64) -> Option<String> {
        self.entries.get(&task_run_uid).map(|e| e.value().clone())
    }

    pub fn contains(&self, task_run_uid: i64) -> bool {
        self.entries.contains_key(&task_run_uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct RegistryTracker {
    entries: Arc<DashMap<i64, String>>,
    task_run_uid: i64,
}

impl ConnectionTracker for RegistryTracker {
    fn set_connection_id(&self, connection_id: &str) {
        self.entries
            .insert(self.task_run_uid, connection_id.to_string());
    }

    fn delete_connection_id(&self) {
        self.entries.remove(&self.task_run_uid);
    }
}
