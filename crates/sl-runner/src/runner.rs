//! Task runs: creation, supervision, status recording and cancellation.

use crate::error::{RunnerError, RunnerResult};
use crate::registry::ConnectionRegistry;
use crate::task_executor::{run_executor_once, Executor, TaskRunOutcome};
use dashmap::DashMap;
use sl_core::{TaskRecord, TaskRunRecord, TaskRunStatus};
use sl_db::{CancelToken, DriverFactory};
use sl_store::{Store, UpdateTaskRun};
use std::sync::Arc;

/// A finished task run and how it ended
#[derive(Debug)]
pub struct TaskRunReport {
    pub task_run: TaskRunRecord,
    pub outcome: TaskRunOutcome,
}

/// Drives task runs through an [`Executor`].
pub struct TaskRunner {
    store: Arc<dyn Store>,
    executor: Arc<dyn Executor>,
    drivers: Arc<dyn DriverFactory>,
    registry: ConnectionRegistry,
    running: DashMap<i64, CancelToken>,
}

impl TaskRunner {
    pub fn new(
        store: Arc<dyn Store>,
        executor: Arc<dyn Executor>,
        drivers: Arc<dyn DriverFactory>,
        registry: ConnectionRegistry,
    ) -> Self {
        Self {
            store,
            executor,
            drivers,
            registry,
            running: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Create a task run for `task`, execute one attempt and record the
    /// outcome on the run.
    pub async fn run(&self, task: &TaskRecord) -> RunnerResult<TaskRunReport> {
        let created = self
            .store
            .create_task_run(task.uid)
            .await
            .map_err(RunnerError::store("failed to create task run"))?;
        log::info!("Running task {} ({}) as run {}", task.uid, task.task_type, created.uid);

        let cancel = CancelToken::new();
        self.running.insert(created.uid, cancel.clone());
        let outcome = run_executor_once(self.executor.as_ref(), task, created.uid, &cancel).await;
        self.running.remove(&created.uid);

        let status = match &outcome {
            TaskRunOutcome { result: Some(_), .. } => TaskRunStatus::Done,
            TaskRunOutcome {
                error: Some(RunnerError::Canceled),
                ..
            } => TaskRunStatus::Canceled,
            TaskRunOutcome {
                terminated: true, ..
            } => TaskRunStatus::Failed,
            _ => TaskRunStatus::Pending,
        };
        let error = outcome.error.as_ref().map(ToString::to_string);
        if let Some(e) = &error {
            log::warn!("Task run {} ended {}: {}", created.uid, status, e);
        }

        self.store
            .update_task_run(&UpdateTaskRun {
                uid: created.uid,
                status,
                result: outcome.result.clone(),
                error: error.clone(),
            })
            .await
            .map_err(RunnerError::store("failed to update task run"))?;

        Ok(TaskRunReport {
            task_run: TaskRunRecord {
                status,
                result: outcome.result.clone(),
                error,
                ..created
            },
            outcome,
        })
    }

    /// Cancel a running task run by terminating its live connection.
    ///
    /// Returns false when the run is not executing anything.
    pub async fn cancel(&self, task_run_uid: i64) -> RunnerResult<bool> {
        let mut signaled = false;
        if let Some(token) = self.running.get(&task_run_uid) {
            token.cancel();
            signaled = true;
        }
        if let Some(connection_id) = self.registry.connection_id(task_run_uid) {
            let terminated = self
                .drivers
                .terminate_connection(&connection_id)
                .await
                .map_err(|source| RunnerError::Driver {
                    context: format!("failed to terminate connection {connection_id}"),
                    source,
                })?;
            signaled |= terminated;
        }
        Ok(signaled)
    }
}
