//! Task executors and the panic-containing supervisor around them.

use crate::context::{MigrationContextResolver, MigrationExecutionContext, MigrationRequest};
use crate::error::{RunnerError, RunnerResult};
use crate::executor::MigrationExecutor;
use crate::registry::ConnectionRegistry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use sl_core::statement::{redact_secrets, truncate_statement, MAX_STATEMENT_RECORD_SIZE};
use sl_core::{Profile, TaskRecord, TaskRunLog, TaskRunResult};
use sl_db::{
    CancelToken, ConnectionContext, DbError, DbResult, DriverFactory, DriverSession,
    ExecuteOptions, TaskRunLogger,
};
use sl_store::{SchemaSyncer, Store};
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Chain a panic hook that keeps the backtrace of the panic site for the
/// supervisor running on the same thread.
fn install_panic_backtrace_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = PANIC_BACKTRACE
                .try_with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

/// Backtrace of the most recent panic on this thread, if not yet taken
fn take_panic_backtrace() -> Option<Backtrace> {
    PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// Runs one attempt of a task.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run_once(
        &self,
        task: &TaskRecord,
        task_run_uid: i64,
        cancel: &CancelToken,
    ) -> RunnerResult<TaskRunResult>;
}

/// Result of a supervised attempt
#[derive(Debug)]
pub struct TaskRunOutcome {
    /// The task run should not be retried
    pub terminated: bool,
    pub result: Option<TaskRunResult>,
    pub error: Option<RunnerError>,
}

/// Run `executor` once, converting a panic into a terminal error.
pub async fn run_executor_once(
    executor: &dyn Executor,
    task: &TaskRecord,
    task_run_uid: i64,
    cancel: &CancelToken,
) -> TaskRunOutcome {
    install_panic_backtrace_hook();
    let attempt = AssertUnwindSafe(executor.run_once(task, task_run_uid, cancel))
        .catch_unwind()
        .await;
    match attempt {
        Ok(Ok(result)) => TaskRunOutcome {
            terminated: true,
            result: Some(result),
            error: None,
        },
        Ok(Err(e)) => TaskRunOutcome {
            terminated: e.is_terminal(),
            result: None,
            error: Some(e),
        },
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            // The panic unwinds to here within the same poll, so the hook
            // recorded it on this thread.
            let backtrace = take_panic_backtrace()
                .map(|bt| bt.to_string())
                .unwrap_or_else(|| "<backtrace unavailable>".to_string());
            log::error!(
                "Task executor panicked on task {} run {}: {}\n{}",
                task.uid,
                task_run_uid,
                message,
                backtrace
            );
            TaskRunOutcome {
                terminated: true,
                result: None,
                error: Some(RunnerError::Panic(message)),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Executor for every task type that maps to a migration type.
pub struct DatabaseMigrateExecutor {
    store: Arc<dyn Store>,
    drivers: Arc<dyn DriverFactory>,
    registry: ConnectionRegistry,
    profile: Profile,
    resolver: MigrationContextResolver,
    migrations: MigrationExecutor,
}

impl DatabaseMigrateExecutor {
    pub fn new(
        store: Arc<dyn Store>,
        drivers: Arc<dyn DriverFactory>,
        syncer: Arc<dyn SchemaSyncer>,
        registry: ConnectionRegistry,
        profile: Profile,
    ) -> Self {
        Self {
            resolver: MigrationContextResolver::new(Arc::clone(&store), profile.clone()),
            migrations: MigrationExecutor::new(Arc::clone(&store), syncer),
            store,
            drivers,
            registry,
            profile,
        }
    }

    fn execute_options(&self, ctx: &MigrationExecutionContext) -> ExecuteOptions {
        let mut opts = ExecuteOptions {
            connection_tracker: Some(self.registry.tracker(ctx.task_run_uid)),
            task_run_logger: None,
        };
        if ctx.task.task_type.records_task_run_log() && ctx.instance.engine.supports_task_run_log()
        {
            opts.task_run_logger = Some(Arc::new(StoreTaskRunLogger {
                store: Arc::clone(&self.store),
                task_run_uid: ctx.task_run_uid,
                deploy_id: self.profile.deploy_id.clone(),
                secrets: ctx.database.secrets.clone(),
                max_statement_size: MAX_STATEMENT_RECORD_SIZE,
            }));
        }
        opts
    }
}

/// Closes the session on every exit path, unwinding included.
struct SessionGuard(Box<dyn DriverSession>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[async_trait]
impl Executor for DatabaseMigrateExecutor {
    async fn run_once(
        &self,
        task: &TaskRecord,
        task_run_uid: i64,
        cancel: &CancelToken,
    ) -> RunnerResult<TaskRunResult> {
        let migration_type = task
            .task_type
            .migration_type()
            .ok_or(RunnerError::UnsupportedTask(task.task_type))?;

        let payload = task.database_update_payload().map_err(|e| {
            RunnerError::InvalidPayload(format!("failed to unmarshal task payload: {e}"))
        })?;

        let statement = match payload.sheet_id {
            Some(sheet_uid) => {
                self.store
                    .get_sheet(sheet_uid)
                    .await
                    .map_err(RunnerError::resolve("failed to get sheet"))?
                    .ok_or_else(|| RunnerError::not_found("sheet", sheet_uid))?
                    .statement
            }
            None => String::new(),
        };

        let (info, ctx) = self
            .resolver
            .resolve(&MigrationRequest {
                task,
                task_run_uid,
                migration_type,
                statement: &statement,
                schema_version: &payload.schema_version,
                sheet_uid: payload.sheet_id,
            })
            .await?;

        let session = self
            .drivers
            .get_admin_driver(
                &ctx.instance,
                Some(&ctx.database),
                ConnectionContext {
                    use_database_owner: ctx.use_database_owner,
                },
            )
            .await
            .map_err(|source| RunnerError::Driver {
                context: format!(
                    "failed to get driver connection for instance {:?}",
                    ctx.instance.resource_id
                ),
                source,
            })?;
        let session = SessionGuard(session);

        let opts = self.execute_options(&ctx);
        log::debug!(
            "Start {} migration on {}/{} for task {}: {}",
            migration_type,
            ctx.instance.resource_id,
            ctx.database.database_name,
            task.uid,
            truncate_statement(&ctx.statement, 200).0
        );

        let outcome = self
            .migrations
            .execute_migration(&info, &ctx, session.0.as_ref(), &opts, cancel)
            .await?;
        drop(session);

        Ok(self.migrations.post_migration(&info, &ctx, outcome).await)
    }
}

/// Persists driver progress events for one task run, secrets redacted.
///
/// Statements are redacted before they are cut to `max_statement_size`, so
/// a secret straddling the cut never leaves a plaintext prefix behind.
struct StoreTaskRunLogger {
    store: Arc<dyn Store>,
    task_run_uid: i64,
    deploy_id: String,
    secrets: BTreeMap<String, String>,
    max_statement_size: usize,
}

impl StoreTaskRunLogger {
    fn redact(&self, entry: TaskRunLog) -> TaskRunLog {
        let redact = |text: String| redact_secrets(&text, &self.secrets);
        match entry {
            TaskRunLog::DatabaseSyncStart => TaskRunLog::DatabaseSyncStart,
            TaskRunLog::DatabaseSyncEnd { error } => TaskRunLog::DatabaseSyncEnd {
                error: redact(error),
            },
            TaskRunLog::CommandExecute { statement } => {
                let statement = redact(statement);
                let (statement, _) = truncate_statement(&statement, self.max_statement_size);
                TaskRunLog::CommandExecute {
                    statement: statement.to_string(),
                }
            }
            TaskRunLog::CommandResponse { error } => TaskRunLog::CommandResponse {
                error: redact(error),
            },
        }
    }
}

#[async_trait]
impl TaskRunLogger for StoreTaskRunLogger {
    async fn create_task_run_log(&self, at: DateTime<Utc>, entry: TaskRunLog) -> DbResult<()> {
        let entry = self.redact(entry);
        self.store
            .create_task_run_log(self.task_run_uid, at, &self.deploy_id, &entry)
            .await
            .map_err(|e| DbError::Internal(e.to_string()))
    }
}

#[cfg(test)]
#[path = "task_executor_test.rs"]
mod tests;
