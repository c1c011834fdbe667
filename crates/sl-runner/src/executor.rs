//! The three-phase migration protocol.
//!
//! ```text
//! START -> BEGIN -> (SKIP | RUN) -> END -> DONE
//! BEGIN -> ERROR   no ledger entry
//! RUN   -> ERROR   ledger finalized as Failed
//! ```
//!
//! BEGIN, RUN and END commit separately. A crash between them leaves a
//! `Pending` changelog carrying only the pre-snapshot.

use crate::context::MigrationExecutionContext;
use crate::error::{RunnerError, RunnerResult};
use futures::FutureExt;
use sl_core::resource_name::format_changelog;
use sl_core::statement::{
    redact_secrets, render_statement, truncate_statement, MAX_STATEMENT_RECORD_SIZE,
};
use sl_core::{
    AnomalyType, ChangelogPayload, ChangelogStatus, CreateChangelog, CreateRevision,
    MigrationInfo, MigrationType, RevisionPayload, TaskRunResult, UpdateChangelog,
};
use sl_db::{CancelToken, DbError, DriverSession, ExecuteOptions};
use sl_store::{FindRevision, SchemaSyncer, Store};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Result of BEGIN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The version already has a revision; nothing was written
    Skipped,
    /// A pending changelog was created
    Started { changelog_uid: i64 },
}

/// Result of a full begin/run/end pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Skipped,
    Applied { changelog_uid: i64 },
}

pub struct MigrationExecutor {
    store: Arc<dyn Store>,
    syncer: Arc<dyn SchemaSyncer>,
}

impl MigrationExecutor {
    pub fn new(store: Arc<dyn Store>, syncer: Arc<dyn SchemaSyncer>) -> Self {
        Self { store, syncer }
    }

    /// BEGIN: idempotency check, pre-snapshot and pending changelog.
    pub async fn begin_migration(
        &self,
        info: &MigrationInfo,
        ctx: &MigrationExecutionContext,
        opts: &ExecuteOptions,
    ) -> RunnerResult<BeginOutcome> {
        // Revisions may also be created outside the runner, so this check is
        // authoritative at execution time.
        if !ctx.version.is_empty() {
            let applied = self
                .store
                .list_revisions(&FindRevision {
                    database_uid: ctx.database.uid,
                    version: Some(ctx.version.clone()),
                })
                .await
                .map_err(RunnerError::store("failed to list revisions"))?;
            if !applied.is_empty() {
                log::info!(
                    "Version {} already applied to database {}, skipping",
                    ctx.version,
                    ctx.database.database_name
                );
                return Ok(BeginOutcome::Skipped);
            }
        }

        let prev_sync_history_uid = if info.capabilities().needs_dump {
            opts.log_database_sync_start().await;
            match self.syncer.sync_schema_to_history(&ctx.database).await {
                Ok(uid) => {
                    opts.log_database_sync_end("").await;
                    Some(uid)
                }
                Err(e) => {
                    opts.log_database_sync_end(&e.to_string()).await;
                    return Err(RunnerError::Sync(e));
                }
            }
        } else {
            None
        };

        let changelog_uid = self
            .store
            .create_changelog(&CreateChangelog {
                database_uid: ctx.database.uid,
                prev_sync_history_uid,
                payload: ChangelogPayload {
                    task_run: ctx.task_run_name.clone(),
                    issue: ctx.issue_name.clone(),
                    revision: 0,
                    changed_resources: info.payload.changed_resources.clone(),
                    sheet: ctx.sheet_name.clone(),
                    version: ctx.version.clone(),
                    change_type: ctx.task.task_type.changelog_type(),
                },
            })
            .await
            .map_err(RunnerError::store("failed to create changelog"))?;

        Ok(BeginOutcome::Started { changelog_uid })
    }

    /// RUN: render secrets and execute, unless the type or an empty
    /// statement makes this a no-op.
    pub async fn run_statement(
        &self,
        info: &MigrationInfo,
        ctx: &MigrationExecutionContext,
        session: &dyn DriverSession,
        opts: &ExecuteOptions,
        cancel: &CancelToken,
    ) -> RunnerResult<()> {
        if !info.executes(&ctx.statement) {
            return Ok(());
        }

        let rendered = render_statement(&ctx.statement, &ctx.database.secrets);

        session
            .execute(&rendered, opts, cancel)
            .await
            .map_err(|e| execution_error(ctx, e))
    }

    /// END: post-snapshot, revision on success, terminal changelog status.
    pub async fn end_migration(
        &self,
        info: &MigrationInfo,
        ctx: &MigrationExecutionContext,
        changelog_uid: i64,
        is_done: bool,
    ) -> RunnerResult<()> {
        let mut update = UpdateChangelog {
            uid: changelog_uid,
            status: ChangelogStatus::Failed,
            sync_history_uid: None,
            revision_uid: None,
        };

        if info.capabilities().needs_dump {
            match self.syncer.sync_schema_to_history(&ctx.database).await {
                Ok(uid) => update.sync_history_uid = Some(uid),
                Err(e) => log::warn!(
                    "Failed to sync schema of database {} after migration: {}",
                    ctx.database.database_name,
                    e
                ),
            }
        }

        if is_done {
            if !ctx.version.is_empty() {
                match self.store.create_revision(&revision_for(ctx)).await {
                    Ok(revision) => update.revision_uid = Some(revision.uid),
                    Err(e) => {
                        // Leave no pending row behind when the revision
                        // cannot be recorded.
                        if let Err(update_err) = self.store.update_changelog(&update).await {
                            log::error!(
                                "Failed to mark changelog {} failed: {}",
                                changelog_uid,
                                update_err
                            );
                        }
                        return Err(RunnerError::Store {
                            context: "failed to create revision".to_string(),
                            source: e,
                        });
                    }
                }
            }
            update.status = ChangelogStatus::Done;
        }

        self.store
            .update_changelog(&update)
            .await
            .map_err(RunnerError::store("failed to update changelog"))
    }

    /// BEGIN, then RUN with END as a guaranteed finalizer.
    ///
    /// A panic inside RUN still finalizes the changelog as `Failed` and is
    /// then resumed for the supervisor to contain.
    pub async fn execute_migration(
        &self,
        info: &MigrationInfo,
        ctx: &MigrationExecutionContext,
        session: &dyn DriverSession,
        opts: &ExecuteOptions,
        cancel: &CancelToken,
    ) -> RunnerResult<MigrationOutcome> {
        let changelog_uid = match self.begin_migration(info, ctx, opts).await? {
            BeginOutcome::Skipped => return Ok(MigrationOutcome::Skipped),
            BeginOutcome::Started { changelog_uid } => changelog_uid,
        };

        let run = AssertUnwindSafe(self.run_statement(info, ctx, session, opts, cancel))
            .catch_unwind()
            .await;

        match run {
            Ok(Ok(())) => {
                self.end_migration(info, ctx, changelog_uid, true).await?;
                Ok(MigrationOutcome::Applied { changelog_uid })
            }
            Ok(Err(run_err)) => {
                if let Err(e) = self.end_migration(info, ctx, changelog_uid, false).await {
                    log::error!("Failed to end migration: {}", e);
                }
                Err(run_err)
            }
            Err(panic) => {
                if let Err(e) = self.end_migration(info, ctx, changelog_uid, false).await {
                    log::error!("Failed to end migration after panic: {}", e);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Result reported for a finished attempt; clears schema drift after a
    /// successful migration.
    pub async fn post_migration(
        &self,
        info: &MigrationInfo,
        ctx: &MigrationExecutionContext,
        outcome: MigrationOutcome,
    ) -> TaskRunResult {
        let changelog_uid = match outcome {
            MigrationOutcome::Skipped => {
                return TaskRunResult {
                    detail: format!(
                        "Task skipped because version {} has been applied",
                        ctx.version
                    ),
                    ..Default::default()
                }
            }
            MigrationOutcome::Applied { changelog_uid } => changelog_uid,
        };

        log::debug!(
            "Post migration on instance {} database {}",
            ctx.instance.resource_id,
            ctx.database.database_name
        );

        if let Err(e) = self
            .store
            .delete_anomaly(ctx.database.uid, AnomalyType::DatabaseSchemaDrift)
            .await
        {
            log::error!(
                "Failed to archive {} anomaly of database {}: {}",
                AnomalyType::DatabaseSchemaDrift,
                ctx.database.database_name,
                e
            );
        }

        let detail = if info.migration_type == MigrationType::Baseline {
            format!(
                "Established baseline version {} for database {:?}.",
                ctx.version, ctx.database.database_name
            )
        } else {
            format!(
                "Applied migration version {} to database {:?}.",
                ctx.version, ctx.database.database_name
            )
        };

        TaskRunResult {
            detail,
            changelog: format_changelog(
                &ctx.instance.resource_id,
                &ctx.database.database_name,
                changelog_uid,
            ),
            version: ctx.version.clone(),
        }
    }
}

fn revision_for(ctx: &MigrationExecutionContext) -> CreateRevision {
    let mut payload = RevisionPayload {
        release: ctx.release.release.clone(),
        file: ctx.release.file.clone(),
        task_run: ctx.task_run_name.clone(),
        ..Default::default()
    };
    if let Some(sheet) = &ctx.sheet {
        payload.sheet = ctx.sheet_name.clone();
        payload.sheet_sha256 = sheet.sha256_hex();
    }
    CreateRevision {
        database_uid: ctx.database.uid,
        version: ctx.version.clone(),
        payload,
    }
}

/// Error text uses the unrendered statement and has secrets redacted.
fn execution_error(ctx: &MigrationExecutionContext, err: DbError) -> RunnerError {
    if err.is_canceled() {
        return RunnerError::Canceled;
    }
    let (statement, _) = truncate_statement(&ctx.statement, MAX_STATEMENT_RECORD_SIZE);
    RunnerError::Execution {
        statement: statement.to_string(),
        message: redact_secrets(&err.to_string(), &ctx.database.secrets),
    }
}
