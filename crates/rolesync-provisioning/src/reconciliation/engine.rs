//! Reconciliation engine orchestrator.
//!
//! Main entry point for synchronisation runs and source inspection.

use chrono::Utc;
use futures::TryStreamExt;
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use rolesync_connector::{SelectQuery, SourceConnection, SourceConnector};
use rolesync_core::{
    AssignmentKey, AssignmentStore, ContextId, LocalUserField, MutationOutcome, RoleCatalog,
    RoleId, TargetResult, TargetSystem, UserCatalog, UserMatch,
};

use super::config::{RemoveAction, SyncConfig};
use super::error::{ReconciliationResult, SkipReason, SyncError};
use super::index::CurrentAssignmentIndex;
use super::report::SyncReport;
use super::row::{NormalizedRow, RowAccessor};
use super::statistics::SyncCounters;
use super::trace::{ProgressTrace, TraceLevel};

/// What the first row of the source table looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableInspection {
    /// The table has no rows.
    Empty,
    /// Column names of the first row, lower-cased, in source order.
    Columns(Vec<String>),
}

impl Display for TableInspection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TableInspection::Empty => f.write_str("External table is empty."),
            TableInspection::Columns(columns) => write!(
                f,
                "External table contains following columns: {}",
                columns.join(", ")
            ),
        }
    }
}

/// Lookups already answered during the current run.
#[derive(Default)]
struct LookupCache {
    roles: HashMap<String, Option<RoleId>>,
    users: HashMap<String, UserMatch>,
}

/// Mutable state of one run. Dropped when the run returns.
struct RunState {
    context: ContextId,
    index: CurrentAssignmentIndex,
    /// Keys confirmed by earlier rows, so repeated rows cause no extra grants.
    confirmed: HashSet<AssignmentKey>,
    cache: LookupCache,
}

/// Synchronises role assignments from an external source into a target system.
pub struct ReconciliationEngine {
    connector: Arc<dyn SourceConnector>,
    target: Arc<dyn TargetSystem>,
}

impl ReconciliationEngine {
    /// Create a new engine.
    #[must_use]
    pub fn new(connector: Arc<dyn SourceConnector>, target: Arc<dyn TargetSystem>) -> Self {
        Self { connector, target }
    }

    /// Run one synchronisation pass.
    ///
    /// Never fails: aborts and failures are reported through the returned
    /// [`SyncReport`] and the trace. The trace always receives `finished()`.
    #[instrument(skip_all, fields(table = %config.remote_table, source = %self.connector.display_name()))]
    pub async fn sync(&self, config: &SyncConfig, trace: &dyn ProgressTrace) -> SyncReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut counters = SyncCounters::new();

        info!(run_id = %run_id, remove_action = %config.remove_action, "Starting role synchronisation");
        trace.output(TraceLevel::Summary, "Starting System role synchronisation...");

        let outcome = self.run(config, trace, &mut counters).await;
        match &outcome {
            Ok(()) => info!(
                run_id = %run_id,
                granted = counters.granted,
                revoked = counters.revoked,
                unchanged = counters.unchanged,
                skipped = counters.skipped,
                "Role synchronisation completed"
            ),
            Err(err) => warn!(
                run_id = %run_id,
                error = %err,
                code = err.error_code(),
                "Role synchronisation stopped"
            ),
        }

        let report = SyncReport::new(
            run_id,
            self.connector.display_name(),
            config.remote_table.as_str(),
            started_at,
            counters,
            outcome.as_ref().map(|_| ()),
        );
        for line in report.summary_lines() {
            trace.output(TraceLevel::Summary, &line);
        }
        trace.finished();
        report
    }

    /// Connect to the source and report the columns of its first row.
    pub async fn inspect_source(&self, config: &SyncConfig) -> ReconciliationResult<TableInspection> {
        inspect_source(self.connector.as_ref(), config).await
    }

    async fn run(
        &self,
        config: &SyncConfig,
        trace: &dyn ProgressTrace,
        counters: &mut SyncCounters,
    ) -> ReconciliationResult<()> {
        if let Err(err) = config.check_complete() {
            trace.output(TraceLevel::Summary, "Sync configuration not complete.");
            return Err(err);
        }

        let mut connection = match self.connector.connect().await {
            Ok(connection) => connection,
            Err(err) => {
                trace.output(
                    TraceLevel::Summary,
                    "Error while communicating with external database",
                );
                return Err(SyncError::ConnectFailure(err));
            }
        };

        let read = self
            .read_source(connection.as_mut(), config, trace, counters)
            .await;
        if let Err(err) = connection.close().await {
            warn!(error = %err, "Failed to close external source connection");
        }
        let state = read?;

        match config.remove_action {
            RemoveAction::Remove => self.revoke_unclaimed(&state, trace, counters).await,
            RemoveAction::Keep => {
                debug!(
                    unclaimed = state.index.len(),
                    "Keeping assignments missing from the external source"
                );
            }
        }
        Ok(())
    }

    /// Safety check, snapshot and stream phases. The caller owns the connection.
    async fn read_source(
        &self,
        connection: &mut dyn SourceConnection,
        config: &SyncConfig,
        trace: &dyn ProgressTrace,
        counters: &mut SyncCounters,
    ) -> ReconciliationResult<RunState> {
        if config.min_records > 0 {
            let count = connection
                .count(&config.remote_table)
                .await
                .map_err(SyncError::ReadFailure)?;
            if count <= config.min_records {
                trace.output(
                    TraceLevel::Summary,
                    &format!(
                        "Failed to sync because the external db returned {count} records and the minimum required is {}",
                        config.min_records
                    ),
                );
                return Err(SyncError::InsufficientRecords {
                    count,
                    min_records: config.min_records,
                });
            }
            debug!(count, min_records = config.min_records, "Source row count accepted");
        }

        trace.output(TraceLevel::Summary, "Indexing current role assignments");
        let context = self
            .target
            .system_context()
            .await
            .map_err(SyncError::Snapshot)?;
        let current = self
            .target
            .list_assignments(context, &config.sync_roles)
            .await
            .map_err(SyncError::Snapshot)?;
        let mut state = RunState {
            context,
            index: CurrentAssignmentIndex::from_keys(current),
            confirmed: HashSet::new(),
            cache: LookupCache::default(),
        };
        debug!(assignments = state.index.len(), "Indexed current role assignments");

        trace.output(TraceLevel::Summary, "Starting database sync");
        let accessor = RowAccessor::new(
            &config.user_field,
            &config.role_field,
            self.connector.encoding(),
        );
        // Only the two mapped columns are read; other columns of the table
        // may hold types the source driver cannot decode.
        let query = SelectQuery::from_table(config.remote_table.as_str())
            .with_fields([config.user_field.trim(), config.role_field.trim()]);
        let mut rows = connection.select(&query);
        while let Some(row) = rows.try_next().await.map_err(SyncError::ReadFailure)? {
            counters.rows_read += 1;
            match accessor.normalize(&row) {
                Ok(normalized) => {
                    self.process_row(&normalized, config, &mut state, trace, counters)
                        .await;
                }
                Err(err) => {
                    trace.output(TraceLevel::Detail, &format!("error: {err}"));
                    counters.record_skip(err.skip_reason());
                }
            }
        }

        Ok(state)
    }

    async fn process_row(
        &self,
        row: &NormalizedRow,
        config: &SyncConfig,
        state: &mut RunState,
        trace: &dyn ProgressTrace,
        counters: &mut SyncCounters,
    ) {
        let rowdesc = row.describe();

        let role_id = match self.lookup_role(&mut state.cache, &row.role).await {
            Ok(Some(role_id)) => role_id,
            Ok(None) => {
                return skip_row(
                    trace,
                    counters,
                    SkipReason::UnknownRole,
                    format!(
                        "error: skipping '{rowdesc}' due to unknown role shortname '{}'",
                        row.role
                    ),
                );
            }
            Err(err) => {
                warn!(role = %row.role, error = %err, "Role lookup failed");
                return skip_row(
                    trace,
                    counters,
                    SkipReason::LookupFailed,
                    format!("error: skipping '{rowdesc}' because role lookup failed: {err}"),
                );
            }
        };

        if !config.is_synced(role_id) {
            return skip_row(
                trace,
                counters,
                SkipReason::RoleNotSynced,
                format!(
                    "error: skipping '{rowdesc}' because role '{}' is not synchronised",
                    row.role
                ),
            );
        }

        let field = config.local_user_field;
        let user_id = match self.lookup_user(&mut state.cache, field, &row.user).await {
            Ok(UserMatch::Unique(user_id)) => user_id,
            Ok(UserMatch::Ambiguous { chosen, candidates }) => {
                counters.ambiguous_users += 1;
                trace.output(
                    TraceLevel::Detail,
                    &format!(
                        "warning: user {field} '{}' matches {candidates} users, using user {chosen}",
                        row.user
                    ),
                );
                chosen
            }
            Ok(UserMatch::None) => {
                return skip_row(
                    trace,
                    counters,
                    SkipReason::UnknownUser,
                    format!(
                        "error: skipping '{rowdesc}' due to unknown user {field} '{}'",
                        row.user
                    ),
                );
            }
            Err(err) => {
                warn!(user = %row.user, error = %err, "User lookup failed");
                return skip_row(
                    trace,
                    counters,
                    SkipReason::LookupFailed,
                    format!("error: skipping '{rowdesc}' because user lookup failed: {err}"),
                );
            }
        };

        let key = AssignmentKey::new(user_id, role_id);
        if state.index.claim(key) || state.confirmed.contains(&key) {
            state.confirmed.insert(key);
            counters.unchanged += 1;
            trace.output(
                TraceLevel::Detail,
                &format!("Skipping: System role already assigned: {rowdesc}"),
            );
            return;
        }

        match self.target.grant(key, state.context).await {
            Ok(MutationOutcome::Applied) => {
                state.confirmed.insert(key);
                counters.granted += 1;
                trace.output(
                    TraceLevel::Detail,
                    &format!("Assigning System role: {rowdesc}"),
                );
            }
            Ok(MutationOutcome::AlreadyExists | MutationOutcome::NotFound) => {
                state.confirmed.insert(key);
                counters.unchanged += 1;
                trace.output(
                    TraceLevel::Detail,
                    &format!("Skipping: System role already assigned: {rowdesc}"),
                );
            }
            Err(err) => {
                counters.failed += 1;
                warn!(assignment = %key, error = %err, "Grant failed");
                trace.output(
                    TraceLevel::Detail,
                    &format!("error: failed to assign System role: {rowdesc}: {err}"),
                );
            }
        }
    }

    async fn revoke_unclaimed(
        &self,
        state: &RunState,
        trace: &dyn ProgressTrace,
        counters: &mut SyncCounters,
    ) {
        trace.output(TraceLevel::Summary, "Unassigning removed System roles");
        for key in state.index.remaining() {
            match self.target.revoke(key, state.context).await {
                Ok(outcome) => {
                    if outcome == MutationOutcome::NotFound {
                        debug!(assignment = %key, "Assignment was already gone");
                    }
                    counters.revoked += 1;
                    trace.output(TraceLevel::Detail, &format!("Unassigning: {key}"));
                }
                Err(err) => {
                    counters.failed += 1;
                    warn!(assignment = %key, error = %err, "Revoke failed");
                    trace.output(
                        TraceLevel::Detail,
                        &format!("error: failed to unassign {key}: {err}"),
                    );
                }
            }
        }
    }

    async fn lookup_role(
        &self,
        cache: &mut LookupCache,
        shortname: &str,
    ) -> TargetResult<Option<RoleId>> {
        if let Some(cached) = cache.roles.get(shortname) {
            return Ok(*cached);
        }
        let resolved = self.target.resolve_role(shortname).await?;
        cache.roles.insert(shortname.to_string(), resolved);
        Ok(resolved)
    }

    async fn lookup_user(
        &self,
        cache: &mut LookupCache,
        field: LocalUserField,
        value: &str,
    ) -> TargetResult<UserMatch> {
        if let Some(cached) = cache.users.get(value) {
            return Ok(*cached);
        }
        let resolved = self.target.resolve_user(field, value).await?;
        cache.users.insert(value.to_string(), resolved);
        Ok(resolved)
    }
}

fn skip_row(
    trace: &dyn ProgressTrace,
    counters: &mut SyncCounters,
    reason: SkipReason,
    message: String,
) {
    trace.output(TraceLevel::Detail, &message);
    counters.record_skip(reason);
}

/// Connect to the source and report the columns of the first row of
/// `remote_table`. Needs no target system.
#[instrument(skip_all, fields(table = %config.remote_table))]
pub async fn inspect_source(
    connector: &dyn SourceConnector,
    config: &SyncConfig,
) -> ReconciliationResult<TableInspection> {
    let mut missing: Vec<String> = config
        .source
        .missing_fields()
        .into_iter()
        .map(|field| format!("source.{field}"))
        .collect();
    if config.remote_table.trim().is_empty() {
        missing.push("remote_table".to_string());
    }
    if !missing.is_empty() {
        return Err(SyncError::ConfigIncomplete { missing });
    }

    let mut connection = connector
        .connect()
        .await
        .map_err(SyncError::ConnectFailure)?;
    let inspection = first_row_columns(connection.as_mut(), &config.remote_table).await;
    if let Err(err) = connection.close().await {
        warn!(error = %err, "Failed to close external source connection");
    }
    inspection
}

async fn first_row_columns(
    connection: &mut dyn SourceConnection,
    table: &str,
) -> ReconciliationResult<TableInspection> {
    let query = SelectQuery::from_table(table);
    let mut rows = connection.select(&query);
    let first = rows.try_next().await.map_err(SyncError::ReadFailure)?;
    Ok(match first {
        Some(row) => TableInspection::Columns(row.columns().map(str::to_string).collect()),
        None => TableInspection::Empty,
    })
}
