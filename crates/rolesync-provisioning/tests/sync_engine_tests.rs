//! Reconciliation Engine Tests
//!
//! Runs the engine against a scripted in-memory source and the
//! `InMemoryTarget`, covering:
//! - claim / grant / revoke decisions and the keep policy
//! - idempotence of repeated runs
//! - the minimum-records safety check
//! - per-row skips (invalid rows, unknown roles and users, unsynced roles)
//! - connection lifecycle on success, abort and failure
//! - source inspection

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rolesync_connector::{
    ConnectorError, ConnectorResult, ExternalRow, RawValue, RowStream, SelectQuery, SourceConfig,
    SourceConnection, SourceConnector, SourceDriver, SourceEncoding,
};
use rolesync_core::{
    AssignmentKey, InMemoryTarget, LocalUser, LocalUserField, RoleId, TargetSystem, UserId,
};
use rolesync_provisioning::reconciliation::{
    BufferedTrace, ReconciliationEngine, RemoveAction, SkipReason, SyncConfig, SyncError,
    SyncReport, SyncStatus, TableInspection, TraceLevel,
};

const MANAGER: i64 = 1;
const EDITOR: i64 = 3;
const VIEWER: i64 = 5;

// =============================================================================
// Manual Test Source Implementation
// =============================================================================

#[derive(Default)]
struct CallCounts {
    connect: AtomicUsize,
    count: AtomicUsize,
    select: AtomicUsize,
    close: AtomicUsize,
    queries: Mutex<Vec<SelectQuery>>,
}

/// Source serving a fixed list of rows, with switchable failures.
struct TestConnector {
    rows: Vec<ExternalRow>,
    encoding: SourceEncoding,
    fail_connect: bool,
    fail_count: bool,
    /// Yield an error after this many rows.
    fail_stream_after: Option<usize>,
    calls: Arc<CallCounts>,
}

impl TestConnector {
    fn new(rows: Vec<ExternalRow>) -> Self {
        Self {
            rows,
            encoding: SourceEncoding::utf8(),
            fail_connect: false,
            fail_count: false,
            fail_stream_after: None,
            calls: Arc::new(CallCounts::default()),
        }
    }

    fn with_encoding(mut self, label: &str) -> Self {
        self.encoding = SourceEncoding::for_label(label).unwrap();
        self
    }

    fn with_connect_error(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    fn with_count_error(mut self) -> Self {
        self.fail_count = true;
        self
    }

    fn with_stream_error_after(mut self, rows: usize) -> Self {
        self.fail_stream_after = Some(rows);
        self
    }

    fn connect_calls(&self) -> usize {
        self.calls.connect.load(Ordering::SeqCst)
    }

    fn count_calls(&self) -> usize {
        self.calls.count.load(Ordering::SeqCst)
    }

    fn select_calls(&self) -> usize {
        self.calls.select.load(Ordering::SeqCst)
    }

    fn close_calls(&self) -> usize {
        self.calls.close.load(Ordering::SeqCst)
    }

    fn queries(&self) -> Vec<SelectQuery> {
        self.calls.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceConnector for TestConnector {
    fn driver(&self) -> SourceDriver {
        SourceDriver::Sqlite
    }

    fn display_name(&self) -> &str {
        "test-source"
    }

    fn encoding(&self) -> SourceEncoding {
        self.encoding
    }

    async fn connect(&self) -> ConnectorResult<Box<dyn SourceConnection>> {
        self.calls.connect.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(ConnectorError::connection_failed("connection refused"));
        }
        Ok(Box::new(TestConnection {
            rows: self.rows.clone(),
            fail_count: self.fail_count,
            fail_stream_after: self.fail_stream_after,
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct TestConnection {
    rows: Vec<ExternalRow>,
    fail_count: bool,
    fail_stream_after: Option<usize>,
    calls: Arc<CallCounts>,
}

#[async_trait]
impl SourceConnection for TestConnection {
    async fn count(&mut self, _table: &str) -> ConnectorResult<u64> {
        self.calls.count.fetch_add(1, Ordering::SeqCst);
        if self.fail_count {
            return Err(ConnectorError::query_failed("relation does not exist"));
        }
        Ok(self.rows.len() as u64)
    }

    fn select<'a>(&'a mut self, query: &'a SelectQuery) -> RowStream<'a> {
        self.calls.select.fetch_add(1, Ordering::SeqCst);
        self.calls.queries.lock().unwrap().push(query.clone());
        let mut items: Vec<ConnectorResult<ExternalRow>> =
            self.rows.iter().cloned().map(Ok).collect();
        if let Some(after) = self.fail_stream_after {
            items.truncate(after);
            items.push(Err(ConnectorError::query_failed("server closed the cursor")));
        }
        Box::pin(futures::stream::iter(items))
    }

    async fn close(self: Box<Self>) -> ConnectorResult<()> {
        self.calls.close.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn row(user: &str, role: &str) -> ExternalRow {
    ExternalRow::new().with("UserId", user).with("RoleName", role)
}

fn key(user: i64, role: i64) -> AssignmentKey {
    AssignmentKey::new(UserId::from_i64(user), RoleId::from_i64(role))
}

fn config() -> SyncConfig {
    SyncConfig::new(
        SourceConfig::new(SourceDriver::Sqlite, "/srv/hr/roles.db"),
        "staff_roles",
    )
    .with_fields("userid", "rolename")
    .with_local_user_field(LocalUserField::Username)
    .with_sync_roles([RoleId::from_i64(EDITOR), RoleId::from_i64(VIEWER)])
    .with_min_records(0)
}

fn target() -> InMemoryTarget {
    InMemoryTarget::new()
        .with_role(MANAGER, "manager")
        .with_role(EDITOR, "editor")
        .with_role(VIEWER, "viewer")
        .with_user(LocalUser::new(1, "u1"))
        .with_user(LocalUser::new(2, "u2"))
        .with_user(LocalUser::new(3, "u3"))
}

async fn run_sync(
    connector: &Arc<TestConnector>,
    target: &Arc<InMemoryTarget>,
    config: &SyncConfig,
) -> (SyncReport, BufferedTrace) {
    let source: Arc<dyn SourceConnector> = connector.clone();
    let store: Arc<dyn TargetSystem> = target.clone();
    let engine = ReconciliationEngine::new(source, store);
    let trace = BufferedTrace::new();
    let report = engine.sync(config, &trace).await;
    (report, trace)
}

// =============================================================================
// Reconciliation decisions
// =============================================================================

#[tokio::test]
async fn test_existing_assignment_unchanged_and_new_one_granted() {
    let connector = Arc::new(TestConnector::new(vec![
        row("u1", "editor"),
        row("u2", "viewer"),
    ]));
    let target = Arc::new(target().with_assignment(1, EDITOR));

    let (report, trace) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.exit_code, 0);
    assert_eq!(report.counters.rows_read, 2);
    assert_eq!(report.counters.unchanged, 1);
    assert_eq!(report.counters.granted, 1);
    assert_eq!(report.counters.revoked, 0);
    assert_eq!(target.grant_calls(), 1);
    assert_eq!(target.revoke_calls(), 0);
    assert_eq!(
        target.assignments().await,
        BTreeSet::from([key(1, EDITOR), key(2, VIEWER)])
    );
    assert!(trace.contains("Skipping: System role already assigned: u1 => editor"));
    assert!(trace.contains("Assigning System role: u2 => viewer"));
}

#[tokio::test]
async fn test_unconfirmed_assignment_is_revoked() {
    let connector = Arc::new(TestConnector::new(vec![row("u1", "editor")]));
    let target = Arc::new(
        target()
            .with_assignment(1, EDITOR)
            .with_assignment(2, VIEWER),
    );

    let (report, trace) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.counters.unchanged, 1);
    assert_eq!(report.counters.revoked, 1);
    assert_eq!(report.counters.granted, 0);
    assert_eq!(target.assignments().await, BTreeSet::from([key(1, EDITOR)]));
    assert!(trace.contains("Unassigning removed System roles"));
    assert!(trace.contains("Unassigning: 2 => 5"));
}

#[tokio::test]
async fn test_keep_action_never_revokes() {
    let connector = Arc::new(TestConnector::new(vec![row("u1", "editor")]));
    let target = Arc::new(
        target()
            .with_assignment(1, EDITOR)
            .with_assignment(2, VIEWER),
    );
    let config = config().with_remove_action(RemoveAction::Keep);

    let (report, trace) = run_sync(&connector, &target, &config).await;

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.counters.revoked, 0);
    assert_eq!(target.revoke_calls(), 0);
    assert_eq!(
        target.assignments().await,
        BTreeSet::from([key(1, EDITOR), key(2, VIEWER)])
    );
    assert!(!trace.contains("Unassigning removed System roles"));
}

#[tokio::test]
async fn test_assignments_of_unsynced_roles_are_left_alone() {
    let connector = Arc::new(TestConnector::new(vec![row("u1", "editor")]));
    let target = Arc::new(target().with_assignment(2, MANAGER));

    let (report, _) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.counters.revoked, 0);
    assert!(target.assignments().await.contains(&key(2, MANAGER)));
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let rows = vec![row("u1", "editor"), row("u2", "viewer"), row("u3", "editor")];
    let connector = Arc::new(TestConnector::new(rows));
    let target = Arc::new(
        target()
            .with_assignment(1, EDITOR)
            .with_assignment(3, VIEWER),
    );

    let (first, _) = run_sync(&connector, &target, &config()).await;
    assert_eq!(first.counters.granted, 2);
    assert_eq!(first.counters.revoked, 1);
    let after_first = target.assignments().await;
    let grants = target.grant_calls();
    let revokes = target.revoke_calls();

    let (second, _) = run_sync(&connector, &target, &config()).await;

    assert_eq!(second.status, SyncStatus::Completed);
    assert_eq!(second.counters.granted, 0);
    assert_eq!(second.counters.revoked, 0);
    assert_eq!(second.counters.unchanged, 3);
    assert_eq!(target.grant_calls(), grants);
    assert_eq!(target.revoke_calls(), revokes);
    assert_eq!(target.assignments().await, after_first);
}

#[tokio::test]
async fn test_repeated_row_grants_once() {
    let connector = Arc::new(TestConnector::new(vec![
        row("u2", "viewer"),
        row("U2 ", "viewer"),
        row("u2", "viewer"),
    ]));
    let target = Arc::new(target());

    let (report, _) = run_sync(&connector, &target, &config()).await;

    // "U2 " trims to "U2", which is a different username.
    assert_eq!(report.counters.granted, 1);
    assert_eq!(report.counters.unchanged, 1);
    assert_eq!(report.counters.unknown_users, 1);
    assert_eq!(target.grant_calls(), 1);
}

// =============================================================================
// Minimum records safety check
// =============================================================================

#[tokio::test]
async fn test_count_equal_to_minimum_aborts_without_mutation() {
    let connector = Arc::new(TestConnector::new(vec![
        row("u1", "editor"),
        row("u2", "viewer"),
        row("u3", "viewer"),
    ]));
    let target = Arc::new(target().with_assignment(2, EDITOR));
    let config = config().with_min_records(3);

    let (report, trace) = run_sync(&connector, &target, &config).await;

    assert_eq!(report.status, SyncStatus::Aborted);
    assert_eq!(report.exit_code, 1);
    assert_eq!(report.error_code.as_deref(), Some("INSUFFICIENT_RECORDS"));
    assert_eq!(target.grant_calls(), 0);
    assert_eq!(target.revoke_calls(), 0);
    assert_eq!(connector.select_calls(), 0);
    assert_eq!(connector.close_calls(), 1);
    assert!(trace.contains(
        "Failed to sync because the external db returned 3 records and the minimum required is 3"
    ));
}

#[tokio::test]
async fn test_empty_source_with_minimum_protects_assignments() {
    let connector = Arc::new(TestConnector::new(Vec::new()));
    let target = Arc::new(
        target()
            .with_assignment(1, EDITOR)
            .with_assignment(2, VIEWER),
    );
    let config = config().with_min_records(1);

    let (report, _) = run_sync(&connector, &target, &config).await;

    assert_eq!(report.status, SyncStatus::Aborted);
    assert_eq!(target.assignments().await.len(), 2);
    assert_eq!(target.revoke_calls(), 0);
}

#[tokio::test]
async fn test_count_above_minimum_proceeds() {
    let connector = Arc::new(TestConnector::new(vec![
        row("u1", "editor"),
        row("u2", "viewer"),
    ]));
    let target = Arc::new(target());
    let config = config().with_min_records(1);

    let (report, _) = run_sync(&connector, &target, &config).await;

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.counters.granted, 2);
    assert_eq!(connector.count_calls(), 1);
}

#[tokio::test]
async fn test_zero_minimum_skips_count() {
    let connector = Arc::new(TestConnector::new(vec![row("u1", "editor")]));
    let target = Arc::new(target());

    let (report, _) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(connector.count_calls(), 0);
}

// =============================================================================
// Per-row skips
// =============================================================================

#[tokio::test]
async fn test_unknown_user_and_role_are_skipped() {
    let connector = Arc::new(TestConnector::new(vec![
        row("ghost", "editor"),
        row("u1", "janitor"),
    ]));
    let target = Arc::new(target());

    let (report, trace) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.counters.skipped, 2);
    assert_eq!(report.counters.skip_count(SkipReason::UnknownUser), 1);
    assert_eq!(report.counters.skip_count(SkipReason::UnknownRole), 1);
    assert_eq!(target.grant_calls(), 0);
    assert!(trace.contains("error: skipping 'ghost => editor' due to unknown user username 'ghost'"));
    assert!(trace.contains("error: skipping 'u1 => janitor' due to unknown role shortname 'janitor'"));
}

#[tokio::test]
async fn test_role_outside_sync_set_is_rejected() {
    let connector = Arc::new(TestConnector::new(vec![row("u1", "manager")]));
    let target = Arc::new(target());

    let (report, trace) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.counters.roles_not_synced, 1);
    assert_eq!(report.counters.granted, 0);
    assert_eq!(target.grant_calls(), 0);
    assert!(trace.contains("because role 'manager' is not synchronised"));
}

#[tokio::test]
async fn test_invalid_and_incomplete_rows_are_skipped() {
    let connector = Arc::new(TestConnector::new(vec![
        row("  ", "editor"),
        ExternalRow::new()
            .with("userid", "u1")
            .with("rolename", RawValue::Null),
        ExternalRow::new().with("userid", "u2"),
        row("u3", "viewer"),
    ]));
    let target = Arc::new(target());

    let (report, trace) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.counters.rows_read, 4);
    assert_eq!(report.counters.invalid_rows, 2);
    assert_eq!(report.counters.missing_fields, 1);
    assert_eq!(report.counters.granted, 1);
    assert!(trace.contains("error: invalid external record, missing mandatory fields: "));
    assert!(trace.contains("external record has no field 'rolename'"));
}

#[tokio::test]
async fn test_ambiguous_user_picks_lowest_id() {
    let connector = Arc::new(TestConnector::new(vec![row("E100", "editor")]));
    let target = Arc::new(
        target()
            .with_user(LocalUser::new(9, "twin-b").with_idnumber("E100"))
            .with_user(LocalUser::new(7, "twin-a").with_idnumber("E100")),
    );
    let config = config().with_local_user_field(LocalUserField::IdNumber);

    let (report, trace) = run_sync(&connector, &target, &config).await;

    assert_eq!(report.counters.ambiguous_users, 1);
    assert_eq!(report.counters.granted, 1);
    assert_eq!(target.assignments().await, BTreeSet::from([key(7, EDITOR)]));
    assert!(trace.contains("matches 2 users, using user 7"));
}

#[tokio::test]
async fn test_source_bytes_are_decoded_before_lookup() {
    let latin1_name = vec![b'j', b'o', b's', 0xE9];
    let connector = Arc::new(
        TestConnector::new(vec![ExternalRow::new()
            .with("userid", latin1_name)
            .with("rolename", b"viewer".to_vec())])
        .with_encoding("latin1"),
    );
    let target = Arc::new(target().with_user(LocalUser::new(4, "josé")));

    let (report, _) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.counters.granted, 1);
    assert_eq!(target.assignments().await, BTreeSet::from([key(4, VIEWER)]));
}

#[tokio::test]
async fn test_failed_grant_is_counted_and_run_continues() {
    let connector = Arc::new(TestConnector::new(vec![
        row("u2", "editor"),
        row("u3", "editor"),
    ]));
    let target = Arc::new(target().with_failing_user(2));

    let (report, trace) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.status, SyncStatus::Completed);
    assert_eq!(report.counters.failed, 1);
    assert_eq!(report.counters.granted, 1);
    assert_eq!(target.assignments().await, BTreeSet::from([key(3, EDITOR)]));
    assert!(trace.contains("error: failed to assign System role: u2 => editor"));
}

// =============================================================================
// Run-level failures and connection lifecycle
// =============================================================================

#[tokio::test]
async fn test_incomplete_config_fails_before_io() {
    let connector = Arc::new(TestConnector::new(vec![row("u1", "editor")]));
    let target = Arc::new(target());
    let config = config().with_sync_roles(Vec::<RoleId>::new());

    let (report, trace) = run_sync(&connector, &target, &config).await;

    assert_eq!(report.status, SyncStatus::Aborted);
    assert_eq!(report.exit_code, 1);
    assert_eq!(report.error_code.as_deref(), Some("CONFIG_INCOMPLETE"));
    assert_eq!(connector.connect_calls(), 0);
    assert_eq!(target.grant_calls(), 0);
    assert!(trace.contains("Sync configuration not complete."));
    assert!(trace.is_finished());
}

#[tokio::test]
async fn test_connect_failure_mutates_nothing() {
    let connector = Arc::new(TestConnector::new(vec![row("u1", "editor")]).with_connect_error());
    let target = Arc::new(target().with_assignment(2, VIEWER));

    let (report, trace) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.status, SyncStatus::Failed);
    assert_eq!(report.exit_code, 1);
    assert_eq!(connector.connect_calls(), 1);
    assert_eq!(connector.close_calls(), 0);
    assert_eq!(target.grant_calls(), 0);
    assert_eq!(target.revoke_calls(), 0);
    assert!(trace.contains("Error while communicating with external database"));
    assert!(trace.is_finished());
}

#[tokio::test]
async fn test_count_failure_is_a_read_failure() {
    let connector = Arc::new(TestConnector::new(vec![row("u1", "editor")]).with_count_error());
    let target = Arc::new(target());
    let config = config().with_min_records(1);

    let (report, _) = run_sync(&connector, &target, &config).await;

    assert_eq!(report.status, SyncStatus::Failed);
    assert_eq!(report.exit_code, 4);
    assert_eq!(connector.close_calls(), 1);
    assert_eq!(target.grant_calls(), 0);
}

#[tokio::test]
async fn test_stream_failure_skips_removal_and_closes_connection() {
    let connector = Arc::new(
        TestConnector::new(vec![row("u1", "editor"), row("u2", "viewer")])
            .with_stream_error_after(1),
    );
    let target = Arc::new(target().with_assignment(3, VIEWER));

    let (report, trace) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.status, SyncStatus::Failed);
    assert_eq!(report.exit_code, 4);
    assert_eq!(report.error_code.as_deref(), Some("READ_FAILURE"));
    // The first row was already granted before the stream broke.
    assert_eq!(report.counters.granted, 1);
    assert_eq!(target.revoke_calls(), 0);
    assert!(target.assignments().await.contains(&key(3, VIEWER)));
    assert_eq!(connector.close_calls(), 1);
    assert!(!trace.contains("Unassigning removed System roles"));
}

#[tokio::test]
async fn test_missing_system_context_fails_run() {
    let connector = Arc::new(TestConnector::new(vec![row("u1", "editor")]));
    let target = Arc::new(target().without_context());

    let (report, _) = run_sync(&connector, &target, &config()).await;

    assert_eq!(report.status, SyncStatus::Failed);
    assert_eq!(report.exit_code, 4);
    assert_eq!(report.error_code.as_deref(), Some("SNAPSHOT_FAILURE"));
    assert_eq!(connector.select_calls(), 0);
    assert_eq!(connector.close_calls(), 1);
}

#[tokio::test]
async fn test_successful_run_closes_once_and_finishes_trace() {
    let connector = Arc::new(TestConnector::new(vec![row("u1", "editor")]));
    let target = Arc::new(target());

    let (report, trace) = run_sync(&connector, &target, &config()).await;

    assert!(report.is_success());
    assert_eq!(report.source, "test-source");
    assert_eq!(report.remote_table, "staff_roles");
    assert_eq!(connector.connect_calls(), 1);
    assert_eq!(connector.close_calls(), 1);
    assert!(trace.is_finished());

    let queries = connector.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].table(), "staff_roles");
    assert_eq!(
        queries[0].fields().to_vec(),
        vec!["userid".to_string(), "rolename".to_string()]
    );

    let summary = trace.messages(TraceLevel::Summary);
    assert_eq!(
        summary.first().map(String::as_str),
        Some("Starting System role synchronisation...")
    );
    assert!(summary.iter().any(|line| line == "Indexing current role assignments"));
    assert!(summary.iter().any(|line| line == "Starting database sync"));
    assert!(summary
        .last()
        .is_some_and(|line| line.starts_with("Synchronisation completed")));
}

// =============================================================================
// Source inspection
// =============================================================================

fn engine_for(connector: &Arc<TestConnector>) -> ReconciliationEngine {
    let source: Arc<dyn SourceConnector> = connector.clone();
    let store: Arc<dyn TargetSystem> = Arc::new(target());
    ReconciliationEngine::new(source, store)
}

#[tokio::test]
async fn test_inspect_reports_first_row_columns() {
    let connector = Arc::new(TestConnector::new(vec![
        row("u1", "editor"),
        row("u2", "viewer"),
    ]));

    let inspection = engine_for(&connector)
        .inspect_source(&config())
        .await
        .unwrap();

    assert_eq!(
        inspection,
        TableInspection::Columns(vec!["userid".to_string(), "rolename".to_string()])
    );
    assert_eq!(connector.close_calls(), 1);
    assert!(connector.queries()[0].fields().is_empty());
}

#[tokio::test]
async fn test_inspect_empty_table() {
    let connector = Arc::new(TestConnector::new(Vec::new()));

    let inspection = engine_for(&connector)
        .inspect_source(&config())
        .await
        .unwrap();

    assert_eq!(inspection, TableInspection::Empty);
}

#[tokio::test]
async fn test_inspect_requires_remote_table() {
    let connector = Arc::new(TestConnector::new(Vec::new()));
    let mut config = config();
    config.remote_table = String::new();

    let err = engine_for(&connector)
        .inspect_source(&config)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ConfigIncomplete { ref missing } if missing == &["remote_table"]));
    assert_eq!(connector.connect_calls(), 0);
}

#[tokio::test]
async fn test_inspect_connect_failure() {
    let connector = Arc::new(TestConnector::new(Vec::new()).with_connect_error());

    let err = engine_for(&connector)
        .inspect_source(&config())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ConnectFailure(_)));
    assert_eq!(err.exit_code(), 1);
}
