//! Run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::error::SyncError;
use super::statistics::SyncCounters;

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every phase ran.
    Completed,
    /// A safety check stopped the run before any mutation.
    Aborted,
    /// The source or the target could not be read.
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Completed => "completed",
            SyncStatus::Aborted => "aborted",
            SyncStatus::Failed => "failed",
        }
    }
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a synchronisation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Run ID.
    pub run_id: Uuid,
    /// Display name of the source connector.
    pub source: String,
    /// Table that was read.
    pub remote_table: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: SyncStatus,
    pub counters: SyncCounters,
    /// Error message for aborted or failed runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error code for aborted or failed runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Process exit code: 0 on success.
    pub exit_code: i32,
}

impl SyncReport {
    /// Build the report for a finished run.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        source: impl Into<String>,
        remote_table: impl Into<String>,
        started_at: DateTime<Utc>,
        counters: SyncCounters,
        outcome: Result<(), &SyncError>,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_ms = u64::try_from((finished_at - started_at).num_milliseconds()).unwrap_or(0);
        let (status, error, error_code, exit_code) = match outcome {
            Ok(()) => (SyncStatus::Completed, None, None, 0),
            Err(err) => (
                err.status(),
                Some(err.to_string()),
                Some(err.error_code().to_string()),
                err.exit_code(),
            ),
        };

        Self {
            run_id,
            source: source.into(),
            remote_table: remote_table.into(),
            started_at,
            finished_at,
            duration_ms,
            status,
            counters,
            error,
            error_code,
            exit_code,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Completed
    }

    /// Human-readable summary, one line per entry.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let c = &self.counters;
        let mut lines = vec![format!(
            "Synchronisation {} in {} ms: {} rows read, {} granted, {} revoked, {} unchanged, {} skipped",
            self.status, self.duration_ms, c.rows_read, c.granted, c.revoked, c.unchanged, c.skipped
        )];
        if c.skipped > 0 {
            lines.push(format!(
                "Skipped rows: {} invalid, {} missing field, {} unknown role, {} role not synced, {} unknown user, {} lookup failed",
                c.invalid_rows,
                c.missing_fields,
                c.unknown_roles,
                c.roles_not_synced,
                c.unknown_users,
                c.lookup_failures
            ));
        }
        if c.ambiguous_users > 0 {
            lines.push(format!(
                "{} rows matched more than one local user",
                c.ambiguous_users
            ));
        }
        if c.failed > 0 {
            lines.push(format!("{} role assignment changes failed", c.failed));
        }
        if let Some(error) = &self.error {
            lines.push(format!("Error: {error}"));
        }
        lines
    }
}
