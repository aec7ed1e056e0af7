//! Reconciliation error types.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

use rolesync_connector::ConnectorError;
use rolesync_core::TargetError;

use super::report::SyncStatus;

/// Error that aborts a synchronisation run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Required configuration values are empty.
    #[error("configuration not complete, missing: {}", missing.join(", "))]
    ConfigIncomplete { missing: Vec<String> },

    /// The external source could not be reached.
    #[error("error while communicating with external database: {0}")]
    ConnectFailure(#[source] ConnectorError),

    /// The source table holds too few rows to be trusted.
    #[error(
        "external database returned {count} records and the minimum required is more than {min_records}"
    )]
    InsufficientRecords { count: u64, min_records: u64 },

    /// Counting or streaming the source table failed.
    #[error("failed to read external table: {0}")]
    ReadFailure(#[source] ConnectorError),

    /// The current assignments could not be read from the target.
    #[error("failed to index current role assignments: {0}")]
    Snapshot(#[source] TargetError),
}

impl SyncError {
    /// Process exit code reported for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::ConfigIncomplete { .. }
            | SyncError::ConnectFailure(_)
            | SyncError::InsufficientRecords { .. } => 1,
            SyncError::ReadFailure(_) | SyncError::Snapshot(_) => 4,
        }
    }

    /// Status of a run that ended with this error.
    ///
    /// Safety-check aborts are `Aborted`; I/O problems are `Failed`.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        match self {
            SyncError::ConfigIncomplete { .. } | SyncError::InsufficientRecords { .. } => {
                SyncStatus::Aborted
            }
            SyncError::ConnectFailure(_) | SyncError::ReadFailure(_) | SyncError::Snapshot(_) => {
                SyncStatus::Failed
            }
        }
    }

    /// Get error code for logging/metrics.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::ConfigIncomplete { .. } => "CONFIG_INCOMPLETE",
            SyncError::ConnectFailure(_) => "CONNECT_FAILURE",
            SyncError::InsufficientRecords { .. } => "INSUFFICIENT_RECORDS",
            SyncError::ReadFailure(_) => "READ_FAILURE",
            SyncError::Snapshot(_) => "SNAPSHOT_FAILURE",
        }
    }
}

/// Result type for reconciliation runs.
pub type ReconciliationResult<T> = Result<T, SyncError>;

/// Why a source row was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The user or role value is empty.
    InvalidRow,
    /// A configured column is not present in the row.
    MissingField,
    /// No role has the given shortname.
    UnknownRole,
    /// The role exists but is not one of the synced roles.
    RoleNotSynced,
    /// No local user matches the given value.
    UnknownUser,
    /// The target system failed to answer a role or user lookup.
    LookupFailed,
}

impl SkipReason {
    /// Get the reason identifier string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InvalidRow => "invalid_row",
            SkipReason::MissingField => "missing_field",
            SkipReason::UnknownRole => "unknown_role",
            SkipReason::RoleNotSynced => "role_not_synced",
            SkipReason::UnknownUser => "unknown_user",
            SkipReason::LookupFailed => "lookup_failed",
        }
    }
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source row that cannot be turned into a user/role pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// A configured column is not present in the row.
    #[error("external record has no field '{field}'")]
    MissingField { field: String },

    /// The user or role value is empty after trimming.
    #[error("invalid external record, missing mandatory fields: {record}")]
    InvalidRow { record: String },
}

impl RowError {
    /// Skip reason counted for this row.
    #[must_use]
    pub fn skip_reason(&self) -> SkipReason {
        match self {
            RowError::MissingField { .. } => SkipReason::MissingField,
            RowError::InvalidRow { .. } => SkipReason::InvalidRow,
        }
    }
}
