//! Counters for a synchronisation run.

use serde::{Deserialize, Serialize};

use super::error::SkipReason;

/// Per-run counters.
///
/// `skipped` is the total of the per-reason skip counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
    /// Rows read from the source.
    #[serde(default)]
    pub rows_read: u64,
    /// Assignments the source confirmed and that already existed.
    #[serde(default)]
    pub unchanged: u64,
    /// Assignments granted.
    #[serde(default)]
    pub granted: u64,
    /// Assignments revoked.
    #[serde(default)]
    pub revoked: u64,
    /// Rows skipped for any reason.
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub invalid_rows: u64,
    #[serde(default)]
    pub missing_fields: u64,
    #[serde(default)]
    pub unknown_roles: u64,
    #[serde(default)]
    pub roles_not_synced: u64,
    #[serde(default)]
    pub unknown_users: u64,
    #[serde(default)]
    pub lookup_failures: u64,
    /// Rows whose user value matched more than one local user.
    #[serde(default)]
    pub ambiguous_users: u64,
    /// Grants or revokes the target system rejected.
    #[serde(default)]
    pub failed: u64,
}

impl SyncCounters {
    /// Create new empty counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a skipped row.
    pub fn record_skip(&mut self, reason: SkipReason) {
        self.skipped += 1;
        let counter = match reason {
            SkipReason::InvalidRow => &mut self.invalid_rows,
            SkipReason::MissingField => &mut self.missing_fields,
            SkipReason::UnknownRole => &mut self.unknown_roles,
            SkipReason::RoleNotSynced => &mut self.roles_not_synced,
            SkipReason::UnknownUser => &mut self.unknown_users,
            SkipReason::LookupFailed => &mut self.lookup_failures,
        };
        *counter += 1;
    }

    /// Get count for a specific skip reason.
    #[must_use]
    pub fn skip_count(&self, reason: SkipReason) -> u64 {
        match reason {
            SkipReason::InvalidRow => self.invalid_rows,
            SkipReason::MissingField => self.missing_fields,
            SkipReason::UnknownRole => self.unknown_roles,
            SkipReason::RoleNotSynced => self.roles_not_synced,
            SkipReason::UnknownUser => self.unknown_users,
            SkipReason::LookupFailed => self.lookup_failures,
        }
    }

    /// Grants plus revokes.
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.granted + self.revoked
    }
}
