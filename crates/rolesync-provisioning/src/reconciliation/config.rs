//! Synchronisation run configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rolesync_connector::SourceConfig;
use rolesync_core::{LocalUserField, RoleId};

use super::error::{ReconciliationResult, SyncError};

/// Minimum source row count required when none is configured.
pub const DEFAULT_MIN_RECORDS: u64 = 1;

/// What to do with assignments that disappeared from the external source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoveAction {
    /// Revoke them.
    #[default]
    Remove,
    /// Leave them in place.
    Keep,
}

impl RemoveAction {
    /// Get the action identifier string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoveAction::Remove => "remove",
            RemoveAction::Keep => "keep",
        }
    }
}

impl Display for RemoveAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoveAction {
    type Err = String;

    /// Accepts the names as well as the legacy numeric codes (`0` remove, `1` keep).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remove" | "0" => Ok(RemoveAction::Remove),
            "keep" | "1" => Ok(RemoveAction::Keep),
            other => Err(format!(
                "unknown remove action '{other}', expected remove or keep"
            )),
        }
    }
}

fn default_min_records() -> u64 {
    DEFAULT_MIN_RECORDS
}

/// Configuration of one synchronisation run.
///
/// Loaded as-is from the settings collaborator. Empty values are allowed
/// here; [`SyncConfig::check_complete`] rejects them before the run does
/// any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// External source connection descriptor.
    #[serde(default)]
    pub source: SourceConfig,
    /// Table holding the desired assignments.
    #[serde(default)]
    pub remote_table: String,
    /// Source column holding the user identifier.
    #[serde(default)]
    pub user_field: String,
    /// Source column holding the role shortname.
    #[serde(default)]
    pub role_field: String,
    /// Local user field the user identifier is matched against.
    #[serde(default)]
    pub local_user_field: LocalUserField,
    /// Roles this run may grant or revoke.
    #[serde(default)]
    pub sync_roles: BTreeSet<RoleId>,
    /// Handling of assignments missing from the source.
    #[serde(default)]
    pub remove_action: RemoveAction,
    /// The source table must hold more rows than this; `0` disables the check.
    #[serde(default = "default_min_records")]
    pub min_records: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            remote_table: String::new(),
            user_field: String::new(),
            role_field: String::new(),
            local_user_field: LocalUserField::default(),
            sync_roles: BTreeSet::new(),
            remove_action: RemoveAction::default(),
            min_records: default_min_records(),
        }
    }
}

impl SyncConfig {
    /// Create a configuration reading `remote_table` from `source`.
    #[must_use]
    pub fn new(source: SourceConfig, remote_table: impl Into<String>) -> Self {
        Self {
            source,
            remote_table: remote_table.into(),
            ..Default::default()
        }
    }

    /// Set the source user and role columns.
    #[must_use]
    pub fn with_fields(mut self, user_field: impl Into<String>, role_field: impl Into<String>) -> Self {
        self.user_field = user_field.into();
        self.role_field = role_field.into();
        self
    }

    #[must_use]
    pub fn with_local_user_field(mut self, field: LocalUserField) -> Self {
        self.local_user_field = field;
        self
    }

    #[must_use]
    pub fn with_sync_roles(mut self, roles: impl IntoIterator<Item = RoleId>) -> Self {
        self.sync_roles = roles.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_remove_action(mut self, action: RemoveAction) -> Self {
        self.remove_action = action;
        self
    }

    #[must_use]
    pub fn with_min_records(mut self, min_records: u64) -> Self {
        self.min_records = min_records;
        self
    }

    /// Names of required values that are still empty.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .source
            .missing_fields()
            .into_iter()
            .map(|field| format!("source.{field}"))
            .collect();

        for (name, value) in [
            ("remote_table", &self.remote_table),
            ("user_field", &self.user_field),
            ("role_field", &self.role_field),
        ] {
            if value.trim().is_empty() {
                missing.push(name.to_string());
            }
        }
        if self.sync_roles.is_empty() {
            missing.push("sync_roles".to_string());
        }
        missing
    }

    /// Fail with [`SyncError::ConfigIncomplete`] when anything is missing.
    pub fn check_complete(&self) -> ReconciliationResult<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::ConfigIncomplete { missing })
        }
    }

    /// Whether `role` is one of the synced roles.
    #[must_use]
    pub fn is_synced(&self, role: RoleId) -> bool {
        self.sync_roles.contains(&role)
    }

    /// Copy safe for logging.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            source: self.source.redacted(),
            ..self.clone()
        }
    }
}
