//! Shared value types for role assignments and user resolution.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::ids::{RoleId, UserId};

/// A single role assignment, unique within one context scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssignmentKey {
    /// The user holding the role.
    pub user_id: UserId,
    /// The role being held.
    pub role_id: RoleId,
}

impl AssignmentKey {
    /// Create a new assignment key.
    #[must_use]
    pub const fn new(user_id: UserId, role_id: RoleId) -> Self {
        Self { user_id, role_id }
    }
}

impl Display for AssignmentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} => {}", self.user_id, self.role_id)
    }
}

/// Local user attribute that external user identifiers are matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocalUserField {
    /// Numeric user id.
    Id,
    /// Login name.
    Username,
    /// Email address.
    Email,
    /// Institution-assigned identifier (employee or student number).
    #[default]
    IdNumber,
}

impl LocalUserField {
    /// Column name of this field in the target `users` table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LocalUserField::Id => "id",
            LocalUserField::Username => "username",
            LocalUserField::Email => "email",
            LocalUserField::IdNumber => "idnumber",
        }
    }
}

impl Display for LocalUserField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocalUserField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "id" => Ok(LocalUserField::Id),
            "username" => Ok(LocalUserField::Username),
            "email" => Ok(LocalUserField::Email),
            "idnumber" => Ok(LocalUserField::IdNumber),
            other => Err(format!(
                "unknown local user field '{other}' (expected id, username, email or idnumber)"
            )),
        }
    }
}

/// Result of resolving an external identifier to a local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMatch {
    /// No local user carries the identifier.
    None,
    /// Exactly one local user matched.
    Unique(UserId),
    /// Several users matched; the lowest id was chosen.
    Ambiguous {
        /// The user the assignment will be applied to.
        chosen: UserId,
        /// How many users matched.
        candidates: usize,
    },
}

impl UserMatch {
    /// Build a match from every candidate id returned by a lookup.
    ///
    /// Duplicates are ignored and ties are broken by picking the lowest id,
    /// so the outcome does not depend on the order the store returned rows in.
    #[must_use]
    pub fn from_candidates(mut candidates: Vec<UserId>) -> Self {
        candidates.sort_unstable();
        candidates.dedup();
        match candidates.as_slice() {
            [] => UserMatch::None,
            [only] => UserMatch::Unique(*only),
            [lowest, ..] => UserMatch::Ambiguous {
                chosen: *lowest,
                candidates: candidates.len(),
            },
        }
    }

    /// The user to act on, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            UserMatch::None => None,
            UserMatch::Unique(id) | UserMatch::Ambiguous { chosen: id, .. } => Some(*id),
        }
    }

    /// Whether more than one user matched.
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, UserMatch::Ambiguous { .. })
    }
}

/// Outcome of an idempotent grant or revoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The target state changed.
    Applied,
    /// Grant requested for an assignment that already existed.
    AlreadyExists,
    /// Revoke requested for an assignment that did not exist.
    NotFound,
}
