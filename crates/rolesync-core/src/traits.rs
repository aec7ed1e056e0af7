//! Target-System Contracts
//!
//! The reconciliation engine never talks to the target database directly.
//! It goes through these three capability traits, which a store implements
//! once (`rolesync-db` for PostgreSQL, [`InMemoryTarget`](crate::InMemoryTarget)
//! for tests and dry runs).

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::TargetResult;
use crate::ids::{ContextId, RoleId};
use crate::types::{AssignmentKey, LocalUserField, MutationOutcome, UserMatch};

/// Resolves role shortnames to role identifiers.
#[async_trait]
pub trait RoleCatalog: Send + Sync {
    /// Look up a role by its shortname.
    ///
    /// Returns `Ok(None)` when no role carries the shortname.
    async fn resolve_role(&self, shortname: &str) -> TargetResult<Option<RoleId>>;
}

/// Resolves external user identifiers to local users.
#[async_trait]
pub trait UserCatalog: Send + Sync {
    /// Look up users whose `field` equals `value`.
    async fn resolve_user(&self, field: LocalUserField, value: &str) -> TargetResult<UserMatch>;
}

/// Reads and mutates role assignments within a context scope.
///
/// Grants and revokes are idempotent: granting an existing assignment or
/// revoking a missing one succeeds with [`MutationOutcome::AlreadyExists`] or
/// [`MutationOutcome::NotFound`].
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Resolve the system-wide context every assignment is scoped to.
    async fn system_context(&self) -> TargetResult<ContextId>;

    /// List assignments in `context` whose role is one of `roles`.
    async fn list_assignments(
        &self,
        context: ContextId,
        roles: &BTreeSet<RoleId>,
    ) -> TargetResult<Vec<AssignmentKey>>;

    /// Grant a role to a user.
    async fn grant(&self, key: AssignmentKey, context: ContextId)
        -> TargetResult<MutationOutcome>;

    /// Revoke a role from a user.
    async fn revoke(
        &self,
        key: AssignmentKey,
        context: ContextId,
    ) -> TargetResult<MutationOutcome>;
}

/// A store that implements every target-side capability.
pub trait TargetSystem: RoleCatalog + UserCatalog + AssignmentStore {}

impl<T: RoleCatalog + UserCatalog + AssignmentStore> TargetSystem for T {}
