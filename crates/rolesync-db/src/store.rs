//! `PostgreSQL` implementation of the target-system traits.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use rolesync_core::{
    AssignmentKey, AssignmentStore, ContextId, LocalUserField, MutationOutcome, RoleCatalog,
    RoleId, TargetError, TargetResult, UserCatalog, UserId, UserMatch,
};

use crate::error::DbError;
use crate::models::{Context, Role, RoleAssignment, User};
use crate::pool::DbPool;

/// Target store backed by the `rolesync-db` schema.
#[derive(Debug, Clone)]
pub struct PgTargetStore {
    pool: DbPool,
}

impl PgTargetStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn query_error(err: sqlx::Error) -> TargetError {
    DbError::QueryFailed(err).into()
}

#[async_trait]
impl RoleCatalog for PgTargetStore {
    #[instrument(skip(self))]
    async fn resolve_role(&self, shortname: &str) -> TargetResult<Option<RoleId>> {
        let role = Role::find_by_shortname(self.pool.inner(), shortname)
            .await
            .map_err(query_error)?;
        Ok(role.map(|r| RoleId::from_i64(r.id)))
    }
}

#[async_trait]
impl UserCatalog for PgTargetStore {
    #[instrument(skip(self))]
    async fn resolve_user(&self, field: LocalUserField, value: &str) -> TargetResult<UserMatch> {
        let ids = User::find_ids_by_field(self.pool.inner(), field, value)
            .await
            .map_err(query_error)?;
        Ok(UserMatch::from_candidates(
            ids.into_iter().map(UserId::from_i64).collect(),
        ))
    }
}

#[async_trait]
impl AssignmentStore for PgTargetStore {
    async fn system_context(&self) -> TargetResult<ContextId> {
        Context::system(self.pool.inner())
            .await
            .map_err(query_error)?
            .map(|ctx| ContextId::from_i64(ctx.id))
            .ok_or(TargetError::ContextMissing)
    }

    #[instrument(skip(self, roles), fields(role_count = roles.len()))]
    async fn list_assignments(
        &self,
        context: ContextId,
        roles: &BTreeSet<RoleId>,
    ) -> TargetResult<Vec<AssignmentKey>> {
        let role_ids: Vec<i64> = roles.iter().map(RoleId::as_i64).collect();
        let rows = RoleAssignment::list_for_roles(self.pool.inner(), context.as_i64(), &role_ids)
            .await
            .map_err(query_error)?;

        debug!(assignments = rows.len(), "Loaded current assignments");
        Ok(rows
            .into_iter()
            .map(|(user_id, role_id)| {
                AssignmentKey::new(UserId::from_i64(user_id), RoleId::from_i64(role_id))
            })
            .collect())
    }

    async fn grant(
        &self,
        key: AssignmentKey,
        context: ContextId,
    ) -> TargetResult<MutationOutcome> {
        let inserted = RoleAssignment::assign(
            self.pool.inner(),
            key.role_id.as_i64(),
            key.user_id.as_i64(),
            context.as_i64(),
        )
        .await
        .map_err(query_error)?;

        Ok(if inserted {
            MutationOutcome::Applied
        } else {
            MutationOutcome::AlreadyExists
        })
    }

    async fn revoke(
        &self,
        key: AssignmentKey,
        context: ContextId,
    ) -> TargetResult<MutationOutcome> {
        let deleted = RoleAssignment::unassign(
            self.pool.inner(),
            key.role_id.as_i64(),
            key.user_id.as_i64(),
            context.as_i64(),
        )
        .await
        .map_err(query_error)?;

        Ok(if deleted {
            MutationOutcome::Applied
        } else {
            MutationOutcome::NotFound
        })
    }
}
