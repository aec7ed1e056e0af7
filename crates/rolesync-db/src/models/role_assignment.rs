//! Role assignments: a user holding a role within a context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

/// Component recorded on assignments created by the synchroniser.
pub const SYNC_COMPONENT: &str = "rolesync";

/// A role assignment row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleAssignment {
    pub id: i64,
    pub role_id: i64,
    pub user_id: i64,
    pub context_id: i64,
    /// Which subsystem created the assignment.
    pub component: String,
    pub assigned_at: DateTime<Utc>,
}

impl RoleAssignment {
    /// List `(user_id, role_id)` pairs in a context for the given roles.
    pub async fn list_for_roles<'e, E>(
        executor: E,
        context_id: i64,
        role_ids: &[i64],
    ) -> Result<Vec<(i64, i64)>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT user_id, role_id
            FROM role_assignments
            WHERE context_id = $1 AND role_id = ANY($2)
            ORDER BY user_id, role_id
            ",
        )
        .bind(context_id)
        .bind(role_ids)
        .fetch_all(executor)
        .await
    }

    /// Assign a role. Returns `false` when the assignment already existed.
    pub async fn assign<'e, E>(
        executor: E,
        role_id: i64,
        user_id: i64,
        context_id: i64,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            INSERT INTO role_assignments (role_id, user_id, context_id, component)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (role_id, user_id, context_id) DO NOTHING
            ",
        )
        .bind(role_id)
        .bind(user_id)
        .bind(context_id)
        .bind(SYNC_COMPONENT)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a role assignment. Returns `false` when there was none.
    pub async fn unassign<'e, E>(
        executor: E,
        role_id: i64,
        user_id: i64,
        context_id: i64,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            DELETE FROM role_assignments
            WHERE role_id = $1 AND user_id = $2 AND context_id = $3
            ",
        )
        .bind(role_id)
        .bind(user_id)
        .bind(context_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch a single assignment.
    pub async fn find<'e, E>(
        executor: E,
        role_id: i64,
        user_id: i64,
        context_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, role_id, user_id, context_id, component, assigned_at
            FROM role_assignments
            WHERE role_id = $1 AND user_id = $2 AND context_id = $3
            ",
        )
        .bind(role_id)
        .bind(user_id)
        .bind(context_id)
        .fetch_optional(executor)
        .await
    }
}
