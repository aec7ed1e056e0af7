//! Role definitions.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

/// A role that can be assigned to users.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    /// Unique short name external sources refer to the role by.
    pub shortname: String,
    pub name: String,
    pub description: String,
}

impl Role {
    /// Find a role by shortname.
    ///
    /// Shortnames are unique, but the lowest id wins should that constraint
    /// ever be relaxed.
    pub async fn find_by_shortname<'e, E>(
        executor: E,
        shortname: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, shortname, name, description
            FROM roles
            WHERE shortname = $1
            ORDER BY id
            LIMIT 1
            ",
        )
        .bind(shortname)
        .fetch_optional(executor)
        .await
    }

    /// Create a role.
    pub async fn create<'e, E>(
        executor: E,
        shortname: &str,
        name: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO roles (shortname, name)
            VALUES ($1, $2)
            RETURNING id, shortname, name, description
            ",
        )
        .bind(shortname)
        .bind(name)
        .fetch_one(executor)
        .await
    }

    /// Delete a role and, through the foreign key, its assignments.
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
