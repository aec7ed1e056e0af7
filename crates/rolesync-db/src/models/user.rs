//! Local user accounts.

use rolesync_core::LocalUserField;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

/// A local user account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub idnumber: String,
}

impl User {
    /// Ids of every user whose `field` equals `value`, lowest first.
    ///
    /// For [`LocalUserField::Id`] a value that is not an integer matches nobody.
    pub async fn find_ids_by_field<'e, E>(
        executor: E,
        field: LocalUserField,
        value: &str,
    ) -> Result<Vec<i64>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(i64,)> = match field {
            LocalUserField::Id => {
                let Ok(id) = value.trim().parse::<i64>() else {
                    return Ok(Vec::new());
                };
                sqlx::query_as("SELECT id FROM users WHERE id = $1")
                    .bind(id)
                    .fetch_all(executor)
                    .await?
            }
            LocalUserField::Username | LocalUserField::Email | LocalUserField::IdNumber => {
                // Column name comes from a closed enum, never from input.
                let sql = format!(
                    "SELECT id FROM users WHERE {} = $1 ORDER BY id",
                    field.as_str()
                );
                sqlx::query_as(&sql).bind(value).fetch_all(executor).await?
            }
        };

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Create a user.
    pub async fn create<'e, E>(
        executor: E,
        username: &str,
        email: &str,
        idnumber: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO users (username, email, idnumber)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, idnumber
            ",
        )
        .bind(username)
        .bind(email)
        .bind(idnumber)
        .fetch_one(executor)
        .await
    }

    /// Delete a user and, through the foreign key, their assignments.
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
