//! Administrative contexts assignments are scoped to.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

/// Context level of the system-wide scope.
pub const CONTEXT_SYSTEM: i32 = 10;

/// An administrative context.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Context {
    pub id: i64,
    pub context_level: i32,
    pub instance_id: i64,
}

impl Context {
    /// Fetch the system context, if it has been provisioned.
    pub async fn system<'e, E>(executor: E) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, context_level, instance_id
            FROM contexts
            WHERE context_level = $1 AND instance_id = 0
            ",
        )
        .bind(CONTEXT_SYSTEM)
        .fetch_optional(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_serialization() {
        let ctx = Context {
            id: 1,
            context_level: CONTEXT_SYSTEM,
            instance_id: 0,
        };
        let json = serde_json::to_string(&ctx).unwrap();
        assert_eq!(json, r#"{"id":1,"context_level":10,"instance_id":0}"#);
    }
}
