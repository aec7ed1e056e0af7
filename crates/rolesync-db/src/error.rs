//! Error types for the rolesync-db crate.
//!
//! Wraps `SQLx` errors with context and converts them into the target-system
//! error the engine understands.

use rolesync_core::TargetError;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),
}

impl From<DbError> for TargetError {
    fn from(err: DbError) -> Self {
        TargetError::database_with_source(err.to_string(), err)
    }
}
