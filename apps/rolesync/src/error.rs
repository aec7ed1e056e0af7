//! CLI error types and exit codes

use thiserror::Error;

use rolesync_connector::ConnectorError;
use rolesync_db::DbError;
use rolesync_provisioning::SyncError;

use crate::config::ConfigError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: Configuration incomplete or invalid, connection failure, too few source records
/// - 4: The source table or the target assignments could not be read
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Sync(#[from] SyncError),

    #[error("Source connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Target database error: {0}")]
    Database(#[from] DbError),

    #[error("Failed to write report: {0}")]
    Output(#[from] serde_json::Error),
}

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Sync(err) => err.exit_code(),
            AppError::Config(_)
            | AppError::Connector(_)
            | AppError::Database(_)
            | AppError::Output(_) => 1,
        }
    }

    /// Print the error to stderr.
    pub fn print(&self) {
        eprintln!("Error: {self}");
    }
}
