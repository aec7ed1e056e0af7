//! Error Types
//!
//! Errors raised by the target system (the authoritative store of users,
//! roles and role assignments).
//!
//! Lookups that simply find nothing are not errors: catalogs return
//! `Option`/[`UserMatch`](crate::UserMatch) for those. A `TargetError` means
//! the target system could not answer at all.

use thiserror::Error;

/// Error raised by a target-system operation.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The backing database rejected or failed a query.
    #[error("target database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The system-wide context has not been provisioned in the target.
    #[error("system context is missing from the target system")]
    ContextMissing,
}

impl TargetError {
    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        TargetError::Database {
            message: message.into(),
            source: None,
        }
    }

    /// Create a database error with source.
    pub fn database_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        TargetError::Database {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            TargetError::Database { .. } => "TARGET_DATABASE_ERROR",
            TargetError::ContextMissing => "TARGET_CONTEXT_MISSING",
        }
    }
}

/// Result type for target-system operations.
pub type TargetResult<T> = Result<T, TargetError>;
