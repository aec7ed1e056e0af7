//! Source connector error types
//!
//! Error definitions, split by the phase in which they occur.

use thiserror::Error;

/// Error that can occur while talking to the external data source.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Connection errors
    /// Failed to establish connection to the external source.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connection timed out.
    #[error("connection timeout after {timeout_secs} seconds")]
    ConnectionTimeout { timeout_secs: u64 },

    // Configuration errors
    /// Source configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Driver name is not one this build can connect with.
    #[error("unsupported source driver: {driver}")]
    UnsupportedDriver { driver: String },

    /// Encoding label is not a known character encoding.
    #[error("unsupported source encoding: {label}")]
    UnsupportedEncoding { label: String },

    /// A value cannot be expressed in the source encoding.
    #[error("value '{value}' cannot be represented in {encoding}")]
    UnrepresentableValue { value: String, encoding: String },

    // Read errors
    /// A query against the source failed.
    #[error("query failed: {message}")]
    QueryFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A configured column is absent from a row.
    #[error("field '{field}' is missing from the source row")]
    MissingField { field: String },

    /// Filesystem error while reading a file-backed source.
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl ConnectorError {
    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::UnsupportedDriver { .. } => "UNSUPPORTED_DRIVER",
            ConnectorError::UnsupportedEncoding { .. } => "UNSUPPORTED_ENCODING",
            ConnectorError::UnrepresentableValue { .. } => "UNREPRESENTABLE_VALUE",
            ConnectorError::QueryFailed { .. } => "QUERY_FAILED",
            ConnectorError::MissingField { .. } => "MISSING_FIELD",
            ConnectorError::Io { .. } => "IO_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a query failed error.
    pub fn query_failed(message: impl Into<String>) -> Self {
        ConnectorError::QueryFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a query failed error with source.
    pub fn query_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::QueryFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an I/O error with source.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        ConnectorError::Io {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
