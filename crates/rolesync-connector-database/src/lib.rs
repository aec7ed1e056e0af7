//! # Database Source Connectors
//!
//! Implementations of the `rolesync-connector` traits:
//!
//! - [`DatabaseConnector`] - `PostgreSQL`, `MySQL` and `SQLite` through the `sqlx` Any driver
//! - [`CsvConnector`] - a directory of CSV files, one file per table
//!
//! ## Example
//!
//! ```ignore
//! use rolesync_connector::{SourceConfig, SourceDriver};
//! use rolesync_connector_database::connector_for;
//!
//! let config = SourceConfig::new(SourceDriver::MySql, "hr-db.internal")
//!     .with_database("hr")
//!     .with_username("sync")
//!     .with_password("secret")
//!     .with_setup_sql("SET NAMES 'utf8'");
//!
//! let connector = connector_for(&config)?;
//! connector.test_connection().await?;
//! ```

pub mod connector;
pub mod csv_source;

use rolesync_connector::config::{SourceConfig, SourceDriver};
use rolesync_connector::error::{ConnectorError, ConnectorResult};
use rolesync_connector::traits::SourceConnector;

// Re-exports
pub use connector::{DatabaseConnection, DatabaseConnector, SQL_LOG_TARGET};
pub use csv_source::{CsvConnection, CsvConnector};

/// Build the connector matching the configured driver.
pub fn connector_for(config: &SourceConfig) -> ConnectorResult<Box<dyn SourceConnector>> {
    match config.driver {
        Some(SourceDriver::Csv) => Ok(Box::new(CsvConnector::new(config)?)),
        Some(_) => Ok(Box::new(DatabaseConnector::new(config.clone())?)),
        None => Err(ConnectorError::invalid_configuration("driver is required")),
    }
}
