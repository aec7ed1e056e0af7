//! # Source Connector Framework
//!
//! Abstractions for reading desired role assignments from an external,
//! read-only data source.
//!
//! ## Crate Organization
//!
//! - [`config`] - connection descriptor ([`SourceConfig`], [`SourceDriver`])
//! - [`encoding`] - source character encoding and transcoding
//! - [`query`] - literal escaping and the [`SelectQuery`] builder
//! - [`row`] - [`ExternalRow`] and [`RawValue`]
//! - [`traits`] - [`SourceConnector`] / [`SourceConnection`]
//! - [`error`] - error types with transient/permanent classification

pub mod config;
pub mod encoding;
pub mod error;
pub mod query;
pub mod row;
pub mod traits;

pub use config::{ConnectionSettings, SourceConfig, SourceDriver};
pub use encoding::SourceEncoding;
pub use error::{ConnectorError, ConnectorResult};
pub use query::{count_sql, escape_literal, QuoteStyle, SelectQuery};
pub use row::{ExternalRow, RawValue};
pub use traits::{RowStream, SourceConnection, SourceConnector};
