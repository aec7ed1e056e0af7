//! Source connector traits
//!
//! A [`SourceConnector`] holds the configuration and opens connections.
//! A [`SourceConnection`] is one live, read-only session: it is opened once
//! per run, used for a row count and one streaming select, and closed.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::SourceDriver;
use crate::encoding::SourceEncoding;
use crate::error::ConnectorResult;
use crate::query::SelectQuery;
use crate::row::ExternalRow;

/// Lazy, finite, non-restartable sequence of source rows.
pub type RowStream<'a> = BoxStream<'a, ConnectorResult<ExternalRow>>;

/// Factory for connections to an external source.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Get the driver this connector speaks.
    fn driver(&self) -> SourceDriver;

    /// Get the display name for this connector instance.
    fn display_name(&self) -> &str;

    /// Encoding byte values from this source are decoded with.
    fn encoding(&self) -> SourceEncoding;

    /// Open a new connection.
    async fn connect(&self) -> ConnectorResult<Box<dyn SourceConnection>>;

    /// Open and immediately close a connection.
    async fn test_connection(&self) -> ConnectorResult<()> {
        let connection = self.connect().await?;
        connection.close().await
    }
}

/// An open connection to an external source.
#[async_trait]
pub trait SourceConnection: Send {
    /// Count the rows of `table`.
    async fn count(&mut self, table: &str) -> ConnectorResult<u64>;

    /// Stream the rows matching `query`.
    ///
    /// Rows are produced lazily; errors are yielded in-stream.
    fn select<'a>(&'a mut self, query: &'a SelectQuery) -> RowStream<'a>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> ConnectorResult<()>;
}
