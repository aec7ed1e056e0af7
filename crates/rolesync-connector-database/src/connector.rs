//! SQL database source
//!
//! Reads the external table through the `sqlx` Any driver, so the same code
//! path serves `PostgreSQL`, `MySQL` and `SQLite` sources. Each run opens one
//! dedicated connection; there is no pooling.
//!
//! The Any driver only decodes text, integer, float and binary values. Before
//! each select the table's declared column types are read from the catalog,
//! and every other column (dates, timestamps, booleans, decimals) is cast to
//! text in the statement itself.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Column, Connection, Executor, Row};
use tracing::{debug, info, instrument};

use rolesync_connector::config::{SourceConfig, SourceDriver};
use rolesync_connector::encoding::SourceEncoding;
use rolesync_connector::error::{ConnectorError, ConnectorResult};
use rolesync_connector::query::{count_sql, escape_literal, QuoteStyle, SelectQuery};
use rolesync_connector::row::{ExternalRow, RawValue};
use rolesync_connector::traits::{RowStream, SourceConnection, SourceConnector};

/// Log target for statements sent to the source when debugging is on.
pub const SQL_LOG_TARGET: &str = "rolesync::source_sql";

/// Connector for SQL database sources.
pub struct DatabaseConnector {
    /// Configuration.
    config: SourceConfig,

    /// Driver, resolved from the configuration.
    driver: SourceDriver,

    /// Source encoding, resolved from the configuration.
    encoding: SourceEncoding,

    /// Display name for this connector instance.
    display_name: String,
}

impl std::fmt::Debug for DatabaseConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnector")
            .field("config", &self.config.redacted())
            .field("display_name", &self.display_name)
            .finish()
    }
}

impl DatabaseConnector {
    /// Create a new database connector with the given configuration.
    pub fn new(config: SourceConfig) -> ConnectorResult<Self> {
        config.validate()?;

        let driver = match config.driver {
            Some(SourceDriver::Csv) | None => {
                return Err(ConnectorError::UnsupportedDriver {
                    driver: config
                        .driver
                        .map_or_else(|| "none".to_string(), |d| d.to_string()),
                })
            }
            Some(driver) => driver,
        };
        let encoding = config.source_encoding()?;

        let display_name = if driver == SourceDriver::Sqlite {
            format!("{}: {}", driver, config.host)
        } else {
            format!(
                "{}: {}@{}/{}",
                driver, config.username, config.host, config.database
            )
        };

        Ok(Self {
            config,
            driver,
            encoding,
            display_name,
        })
    }

    fn log_statement(&self, sql: &str) {
        if self.config.debug {
            debug!(target: SQL_LOG_TARGET, driver = %self.driver, sql = %sql, "Executing source statement");
        }
    }
}

#[async_trait]
impl SourceConnector for DatabaseConnector {
    fn driver(&self) -> SourceDriver {
        self.driver
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn encoding(&self) -> SourceEncoding {
        self.encoding
    }

    #[instrument(skip(self), fields(source = %self.display_name))]
    async fn connect(&self) -> ConnectorResult<Box<dyn SourceConnection>> {
        sqlx::any::install_default_drivers();

        let url = self.config.connection_url()?;
        let timeout = self.config.connection.connection_timeout();

        debug!(driver = %self.driver, host = %self.config.host, "Connecting to source database");

        let mut conn = tokio::time::timeout(timeout, AnyConnection::connect(&url))
            .await
            .map_err(|_| ConnectorError::ConnectionTimeout {
                timeout_secs: self.config.connection.connection_timeout_secs,
            })?
            .map_err(|e| {
                ConnectorError::connection_failed_with_source(
                    format!(
                        "Failed to connect to {} source at {}",
                        self.driver, self.config.host
                    ),
                    e,
                )
            })?;

        if let Some(setup) = self
            .config
            .setup_sql
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            self.log_statement(setup);
            conn.execute(setup).await.map_err(|e| {
                ConnectorError::connection_failed_with_source("Source setup statement failed", e)
            })?;
        }

        info!(driver = %self.driver, host = %self.config.host, "Source connection established");

        Ok(Box::new(DatabaseConnection {
            conn,
            driver: self.driver,
            encoding: self.encoding,
            quote_style: self.config.quote_style(),
            debug: self.config.debug,
        }))
    }
}

/// An open connection to a SQL source.
pub struct DatabaseConnection {
    conn: AnyConnection,
    driver: SourceDriver,
    encoding: SourceEncoding,
    quote_style: QuoteStyle,
    debug: bool,
}

impl std::fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("driver", &self.driver)
            .field("encoding", &self.encoding)
            .field("quote_style", &self.quote_style)
            .finish_non_exhaustive()
    }
}

impl DatabaseConnection {
    fn log_statement(&self, sql: &str) {
        if self.debug {
            debug!(target: SQL_LOG_TARGET, sql = %sql, "Executing source statement");
        }
    }

    /// Declared columns of `table`, in table order. Empty when the catalog
    /// has no entry for the table or cannot be read.
    async fn column_info(&mut self, table: &str) -> Vec<ColumnInfo> {
        let Some(sql) = catalog_sql(self.driver, table, self.quote_style) else {
            return Vec::new();
        };
        self.log_statement(&sql);

        match sqlx::query(&sql).fetch_all(&mut self.conn).await {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| {
                    Some(ColumnInfo {
                        name: row.try_get::<String, _>(0).ok()?,
                        declared_type: row
                            .try_get::<Option<String>, _>(1)
                            .ok()
                            .flatten()
                            .unwrap_or_default(),
                    })
                })
                .collect(),
            Err(e) => {
                debug!(table = %table, error = %e, "Column catalog lookup failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SourceConnection for DatabaseConnection {
    #[instrument(skip(self))]
    async fn count(&mut self, table: &str) -> ConnectorResult<u64> {
        let sql = count_sql(table);
        self.log_statement(&sql);

        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| {
                ConnectorError::query_failed_with_source(
                    format!("Count query on '{table}' failed"),
                    e,
                )
            })?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn select<'a>(&'a mut self, query: &'a SelectQuery) -> RowStream<'a> {
        Box::pin(try_stream! {
            let columns = self.column_info(query.table()).await;
            let sql = match text_projection(self.driver, query, &columns) {
                Some(projection) => {
                    debug!(table = %query.table(), "Reading columns of undecodable types as text");
                    query.to_sql_with_projection(&projection, self.quote_style, &self.encoding)?
                }
                None => query.to_sql(self.quote_style, &self.encoding)?,
            };
            self.log_statement(&sql);

            let mut rows = sqlx::query(&sql).fetch(&mut self.conn);
            while let Some(row) = rows.try_next().await.map_err(|e| {
                ConnectorError::query_failed_with_source(
                    format!("Reading '{}' failed", query.table()),
                    e,
                )
            })? {
                yield row_to_external(&row);
            }
        })
    }

    async fn close(self: Box<Self>) -> ConnectorResult<()> {
        let this = *self;
        this.conn
            .close()
            .await
            .map_err(|e| ConnectorError::query_failed_with_source("Closing source connection failed", e))?;
        debug!("Source connection closed");
        Ok(())
    }
}

/// A column as declared in the source catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnInfo {
    name: String,
    declared_type: String,
}

/// Catalog statement listing `(name, declared type)` for every column of `table`.
fn catalog_sql(driver: SourceDriver, table: &str, style: QuoteStyle) -> Option<String> {
    let (schema, name) = match table.trim().rsplit_once('.') {
        Some((schema, name)) => (Some(escape_literal(schema.trim(), style)), name.trim()),
        None => (None, table.trim()),
    };
    let name = escape_literal(name, style);

    match driver {
        SourceDriver::Sqlite => Some(match schema {
            Some(schema) => format!("SELECT name, type FROM pragma_table_info('{name}', '{schema}')"),
            None => format!("SELECT name, type FROM pragma_table_info('{name}')"),
        }),
        SourceDriver::Postgres => {
            let schema = schema.map_or_else(|| "current_schema()".to_string(), |s| format!("'{s}'"));
            Some(format!(
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_schema = {schema} AND lower(table_name) = lower('{name}') \
                 ORDER BY ordinal_position"
            ))
        }
        SourceDriver::MySql => {
            let schema = schema.map_or_else(|| "DATABASE()".to_string(), |s| format!("'{s}'"));
            Some(format!(
                "SELECT CAST(column_name AS CHAR), CAST(column_type AS CHAR) \
                 FROM information_schema.columns \
                 WHERE table_schema = {schema} AND table_name = '{name}' \
                 ORDER BY ordinal_position"
            ))
        }
        SourceDriver::Csv => None,
    }
}

/// Whether the Any driver decodes values of `declared_type` without a cast.
///
/// Untyped `SQLite` columns carry their runtime storage class, which is
/// always decodable.
fn decodes_natively(declared_type: &str) -> bool {
    let declared = declared_type.trim().to_ascii_lowercase();
    if declared.is_empty() {
        return true;
    }
    if declared.contains("unsigned") {
        return false;
    }
    if ["char", "text", "clob", "blob", "binary", "bytea"]
        .iter()
        .any(|kind| declared.contains(kind))
    {
        return true;
    }
    let base = declared.split('(').next().unwrap_or_default().trim();
    matches!(
        base,
        "integer"
            | "int"
            | "bigint"
            | "smallint"
            | "int2"
            | "int4"
            | "int8"
            | "real"
            | "float"
            | "float4"
            | "float8"
            | "double"
            | "double precision"
    )
}

fn quote_identifier(driver: SourceDriver, name: &str) -> String {
    match driver {
        SourceDriver::MySql => format!("`{}`", name.replace('`', "``")),
        _ => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

fn text_cast(driver: SourceDriver, column: &str) -> String {
    let text_type = match driver {
        SourceDriver::MySql => "CHAR",
        _ => "TEXT",
    };
    format!("CAST({column} AS {text_type}) AS {column}")
}

/// Projection reading every undecodable column as text, or `None` when the
/// query can run as written.
///
/// Configured fields are kept verbatim; `SELECT *` is expanded from the
/// catalog with quoted identifiers.
fn text_projection(
    driver: SourceDriver,
    query: &SelectQuery,
    columns: &[ColumnInfo],
) -> Option<Vec<String>> {
    if query.fields().is_empty() {
        if columns
            .iter()
            .all(|column| decodes_natively(&column.declared_type))
        {
            return None;
        }
        return Some(
            columns
                .iter()
                .map(|column| {
                    let ident = quote_identifier(driver, &column.name);
                    if decodes_natively(&column.declared_type) {
                        ident
                    } else {
                        text_cast(driver, &ident)
                    }
                })
                .collect(),
        );
    }

    let mut needs_cast = false;
    let projection: Vec<String> = query
        .fields()
        .iter()
        .map(|field| {
            let field = field.trim();
            let declared = columns
                .iter()
                .find(|column| column.name.eq_ignore_ascii_case(field));
            match declared {
                Some(column) if !decodes_natively(&column.declared_type) => {
                    needs_cast = true;
                    text_cast(driver, field)
                }
                _ => field.to_string(),
            }
        })
        .collect();
    needs_cast.then_some(projection)
}

/// Convert a driver row into an [`ExternalRow`].
///
/// Text stays text; numbers and booleans are rendered as strings; binary
/// columns are kept as raw bytes for the engine to decode.
fn row_to_external(row: &AnyRow) -> ExternalRow {
    let mut external = ExternalRow::new();
    for column in row.columns() {
        external.insert(column.name(), column_value(row, column.ordinal()));
    }
    external
}

fn column_value(row: &AnyRow, index: usize) -> RawValue {
    if let Ok(val) = row.try_get::<Option<String>, _>(index) {
        return val.into();
    }
    if let Ok(val) = row.try_get::<Option<i64>, _>(index) {
        return val.map(|v| v.to_string()).into();
    }
    if let Ok(val) = row.try_get::<Option<f64>, _>(index) {
        return val.map(|v| v.to_string()).into();
    }
    if let Ok(val) = row.try_get::<Option<bool>, _>(index) {
        return val.map(|v| v.to_string()).into();
    }
    if let Ok(val) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return val.into();
    }
    RawValue::Null
}
