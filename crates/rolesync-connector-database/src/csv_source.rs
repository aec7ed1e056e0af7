//! CSV directory source
//!
//! Treats a directory as a database: table `staff_roles` is the file
//! `<dir>/staff_roles.csv`, the first record holds the column names. Fields
//! are handed to the engine as raw bytes and decoded with the source
//! encoding, so files exported from legacy systems need no pre-conversion.

use async_stream::try_stream;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use rolesync_connector::config::{SourceConfig, SourceDriver};
use rolesync_connector::encoding::SourceEncoding;
use rolesync_connector::error::{ConnectorError, ConnectorResult};
use rolesync_connector::query::SelectQuery;
use rolesync_connector::row::{ExternalRow, RawValue};
use rolesync_connector::traits::{RowStream, SourceConnection, SourceConnector};

/// Connector for a directory of CSV files.
#[derive(Debug, Clone)]
pub struct CsvConnector {
    directory: PathBuf,
    encoding: SourceEncoding,
    display_name: String,
}

impl CsvConnector {
    /// Create a CSV connector; `config.host` is the directory.
    pub fn new(config: &SourceConfig) -> ConnectorResult<Self> {
        config.validate()?;
        if config.driver != Some(SourceDriver::Csv) {
            return Err(ConnectorError::UnsupportedDriver {
                driver: config
                    .driver
                    .map_or_else(|| "none".to_string(), |d| d.to_string()),
            });
        }

        let directory = PathBuf::from(config.host.trim());
        Ok(Self {
            display_name: format!("csv: {}", directory.display()),
            directory,
            encoding: config.source_encoding()?,
        })
    }
}

#[async_trait]
impl SourceConnector for CsvConnector {
    fn driver(&self) -> SourceDriver {
        SourceDriver::Csv
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn encoding(&self) -> SourceEncoding {
        self.encoding
    }

    #[instrument(skip(self), fields(source = %self.display_name))]
    async fn connect(&self) -> ConnectorResult<Box<dyn SourceConnection>> {
        let metadata = tokio::fs::metadata(&self.directory).await.map_err(|e| {
            ConnectorError::connection_failed_with_source(
                format!("Cannot open CSV directory {}", self.directory.display()),
                e,
            )
        })?;
        if !metadata.is_dir() {
            return Err(ConnectorError::connection_failed(format!(
                "{} is not a directory",
                self.directory.display()
            )));
        }

        info!(directory = %self.directory.display(), "CSV source opened");
        Ok(Box::new(CsvConnection {
            directory: self.directory.clone(),
            encoding: self.encoding,
        }))
    }
}

/// An open CSV directory.
#[derive(Debug)]
pub struct CsvConnection {
    directory: PathBuf,
    encoding: SourceEncoding,
}

impl CsvConnection {
    fn table_path(&self, table: &str) -> ConnectorResult<PathBuf> {
        table_path(&self.directory, table)
    }

    async fn read_table(&self, table: &str) -> ConnectorResult<Vec<u8>> {
        let path = self.table_path(table)?;
        debug!(path = %path.display(), "Reading CSV table");
        tokio::fs::read(&path)
            .await
            .map_err(|e| ConnectorError::io(format!("Cannot read {}", path.display()), e))
    }
}

fn table_path(directory: &Path, table: &str) -> ConnectorResult<PathBuf> {
    let table = table.trim();
    if table.is_empty() || table.contains(['/', '\\']) || table.starts_with('.') {
        return Err(ConnectorError::invalid_configuration(format!(
            "'{table}' is not a valid CSV table name"
        )));
    }
    Ok(directory.join(format!("{table}.csv")))
}

fn csv_error(table: &str, e: csv::Error) -> ConnectorError {
    ConnectorError::query_failed_with_source(format!("Malformed CSV in table '{table}'"), e)
}

type ByteReader<'a> = csv::Reader<&'a [u8]>;

fn open_reader(bytes: &[u8]) -> ByteReader<'_> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes)
}

/// Decoded, lower-cased header names. Fails when a projected field is absent.
fn read_headers(
    reader: &mut ByteReader<'_>,
    query: &SelectQuery,
    encoding: &SourceEncoding,
) -> ConnectorResult<Vec<String>> {
    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| csv_error(query.table(), e))?
        .iter()
        .map(|h| encoding.decode(h).trim().to_lowercase())
        .collect();

    for field in query.fields() {
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(field.trim())) {
            return Err(ConnectorError::MissingField {
                field: field.clone(),
            });
        }
    }
    Ok(headers)
}

/// Turn one record into a projected row, or `None` if it fails the conditions.
fn record_to_row(
    headers: &[String],
    record: &csv::ByteRecord,
    query: &SelectQuery,
    encoding: &SourceEncoding,
) -> Option<ExternalRow> {
    let row: ExternalRow = headers
        .iter()
        .zip(record.iter())
        .map(|(name, value)| (name.as_str(), RawValue::Bytes(value.to_vec())))
        .collect();

    matches_conditions(&row, query, encoding).then(|| project(row, query.fields()))
}

/// Parse a whole CSV document into rows, applying the query's conditions and projection.
fn parse_rows(
    bytes: &[u8],
    query: &SelectQuery,
    encoding: &SourceEncoding,
) -> ConnectorResult<Vec<ExternalRow>> {
    let mut reader = open_reader(bytes);
    let headers = read_headers(&mut reader, query, encoding)?;

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| csv_error(query.table(), e))?;
        rows.extend(record_to_row(&headers, &record, query, encoding));
    }
    Ok(rows)
}

fn matches_conditions(row: &ExternalRow, query: &SelectQuery, encoding: &SourceEncoding) -> bool {
    query.conditions().iter().all(|(column, expected)| {
        row.get(column)
            .and_then(|value| value.decode(encoding))
            .is_some_and(|value| value == expected.as_str())
    })
}

fn project(row: ExternalRow, fields: &[String]) -> ExternalRow {
    if fields.is_empty() {
        return row;
    }
    fields
        .iter()
        .map(|field| {
            let value = row.get(field).cloned().unwrap_or(RawValue::Null);
            (field.as_str(), value)
        })
        .collect()
}

/// Apply `DISTINCT` and `ORDER BY col [ASC|DESC]` to buffered rows.
fn finish_rows(
    mut rows: Vec<ExternalRow>,
    query: &SelectQuery,
    encoding: &SourceEncoding,
) -> Vec<ExternalRow> {
    if query.is_distinct() {
        let mut unique: Vec<ExternalRow> = Vec::with_capacity(rows.len());
        for row in rows {
            if !unique.contains(&row) {
                unique.push(row);
            }
        }
        rows = unique;
    }

    if let Some(sort) = query.sort() {
        let mut parts = sort.split_whitespace();
        let column = parts.next().unwrap_or_default().to_string();
        let descending = parts
            .next()
            .is_some_and(|dir| dir.eq_ignore_ascii_case("desc"));
        let key = |row: &ExternalRow| {
            row.get(&column)
                .and_then(|v| v.decode(encoding))
                .map(|v| v.into_owned())
        };
        rows.sort_by(|a, b| {
            let ordering = key(a).cmp(&key(b));
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
    rows
}

#[async_trait]
impl SourceConnection for CsvConnection {
    #[instrument(skip(self))]
    async fn count(&mut self, table: &str) -> ConnectorResult<u64> {
        let bytes = self.read_table(table).await?;
        let mut reader = open_reader(&bytes);
        let mut count = 0u64;
        for record in reader.byte_records() {
            record.map_err(|e| csv_error(table, e))?;
            count += 1;
        }
        Ok(count)
    }

    fn select<'a>(&'a mut self, query: &'a SelectQuery) -> RowStream<'a> {
        Box::pin(try_stream! {
            let bytes = self.read_table(query.table()).await?;

            if query.is_distinct() || query.sort().is_some() {
                let rows = parse_rows(&bytes, query, &self.encoding)?;
                for row in finish_rows(rows, query, &self.encoding) {
                    yield row;
                }
            } else {
                let mut reader = open_reader(&bytes);
                let headers = read_headers(&mut reader, query, &self.encoding)?;
                for record in reader.byte_records() {
                    let record = record.map_err(|e| csv_error(query.table(), e))?;
                    if let Some(row) = record_to_row(&headers, &record, query, &self.encoding) {
                        yield row;
                    }
                }
            }
        })
    }

    async fn close(self: Box<Self>) -> ConnectorResult<()> {
        debug!(directory = %self.directory.display(), "CSV source closed");
        Ok(())
    }
}
