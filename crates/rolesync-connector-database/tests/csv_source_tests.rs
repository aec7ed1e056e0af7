//! Integration tests for the CSV directory source.

use futures::TryStreamExt;
use tempfile::TempDir;

use rolesync_connector::{
    ExternalRow, SelectQuery, SourceConfig, SourceConnection, SourceConnector, SourceDriver,
};
use rolesync_connector_database::connector_for;

fn write_table(dir: &TempDir, table: &str, contents: &[u8]) {
    std::fs::write(dir.path().join(format!("{table}.csv")), contents).unwrap();
}

fn csv_config(dir: &TempDir) -> SourceConfig {
    SourceConfig::new(SourceDriver::Csv, dir.path().to_string_lossy())
}

#[tokio::test]
async fn test_latin1_file_is_decoded() {
    let dir = TempDir::new().unwrap();
    write_table(&dir, "staff", b"username,role\nJos\xe9,editor\nZo\xeb,viewer\n");

    let connector = connector_for(&csv_config(&dir).with_encoding("latin1")).unwrap();
    let encoding = connector.encoding();
    let mut conn = connector.connect().await.unwrap();

    assert_eq!(conn.count("staff").await.unwrap(), 2);

    let query = SelectQuery::from_table("staff");
    let rows: Vec<ExternalRow> = conn.select(&query).try_collect().await.unwrap();
    let names: Vec<String> = rows
        .iter()
        .filter_map(|r| r.get("username"))
        .filter_map(|v| v.decode(&encoding))
        .map(|v| v.into_owned())
        .collect();
    assert_eq!(names, vec!["José", "Zoë"]);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_condition_value_matches_decoded_text() {
    let dir = TempDir::new().unwrap();
    write_table(&dir, "staff", b"username,role\nJos\xe9,editor\nZo\xeb,viewer\n");

    let connector = connector_for(&csv_config(&dir).with_encoding("latin1")).unwrap();
    let mut conn = connector.connect().await.unwrap();

    let query = SelectQuery::from_table("staff").with_condition("username", "Zoë");
    let rows: Vec<ExternalRow> = conn.select(&query).try_collect().await.unwrap();
    assert_eq!(rows.len(), 1);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_directory_is_a_connect_failure() {
    let dir = TempDir::new().unwrap();
    let config = SourceConfig::new(
        SourceDriver::Csv,
        dir.path().join("missing").to_string_lossy(),
    );

    let connector = connector_for(&config).unwrap();
    let err = connector.connect().await.err().unwrap();
    assert_eq!(err.error_code(), "CONNECTION_FAILED");
}

#[tokio::test]
async fn test_missing_table_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let connector = connector_for(&csv_config(&dir)).unwrap();
    let mut conn = connector.connect().await.unwrap();

    let err = conn.count("absent").await.unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
}

#[tokio::test]
async fn test_empty_table_yields_no_rows() {
    let dir = TempDir::new().unwrap();
    write_table(&dir, "staff", b"username,role\n");

    let connector = connector_for(&csv_config(&dir)).unwrap();
    let mut conn = connector.connect().await.unwrap();

    assert_eq!(conn.count("staff").await.unwrap(), 0);
    let query = SelectQuery::from_table("staff");
    let rows: Vec<ExternalRow> = conn.select(&query).try_collect().await.unwrap();
    assert!(rows.is_empty());
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_rows_can_be_taken_one_at_a_time() {
    let dir = TempDir::new().unwrap();
    write_table(&dir, "staff", b"username,role\nu1,editor\nu2,viewer\nu3,editor\n");

    let connector = connector_for(&csv_config(&dir)).unwrap();
    let encoding = connector.encoding();
    let mut conn = connector.connect().await.unwrap();

    let query = SelectQuery::from_table("staff").with_condition("role", "editor");
    {
        let mut rows = conn.select(&query);
        let first = rows.try_next().await.unwrap().unwrap();
        assert_eq!(
            first.get("username").and_then(|v| v.decode(&encoding)).as_deref(),
            Some("u1")
        );
        let second = rows.try_next().await.unwrap().unwrap();
        assert_eq!(
            second.get("username").and_then(|v| v.decode(&encoding)).as_deref(),
            Some("u3")
        );
        assert!(rows.try_next().await.unwrap().is_none());
    }

    // A stream dropped part way leaves the connection usable.
    {
        let mut rows = conn.select(&query);
        assert!(rows.try_next().await.unwrap().is_some());
    }
    assert_eq!(conn.count("staff").await.unwrap(), 3);
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_projected_column_fails_before_any_row() {
    let dir = TempDir::new().unwrap();
    write_table(&dir, "staff", b"username,role\nu1,editor\n");

    let connector = connector_for(&csv_config(&dir)).unwrap();
    let mut conn = connector.connect().await.unwrap();

    let query = SelectQuery::from_table("staff").with_fields(["username", "campus"]);
    let err = conn.select(&query).try_next().await.unwrap_err();
    assert_eq!(err.error_code(), "MISSING_FIELD");
    conn.close().await.unwrap();
}
