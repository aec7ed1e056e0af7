//! Inspect command - Check the source connection and list the table columns

use clap::Args;
use serde::Serialize;

use rolesync_connector_database::connector_for;
use rolesync_provisioning::reconciliation::inspect_source;
use rolesync_provisioning::{SyncError, TableInspection};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output for inspect
#[derive(Serialize)]
struct InspectOutput<'a> {
    table: &'a str,
    columns: Vec<String>,
}

/// Execute the inspect command. Returns the process exit code.
pub async fn execute(args: InspectArgs, config: AppConfig) -> AppResult<i32> {
    let sync = &config.sync;
    if sync.remote_table.trim().is_empty() {
        eprintln!("External table not specified.");
        return Ok(1);
    }

    let connector = connector_for(&sync.source)?;
    let inspection = match inspect_source(connector.as_ref(), sync).await {
        Ok(inspection) => inspection,
        Err(err) => {
            eprintln!("{}", failure_message(&err));
            return Ok(err.exit_code());
        }
    };

    if args.json {
        let columns = match &inspection {
            TableInspection::Empty => Vec::new(),
            TableInspection::Columns(columns) => columns.clone(),
        };
        let output = InspectOutput {
            table: &sync.remote_table,
            columns,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{inspection}");
    }
    Ok(0)
}

fn failure_message(err: &SyncError) -> String {
    match err {
        SyncError::ConnectFailure(source) => format!("Cannot connect the database. {source}"),
        SyncError::ReadFailure(source) => format!("Can not read external table. {source}"),
        other => other.to_string(),
    }
}
