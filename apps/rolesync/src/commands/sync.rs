//! Sync command - Reconcile role assignments with the external source

use clap::Args;
use std::sync::Arc;
use tracing::info;

use rolesync_connector::SourceConnector;
use rolesync_connector_database::connector_for;
use rolesync_db::{run_migrations, DbPool, PgTargetStore};
use rolesync_provisioning::reconciliation::{BufferedTrace, TracingTrace};
use rolesync_provisioning::{ReconciliationEngine, SyncReport};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Print the plain-text run transcript on stdout
    #[arg(long, conflicts_with = "json")]
    pub transcript: bool,

    /// Apply target database migrations before syncing
    #[arg(long)]
    pub migrate: bool,
}

/// Execute the sync command. Returns the process exit code.
pub async fn execute(args: SyncArgs, config: AppConfig) -> AppResult<i32> {
    // Nothing is contacted until the configuration is complete.
    config.sync.check_complete()?;
    let target_url = config.require_target_url()?;

    let connector: Arc<dyn SourceConnector> = Arc::from(connector_for(&config.sync.source)?);
    info!(
        source = %connector.display_name(),
        config = ?config.sync.redacted(),
        "Loaded sync configuration"
    );

    let pool = DbPool::connect(target_url).await?;
    if args.migrate {
        run_migrations(&pool).await?;
    }

    let engine = ReconciliationEngine::new(connector, Arc::new(PgTargetStore::new(pool.clone())));
    let report = if args.transcript {
        let trace = BufferedTrace::new();
        let report = engine.sync(&config.sync, &trace).await;
        println!("{}", trace.transcript());
        report
    } else {
        engine.sync(&config.sync, &TracingTrace::new()).await
    };
    pool.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !args.transcript {
        print_summary(&report);
    }
    Ok(report.exit_code)
}

fn print_summary(report: &SyncReport) {
    for line in report.summary_lines() {
        println!("{line}");
    }
}
