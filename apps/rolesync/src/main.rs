//! rolesync - synchronise system role assignments from an external database
//!
//! Reads the desired role assignments from an external table, grants the
//! missing ones in the target system and revokes the ones that disappeared.
//! All settings come from `ROLESYNC_*` environment variables (a `.env` file
//! is loaded first).
//!
//! Exit codes: `0` success, `1` incomplete configuration, connection failure
//! or too few source records, `4` source or target read failure.

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod error;
mod logging;

use config::AppConfig;
use error::AppResult;

/// rolesync - external database role synchronisation
#[derive(Parser)]
#[command(name = "rolesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronise role assignments with the external source
    Sync(commands::sync::SyncArgs),

    /// Check the source connection and list the columns of the remote table
    Inspect(commands::inspect::InspectArgs),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            e.print();
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> AppResult<i32> {
    let config = AppConfig::from_env()?;
    logging::init_logging(config.log_format, config.sync.source.debug);

    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args, config).await,
        Commands::Inspect(args) => commands::inspect::execute(args, config).await,
    }
}
