//! Logging setup using tracing.
//!
//! Logs go to stderr so that `--json` reports on stdout stay parseable.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,rolesync=info";

/// Directive enabling the external source statement log.
const SOURCE_SQL_DIRECTIVE: &str = "rolesync::source_sql=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        })
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}', expected text or json")),
        }
    }
}

/// Build the event filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn build_filter(source_sql: bool) -> Result<EnvFilter, String> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .map_err(|e| e.to_string())?;
    if !source_sql {
        return Ok(filter);
    }
    let directive = SOURCE_SQL_DIRECTIVE
        .parse::<Directive>()
        .map_err(|e| e.to_string())?;
    Ok(filter.add_directive(directive))
}

/// Initialize the tracing subscriber.
///
/// `source_sql` additionally enables debug logging of every statement sent
/// to the external source.
///
/// # Panics
///
/// Panics if the subscriber has already been initialized.
pub fn init_logging(format: LogFormat, source_sql: bool) {
    let filter_layer = match build_filter(source_sql) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("FATAL: Failed to create log filter: {e}");
            std::process::exit(1);
        }
    };

    match format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .flatten_event(true);
            tracing_subscriber::registry()
                .with(fmt_layer)
                .with(filter_layer)
                .init();
        }
        LogFormat::Text => {
            let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
            tracing_subscriber::registry()
                .with(fmt_layer)
                .with(filter_layer)
                .init();
        }
    }

    tracing::debug!(format = %format, source_sql, "Logging initialized");
}
