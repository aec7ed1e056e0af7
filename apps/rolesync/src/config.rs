//! Environment configuration.
//!
//! Every variable is prefixed with `ROLESYNC_`. Sync settings that are
//! absent load as empty values; the engine reports them as incomplete.
//! Values that are present but malformed are rejected here.

use std::env::VarError;
use std::str::FromStr;

use rolesync_connector::{ConnectionSettings, SourceConfig, SourceDriver, SourceEncoding};
use rolesync_core::{LocalUserField, RoleId};
use rolesync_provisioning::{RemoveAction, SyncConfig};

use crate::logging::LogFormat;

const PREFIX: &str = "ROLESYNC_";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Synchronisation settings, including the source descriptor.
    pub sync: SyncConfig,
    /// `PostgreSQL` URL of the target system.
    pub target_database_url: Option<String>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let vars = Vars { reader };

        let driver = vars.parsed::<SourceDriver>("SOURCE_DRIVER")?;
        let encoding = vars
            .string("SOURCE_ENCODING")
            .unwrap_or_else(|| rolesync_connector::encoding::DEFAULT_ENCODING.to_string());
        SourceEncoding::for_label(&encoding)
            .map_err(|e| ConfigError::InvalidValue(var_name("SOURCE_ENCODING"), e.to_string()))?;

        let connection = ConnectionSettings::default().with_connection_timeout(
            vars.parsed::<u64>("SOURCE_CONNECT_TIMEOUT_SECS")?
                .unwrap_or(ConnectionSettings::default().connection_timeout_secs),
        );

        let source = SourceConfig {
            driver,
            host: vars.string("SOURCE_HOST").unwrap_or_default(),
            port: vars.parsed::<u16>("SOURCE_PORT")?,
            username: vars.string("SOURCE_USER").unwrap_or_default(),
            password: vars.string("SOURCE_PASSWORD"),
            database: vars.string("SOURCE_DATABASE").unwrap_or_default(),
            setup_sql: vars.string("SOURCE_SETUP_SQL"),
            encoding,
            sybase_quoting: vars.flag("SOURCE_SYBASE_QUOTING")?,
            debug: vars.flag("SOURCE_DEBUG")?,
            connection,
        };

        let sync_roles = match vars.string("SYNC_ROLES") {
            Some(list) => parse_role_list(&list)?,
            None => Vec::new(),
        };

        let sync = SyncConfig {
            source,
            remote_table: vars.string("REMOTE_TABLE").unwrap_or_default(),
            user_field: vars.string("USER_FIELD").unwrap_or_default(),
            role_field: vars.string("ROLE_FIELD").unwrap_or_default(),
            local_user_field: vars
                .parsed::<LocalUserField>("LOCAL_USER_FIELD")?
                .unwrap_or_default(),
            sync_roles: sync_roles.into_iter().collect(),
            remove_action: vars
                .parsed::<RemoveAction>("REMOVE_ACTION")?
                .unwrap_or_default(),
            min_records: vars
                .parsed::<u64>("MIN_RECORDS")?
                .unwrap_or(rolesync_provisioning::reconciliation::DEFAULT_MIN_RECORDS),
        };

        Ok(Self {
            sync,
            target_database_url: vars.string("TARGET_DATABASE_URL"),
            log_format: vars.parsed::<LogFormat>("LOG_FORMAT")?.unwrap_or_default(),
        })
    }

    /// The target database URL, required to run a sync.
    pub fn require_target_url(&self) -> Result<&str, ConfigError> {
        self.target_database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar(var_name("TARGET_DATABASE_URL")))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn var_name(key: &str) -> String {
    format!("{PREFIX}{key}")
}

/// Prefixed variable lookups. Blank values count as unset.
struct Vars<F> {
    reader: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.reader)(&var_name(key))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(key)
            .map(|value| {
                value
                    .parse::<T>()
                    .map_err(|e| ConfigError::InvalidValue(var_name(key), e.to_string()))
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.string(key).map(|v| v.to_lowercase()).as_deref() {
            None | Some("false" | "0" | "no" | "off") => Ok(false),
            Some("true" | "1" | "yes" | "on") => Ok(true),
            Some(other) => Err(ConfigError::InvalidValue(
                var_name(key),
                format!("'{other}' is not a boolean"),
            )),
        }
    }
}

fn parse_role_list(list: &str) -> Result<Vec<RoleId>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<RoleId>()
                .map_err(|e| ConfigError::InvalidValue(var_name("SYNC_ROLES"), e.to_string()))
        })
        .collect()
}
