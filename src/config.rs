use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    #[serde(default)]
    pub ledger: LedgerSettings,
    pub application: ApplicationSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// How long a statement may wait for a row lock before failing with a conflict.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    /// Upper bound on a whole unit of work, including lock waits.
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Timeouts applied to every unit of work opened by the transactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactorSettings {
    pub lock_timeout: Duration,
    pub statement_timeout: Duration,
    pub transaction_timeout: Duration,
}

impl Default for TransactorSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(default_lock_timeout_ms()),
            statement_timeout: Duration::from_millis(default_statement_timeout_ms()),
            transaction_timeout: Duration::from_millis(default_transaction_timeout_ms()),
        }
    }
}

impl From<&DatabaseSettings> for TransactorSettings {
    fn from(database: &DatabaseSettings) -> Self {
        Self {
            lock_timeout: Duration::from_millis(database.lock_timeout_ms),
            statement_timeout: Duration::from_millis(database.statement_timeout_ms),
            transaction_timeout: Duration::from_millis(database.transaction_timeout_ms),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }

    pub fn transactor(&self) -> TransactorSettings {
        TransactorSettings::from(&self.database)
    }
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_statement_timeout_ms() -> u64 {
    10_000
}

fn default_transaction_timeout_ms() -> u64 {
    30_000
}

fn default_page_size() -> u32 {
    10
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_log_format() -> String {
    "pretty".to_string()
}
