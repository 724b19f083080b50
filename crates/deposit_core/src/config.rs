//! Environment-driven runtime configuration.
//!
//! # Responsibility
//! - Resolve log, database and retry settings from `DEPOSIT_*` variables.
//!
//! # Invariants
//! - Unset variables fall back to defaults; malformed values are errors,
//!   never silently replaced.

use crate::logging::default_log_level;
use crate::service::deposit_service::DepositServiceConfig;
use crate::service::retry::{PublishRetryPolicy, DEFAULT_MAX_ATTEMPTS};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_LOG_LEVEL: &str = "DEPOSIT_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "DEPOSIT_LOG_DIR";
pub const ENV_DB_PATH: &str = "DEPOSIT_DB_PATH";
pub const ENV_PUBLISH_MAX_ATTEMPTS: &str = "DEPOSIT_PUBLISH_MAX_ATTEMPTS";
pub const ENV_PUBLISH_INITIAL_DELAY_MS: &str = "DEPOSIT_PUBLISH_INITIAL_DELAY_MS";

const DEFAULT_DB_FILE_NAME: &str = "deposits.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for {key}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Resolved process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub log_level: String,
    /// File logging is enabled only when set.
    pub log_dir: Option<String>,
    pub db_path: PathBuf,
    pub service: DepositServiceConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            service: DepositServiceConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let max_attempts = match read(ENV_PUBLISH_MAX_ATTEMPTS) {
            Some(raw) => parse_u32(ENV_PUBLISH_MAX_ATTEMPTS, &raw)?,
            None => DEFAULT_MAX_ATTEMPTS,
        };
        let mut retry = PublishRetryPolicy::default().with_max_attempts(max_attempts);
        if let Some(raw) = read(ENV_PUBLISH_INITIAL_DELAY_MS) {
            let millis = parse_u32(ENV_PUBLISH_INITIAL_DELAY_MS, &raw)?;
            retry.initial_delay = Duration::from_millis(u64::from(millis));
            retry.max_delay = retry.max_delay.max(retry.initial_delay);
        }

        Ok(Self {
            log_level: read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: read(ENV_LOG_DIR),
            db_path: read(ENV_DB_PATH).map_or(defaults.db_path, PathBuf::from),
            service: DepositServiceConfig { retry },
        })
    }
}

fn parse_u32(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
