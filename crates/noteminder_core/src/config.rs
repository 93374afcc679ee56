//! Process configuration resolved from the environment.
//!
//! # Responsibility
//! - Resolve database path, logging and platform profile for hosts (FFI,
//!   CLI) in one place.
//!
//! # Invariants
//! - Blank variables are treated as unset.
//! - Unknown values are rejected rather than silently replaced.

use crate::logging::{default_log_level, normalize_level};
use crate::reminder::platform::PlatformProfile;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "NOTEMINDER_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "NOTEMINDER_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "NOTEMINDER_LOG_DIR";
pub const PLATFORM_ENV: &str = "NOTEMINDER_PLATFORM";

const DEFAULT_DB_FILE_NAME: &str = "noteminder.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
        }
    }
}

impl Error for ConfigError {}

/// Host-level settings for the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: &'static str,
    /// Absolute directory for rolling logs. `None` leaves logging to the host.
    pub log_dir: Option<PathBuf>,
    pub platform: PlatformProfile,
}

impl CoreConfig {
    /// Reads `NOTEMINDER_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, one call per variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let db_path = read(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));

        let log_level = match read(LOG_LEVEL_ENV) {
            Some(value) => normalize_level(&value).map_err(|_| ConfigError::InvalidValue {
                key: LOG_LEVEL_ENV,
                value,
            })?,
            None => default_log_level(),
        };

        let platform = match read(PLATFORM_ENV) {
            Some(value) => {
                PlatformProfile::parse(&value).ok_or(ConfigError::InvalidValue {
                    key: PLATFORM_ENV,
                    value,
                })?
            }
            None => PlatformProfile::current(),
        };

        Ok(Self {
            db_path,
            log_level,
            log_dir: read(LOG_DIR_ENV).map(PathBuf::from),
            platform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DB_PATH_ENV, LOG_LEVEL_ENV, PLATFORM_ENV};
    use crate::reminder::platform::PlatformProfile;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = CoreConfig::from_lookup(lookup(&[])).expect("defaults should resolve");
        assert!(config.db_path.ends_with("noteminder.sqlite3"));
        assert_eq!(config.log_dir, None);
        assert_eq!(config.platform, PlatformProfile::current());
    }

    #[test]
    fn explicit_values_are_normalized() {
        let config = CoreConfig::from_lookup(lookup(&[
            (DB_PATH_ENV, " /data/notes.sqlite3 "),
            (LOG_LEVEL_ENV, "WARNING"),
            (PLATFORM_ENV, "android"),
        ]))
        .expect("explicit values should resolve");
        assert_eq!(config.db_path, PathBuf::from("/data/notes.sqlite3"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.platform, PlatformProfile::AlarmManager);
    }

    #[test]
    fn blank_db_path_falls_back_to_temp_dir() {
        let config =
            CoreConfig::from_lookup(lookup(&[(DB_PATH_ENV, "   ")])).expect("blank is unset");
        assert!(config.db_path.starts_with(std::env::temp_dir()));
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let error = CoreConfig::from_lookup(lookup(&[(PLATFORM_ENV, "toaster")]))
            .expect_err("unknown platform must fail");
        assert_eq!(
            error,
            ConfigError::InvalidValue {
                key: PLATFORM_ENV,
                value: "toaster".to_string()
            }
        );
    }
}
