//! Runtime configuration read from the environment.

use std::{path::PathBuf, time::Duration};

use secrecy::SecretString;
use thiserror::Error;

pub const BACKEND_URL_VAR: &str = "KITLINE_BACKEND_URL";
pub const BACKEND_KEY_VAR: &str = "KITLINE_BACKEND_KEY";
pub const DATABASE_URL_VAR: &str = "KITLINE_DATABASE_URL";
pub const CACHE_PATH_VAR: &str = "KITLINE_CACHE_PATH";
pub const DASHBOARD_POLL_VAR: &str = "KITLINE_DASHBOARD_POLL_SECS";
pub const PROBE_VAR: &str = "KITLINE_PROBE_BEFORE_FETCH";
pub const REQUEST_TIMEOUT_VAR: &str = "KITLINE_REQUEST_TIMEOUT_SECS";

const DEFAULT_DASHBOARD_POLL_SECS: u64 = 60;
const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("{0} is set but {1} is missing")]
    Incomplete(&'static str, &'static str),
}

/// Hosted backend connection settings.
#[derive(Debug)]
pub struct BackendConfig {
    pub url: String,
    pub api_key: SecretString,
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLocation {
    Memory,
    File(PathBuf),
}

#[derive(Debug)]
pub struct Config {
    /// `None` runs against the local SQLite database.
    pub backend: Option<BackendConfig>,
    pub database_url: String,
    pub cache: CacheLocation,
    pub dashboard_poll_interval: Duration,
    pub probe_before_fetch: bool,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let backend = match (get(BACKEND_URL_VAR), get(BACKEND_KEY_VAR)) {
            (Some(url), Some(key)) => Some(BackendConfig {
                url,
                api_key: SecretString::from(key),
                request_timeout: parse_opt::<u64>(REQUEST_TIMEOUT_VAR, get(REQUEST_TIMEOUT_VAR))?
                    .map(Duration::from_secs),
            }),
            (Some(_), None) => return Err(ConfigError::Incomplete(BACKEND_URL_VAR, BACKEND_KEY_VAR)),
            (None, _) => None,
        };

        let database_url = get(DATABASE_URL_VAR).unwrap_or_else(|| {
            format!(
                "sqlite://{}",
                utils::assets::offline_database_path().to_string_lossy()
            )
        });

        let cache = match get(CACHE_PATH_VAR) {
            Some(value) if value.eq_ignore_ascii_case("memory") => CacheLocation::Memory,
            Some(path) => CacheLocation::File(PathBuf::from(path)),
            None => CacheLocation::File(utils::assets::availability_cache_path()),
        };

        let poll_secs = parse_opt::<u64>(DASHBOARD_POLL_VAR, get(DASHBOARD_POLL_VAR))?
            .unwrap_or(DEFAULT_DASHBOARD_POLL_SECS);
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: DASHBOARD_POLL_VAR,
                value: "0".to_string(),
            });
        }

        Ok(Self {
            backend,
            database_url,
            cache,
            dashboard_poll_interval: Duration::from_secs(poll_secs),
            probe_before_fetch: parse_opt::<bool>(PROBE_VAR, get(PROBE_VAR))?.unwrap_or(true),
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_opt::<u16>("PORT", get("PORT"))?.unwrap_or(DEFAULT_PORT),
        })
    }
}

fn parse_opt<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue { key, value })
        })
        .transpose()
}
