//! Configuration management for the client.

use autotest_engine::{
    TestConfig, DEFAULT_PASSING_THRESHOLD, DEFAULT_QUIET_PERIOD_MS, DEFAULT_TIME_LIMIT_SECS,
};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL; without one the client runs local-only
    pub api_url: Option<String>,
    /// Bearer token sent to the backend
    pub token: Option<String>,
    /// Directory holding the local state files
    pub state_dir: PathBuf,
    /// Local question bank directory, preferred over the backend's
    pub tests_dir: Option<PathBuf>,
    /// Debounce quiet period for autosave
    pub autosave_ms: u64,
    /// How often to look for changes made by other processes
    pub storage_poll_ms: u64,
    pub passing_score: u32,
    pub time_limit_secs: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token: None,
            state_dir: PathBuf::from(".autotest"),
            tests_dir: None,
            autosave_ms: DEFAULT_QUIET_PERIOD_MS,
            storage_poll_ms: 1000,
            passing_score: DEFAULT_PASSING_THRESHOLD,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the environment (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            api_url: non_empty("AUTOTEST_API_URL").map(|url| url.trim_end_matches('/').to_string()),
            token: non_empty("AUTOTEST_TOKEN"),
            state_dir: non_empty("AUTOTEST_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            tests_dir: non_empty("AUTOTEST_TESTS_DIR").map(PathBuf::from),
            autosave_ms: parse_var("AUTOTEST_AUTOSAVE_MS", defaults.autosave_ms)?,
            storage_poll_ms: parse_var("AUTOTEST_STORAGE_POLL_MS", defaults.storage_poll_ms)?,
            passing_score: parse_var("AUTOTEST_PASSING_SCORE", defaults.passing_score)?,
            time_limit_secs: parse_var("AUTOTEST_TIME_LIMIT_SECS", defaults.time_limit_secs)?,
        })
    }

    /// Session parameters for every attempt started with this config.
    pub fn test_config(&self) -> TestConfig {
        TestConfig::new(self.passing_score, self.time_limit_secs)
    }

    pub fn storage_poll_interval(&self) -> Duration {
        Duration::from_millis(self.storage_poll_ms.max(1))
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}
