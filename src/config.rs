//! Configuration loading and validation.
//!
//! Settings come from a JSON file in the user's config directory
//! (or `$IDLEWARDEN_CONFIG`), then environment overrides are applied.
//! A missing file is not an error; defaults are used.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default bridge server port.
pub const DEFAULT_PORT: u16 = 13234;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "IDLEWARDEN_CONFIG";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidOverride { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Inactivity monitor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Total idle budget before the session is logged out.
    pub timeout_secs: u64,

    /// How long before the timeout the warning dialog appears.
    pub warning_secs: u64,

    /// How often idle time is re-evaluated.
    pub poll_interval_secs: u64,

    /// Endpoint POSTed when the user chooses to stay logged in.
    pub extend_endpoint: String,

    /// Endpoint POSTed before redirecting to the login page.
    pub logout_endpoint: String,

    /// Login page the browser is sent to on expiry.
    pub login_url: String,

    /// Message passed to the login page on expiry.
    pub expiry_message: String,

    /// Per-request timeout for both endpoints.
    pub request_timeout_secs: u64,

    /// Session cookie forwarded to the endpoints (e.g. `PHPSESSID=...`).
    pub session_cookie: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15 * 60,
            warning_secs: 3 * 60,
            poll_interval_secs: 30,
            extend_endpoint: "http://localhost/api/extend_session.php".to_string(),
            logout_endpoint: "http://localhost/logout.php".to_string(),
            login_url: "login.php".to_string(),
            expiry_message: "Your session has expired due to inactivity. Please log in again."
                .to_string(),
            request_timeout_secs: 10,
            session_cookie: None,
        }
    }
}

impl MonitorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn warning_lead(&self) -> Duration {
        Duration::from_secs(self.warning_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks the timing invariants and endpoint shapes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        if self.warning_secs >= self.timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "warning_secs ({}) must be less than timeout_secs ({})",
                self.warning_secs, self.timeout_secs
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be positive".into(),
            ));
        }
        for (key, url) in [
            ("extend_endpoint", &self.extend_endpoint),
            ("logout_endpoint", &self.logout_endpoint),
        ] {
            if !url.starts_with("http://") {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be an absolute http:// URL, got {url:?}"
                )));
            }
        }
        if self.login_url.trim().is_empty() {
            return Err(ConfigError::Invalid("login_url must not be empty".into()));
        }
        Ok(())
    }
}

/// Page bridge server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    /// Capacity of the outbound broadcast channel.
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            broadcast_capacity: 100,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Loads configuration from the default location plus environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);

        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.monitor.validate()?;
        Ok(config)
    }

    /// Returns the default config path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("idlewarden")
            .join("config.json")
    }

    /// Reads a config file, falling back to defaults if it does not exist.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = ?path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(path = ?path, "Loaded config file");
        Ok(config)
    }

    /// Applies `IDLEWARDEN_*` overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(&lookup, "IDLEWARDEN_TIMEOUT_SECS")? {
            self.monitor.timeout_secs = v;
        }
        if let Some(v) = parse_override(&lookup, "IDLEWARDEN_WARNING_SECS")? {
            self.monitor.warning_secs = v;
        }
        if let Some(v) = parse_override(&lookup, "IDLEWARDEN_POLL_SECS")? {
            self.monitor.poll_interval_secs = v;
        }
        if let Some(v) = parse_override(&lookup, "IDLEWARDEN_PORT")? {
            self.server.port = v;
        }
        Ok(())
    }
}

fn parse_override<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidOverride { key, value }),
    }
}
