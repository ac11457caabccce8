//! Application configuration model.
//!
//! Every section and field has a serde default so a partial `config.toml`
//! (or none at all) yields a working configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the marketplace backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

const fn default_timeout() -> u64 {
    30
}

/// Session guard timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Interval between background token checks in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Refresh proactively when less than this many seconds remain.
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            refresh_threshold_secs: default_refresh_threshold(),
        }
    }
}

const fn default_check_interval() -> u64 {
    60
}

const fn default_refresh_threshold() -> u64 {
    60
}

/// Retry wrapper defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            backoff_multiplier: default_multiplier(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_initial_delay() -> u64 {
    500
}

const fn default_multiplier() -> f64 {
    2.0
}

/// How filter state interacts with server-issued pagination cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CursorPolicy {
    /// Cursor URLs are followed exactly as issued.
    #[default]
    Authoritative,
    /// Filter keys missing from the cursor's query are layered on; keys the
    /// cursor already carries are left alone.
    FillMissing,
}

/// Listing query settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryConfig {
    #[serde(default)]
    pub cursor_policy: CursorPolicy,
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".campus-market")
    }

    /// Path of the SQLite file holding the session tokens.
    #[must_use]
    pub fn session_db_path(&self) -> PathBuf {
        self.data_dir().join("session.db")
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_file_path(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_secs(self.session.check_interval_secs)
    }

    /// Reject values the session guard and retry wrapper cannot run with.
    ///
    /// # Errors
    /// Returns `AppError::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(config_error("retry.max_attempts must be at least 1"));
        }
        let multiplier = self.retry.backoff_multiplier;
        if multiplier.is_nan() || multiplier < 1.0 {
            return Err(config_error("retry.backoff_multiplier must be at least 1.0"));
        }
        if self.session.check_interval_secs == 0 {
            return Err(config_error("session.check_interval_secs must be at least 1"));
        }
        url::Url::parse(&self.api.base_url).map_err(|e| AppError::Config {
            message: format!("api.base_url is not a valid URL: {e}"),
        })?;
        Ok(())
    }
}

fn config_error(message: &str) -> AppError {
    AppError::Config {
        message: message.to_string(),
    }
}
