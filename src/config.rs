//! Configuration module for cloudfm.

use serde::Deserialize;
use std::path::Path;

use crate::api::StorageBackend;
use crate::browser::FailurePolicy;
use crate::{CloudFmError, Result};

/// Environment variable overriding `server.base_url`.
pub const ENV_SERVER_URL: &str = "CLOUDFM_SERVER_URL";

/// Environment variable overriding `server.storage`.
pub const ENV_STORAGE: &str = "CLOUDFM_STORAGE";

/// File server connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the file API (the `/api/...` routes are appended).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Storage backend selected at startup.
    #[serde(default)]
    pub storage: StorageBackend,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            storage: StorageBackend::default(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Upload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// What a failed upload does to the rest of its batch.
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_max_upload_size() -> u64 {
    32
}

impl UploadConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            on_failure: FailurePolicy::default(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

/// Download configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    /// Directory downloaded files are written to.
    #[serde(default = "default_download_dir")]
    pub directory: String,
}

fn default_download_dir() -> String {
    ".".to_string()
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
        }
    }
}

/// Display configuration for the file table.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Timezone for modification times (e.g., "Asia/Tokyo", "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// chrono format string for modification times.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Seconds a notification stays visible.
    #[serde(default = "default_notification_secs")]
    pub notification_secs: u64,
    /// Width of the name column.
    #[serde(default = "default_name_width")]
    pub name_width: usize,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_date_format() -> String {
    "%Y/%m/%d %H:%M:%S".to_string()
}

fn default_notification_secs() -> u64 {
    3
}

fn default_name_width() -> usize {
    32
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            date_format: default_date_format(),
            notification_secs: default_notification_secs(),
            name_width: default_name_width(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/cloudfm.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upload configuration.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Download configuration.
    #[serde(default)]
    pub download: DownloadConfig,
    /// Display configuration.
    #[serde(default)]
    pub display: DisplayConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(CloudFmError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| CloudFmError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `CLOUDFM_SERVER_URL`: Override the server base URL
    /// - `CLOUDFM_STORAGE`: Override the storage backend (`local` / `memory`)
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(ENV_SERVER_URL) {
            if !url.is_empty() {
                self.server.base_url = url;
            }
        }
        if let Ok(storage) = std::env::var(ENV_STORAGE) {
            if !storage.is_empty() {
                self.server.storage = storage.parse()?;
            }
        }
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The base URL does not parse or is not http/https
    /// - The display timezone is unknown
    /// - `notification_secs` is zero (notifications would never be visible)
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server.base_url).map_err(|e| {
            CloudFmError::Config(format!("invalid base_url {:?}: {e}", self.server.base_url))
        })?;
        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(CloudFmError::Config(format!(
                    "unsupported base_url scheme: {scheme}"
                )));
            }
        }
        if self.display.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(CloudFmError::Config(format!(
                "unknown timezone: {}",
                self.display.timezone
            )));
        }
        if self.display.notification_secs == 0 {
            return Err(CloudFmError::Config(
                "display.notification_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
