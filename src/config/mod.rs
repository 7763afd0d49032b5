//! Configuration management for mirrorselect
//!
//! This module handles loading and validating the main TOML configuration
//! file, environment variable overrides, and the mirror list it points to.

pub mod mirrors;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use mirrors::{load_mirror_list, parse_mirror_list, MirrorEntry};

/// Application name, used for the default user agent
pub const APP_NAME: &str = "mirrorselect";

/// Configuration errors
///
/// Every variant is fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a configuration file
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A field holds an invalid value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// A required field is missing
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Mirror URL could not be parsed
    #[error("Mirror URL invalid: {url} ({reason})")]
    InvalidUrl { url: String, reason: String },

    /// Mirror URL uses a scheme that cannot be probed
    #[error("Mirror URL unsupported: {url} (scheme '{scheme}')")]
    UnsupportedScheme { url: String, scheme: String },

    /// No mirror is marked as default
    #[error("No default mirror set")]
    NoDefaultMirror,

    /// More than one mirror is marked as default
    #[error("More than one default mirror: {}", .0.join(", "))]
    MultipleDefaultMirrors(Vec<String>),

    /// Two mirrors share a name
    #[error("Duplicate mirror name: {0}")]
    DuplicateMirror(String),

    /// Mirror list holds no mirrors at all
    #[error("Mirror list is empty")]
    EmptyMirrorList,

    /// Error in a specific mirror entry
    #[error("Mirror [{name}]: {source}")]
    Mirror {
        name: String,
        #[source]
        source: Box<ConfigError>,
    },

    /// GeoIP database could not be opened
    #[error("Failed to open GeoIP database {path}: {reason}")]
    GeoIpDatabase { path: PathBuf, reason: String },
}

impl ConfigError {
    /// Attach the mirror name to an error raised while loading that mirror
    pub fn for_mirror(name: impl Into<String>, source: ConfigError) -> Self {
        Self::Mirror {
            name: name.into(),
            source: Box::new(source),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the mirror list file (relative paths resolve against the config file)
    pub mirror_list: PathBuf,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// GeoIP database configuration
    #[serde(default)]
    pub geoip: GeoIpConfig,

    /// Mirror monitor configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Notification configuration
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen: SocketAddr,

    /// Take the client address from the first `X-Forwarded-For` entry
    pub trust_forwarded_for: bool,

    /// Enable request logging
    pub enable_request_logging: bool,

    /// Enable permissive CORS headers
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 3130)),
            trust_forwarded_for: false,
            enable_request_logging: true,
            enable_cors: false,
        }
    }
}

/// Flavor of the MMDB database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MmdbType {
    /// DB-IP city database
    #[default]
    #[serde(alias = "db-ip")]
    Dbip,
    /// MaxMind GeoLite2/GeoIP2 city database
    Maxmind,
}

/// GeoIP database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoIpConfig {
    /// Database flavor
    pub mmdb_type: MmdbType,

    /// Path of the `.mmdb` file; without it every client is "unknown"
    pub mmdb_file: Option<PathBuf>,
}

/// Mirror monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Whether the periodic monitor runs at all
    pub enabled: bool,

    /// Seconds between two monitoring cycles
    pub interval_secs: u64,

    /// Per-probe timeout in seconds
    pub timeout_secs: u64,

    /// Consecutive disagreeing probes required to flip a mirror
    pub hysteresis: u32,

    /// Verify TLS certificates of HTTPS mirrors
    pub tls_verify: bool,

    /// User-Agent sent with HTTP probes
    pub user_agent: String,

    /// Maximum number of concurrent probes
    pub workers: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            timeout_secs: 5,
            hysteresis: 3,
            tls_verify: true,
            user_agent: default_user_agent(),
            workers: 8,
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Executable invoked as `<exec> <mirror> <UP|DOWN>`
    pub exec: Option<PathBuf>,

    /// Timeout for the executable in seconds
    pub exec_timeout_secs: u64,

    /// Webhook receiving a JSON payload per event
    pub webhook_url: Option<String>,

    /// Bearer token for the webhook
    pub webhook_token: Option<String>,

    /// Timeout for the webhook in seconds
    pub webhook_timeout_secs: u64,

    /// Events buffered before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            exec: None,
            exec_timeout_secs: 3,
            webhook_url: None,
            webhook_token: None,
            webhook_timeout_secs: 10,
            queue_capacity: 64,
        }
    }
}

impl NotifyConfig {
    #[must_use]
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    #[must_use]
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    /// Whether any notification channel is configured
    pub fn has_channels(&self) -> bool {
        self.exec.is_some() || self.webhook_url.is_some()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn default_user_agent() -> String {
    format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Create a configuration with defaults for everything but the mirror list
    pub fn new(mirror_list: impl Into<PathBuf>) -> Self {
        Self {
            mirror_list: mirror_list.into(),
            server: ServerConfig::default(),
            geoip: GeoIpConfig::default(),
            monitor: MonitorConfig::default(),
            notify: NotifyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Parse a configuration file without resolving paths or validating
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load, resolve and validate a configuration file
    ///
    /// Relative paths inside the file are resolved against the directory
    /// holding the file, then environment overrides are applied.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.apply_env_overrides()?;
        config.validate()?;

        tracing::debug!(config = ?config, "Configuration loaded");
        Ok(config)
    }

    /// Resolve relative file paths against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.mirror_list.is_relative() {
            self.mirror_list = base.join(&self.mirror_list);
        }
        if let Some(mmdb) = self.geoip.mmdb_file.as_mut() {
            if mmdb.is_relative() {
                *mmdb = base.join(&*mmdb);
            }
        }
    }

    /// Apply `MIRRORSELECT_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(listen) = std::env::var("MIRRORSELECT_LISTEN") {
            self.server.listen = listen.parse().map_err(|_| ConfigError::InvalidValue {
                field: "MIRRORSELECT_LISTEN".to_string(),
                reason: format!("Invalid address: {listen}"),
            })?;
        }

        if let Ok(level) = std::env::var("MIRRORSELECT_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("MIRRORSELECT_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mirror_list.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "mirror_list".to_string(),
            });
        }

        if self.monitor.hysteresis == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.hysteresis".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.monitor.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.timeout_secs".to_string(),
                reason: "Timeout must be greater than 0".to_string(),
            });
        }

        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.interval_secs".to_string(),
                reason: "Interval must be greater than 0".to_string(),
            });
        }

        if self.monitor.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.workers".to_string(),
                reason: "Must allow at least 1 worker".to_string(),
            });
        }

        if self.notify.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "notify.queue_capacity".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if let Some(url) = &self.notify.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    field: "notify.webhook_url".to_string(),
                    reason: "Webhook URL must start with http:// or https://".to_string(),
                });
            }
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                reason: format!("Unknown format '{}'", self.logging.format),
            });
        }

        Ok(())
    }
}
