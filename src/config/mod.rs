//! Configuration management for wfs-export
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::export::TabularFlattener;
use crate::geo::ReferenceSystemCode;

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "WFS_EXPORT_";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Feature service configuration
    #[serde(default)]
    pub service: ServiceConfig,

    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Feature service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Features per GetFeature request, 0 disables paging
    #[serde(default)]
    pub page_size: u64,

    /// WFS protocol version sent with every request
    #[serde(default = "default_wfs_version")]
    pub wfs_version: String,

    /// User-Agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory exported files are saved to
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Projection GeoJSON output is converted to
    #[serde(default = "default_standard_projection")]
    pub standard_projection: String,

    /// Filename label for the standard projection
    #[serde(default = "default_standard_label")]
    pub standard_label: String,

    /// CSV column delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Indent GeoJSON output
    #[serde(default)]
    pub pretty_geojson: bool,

    /// Show a spinner per running export
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_timeout() -> u64 {
    60
}

fn default_wfs_version() -> String {
    "2.0.0".to_string()
}

fn default_user_agent() -> String {
    format!("wfs-export/{}", env!("CARGO_PKG_VERSION"))
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_standard_projection() -> String {
    "EPSG:4326".to_string()
}

fn default_standard_label() -> String {
    "WGS84".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_show_progress() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    false
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            page_size: 0,
            wfs_version: default_wfs_version(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            standard_projection: default_standard_projection(),
            standard_label: default_standard_label(),
            delimiter: default_delimiter(),
            pretty_geojson: false,
            show_progress: default_show_progress(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::InvalidFormat(format!("{}: {}", path.display(), e))
            }
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist. Without one, the default path is used
    /// if present and defaults otherwise. The result is not validated; call
    /// [`Config::validate`] once every override has been applied.
    ///
    /// # Arguments
    /// * `path` - Optional explicit configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    debug!("Loading config from {}", default_path.display());
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `WFS_EXPORT_*` overrides
    ///
    /// # Arguments
    /// * `lookup` - Reads a variable by name
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(dir) = var("DOWNLOAD_DIR") {
            self.export.download_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = var("TIMEOUT") {
            self.service.timeout = parse_field("service.timeout", &timeout)?;
        }
        if let Some(page_size) = var("PAGE_SIZE") {
            self.service.page_size = parse_field("service.page_size", &page_size)?;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = LogLevel::parse(&level).ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: "logging.level".to_string(),
                    value: level.clone(),
                }
            })?;
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wfs-export")
            .join("config.toml")
    }

    /// Serialize to TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.service.timeout == 0 {
            return Err(invalid("service.timeout", "0"));
        }
        if self.service.wfs_version.trim().is_empty() {
            return Err(invalid("service.wfs_version", &self.service.wfs_version));
        }
        if !TabularFlattener::is_valid_delimiter(self.export.delimiter) {
            return Err(invalid(
                "export.delimiter",
                &format!("{:?}", self.export.delimiter),
            ));
        }
        if self.export.standard_label.trim().is_empty() {
            return Err(invalid("export.standard_label", &self.export.standard_label));
        }
        if ReferenceSystemCode::new(&self.export.standard_projection)
            .epsg()
            .is_none()
        {
            return Err(invalid(
                "export.standard_projection",
                &self.export.standard_projection,
            ));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout)
    }
}

fn invalid(field: &str, value: &str) -> crate::error::ExportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn parse_field<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(field, value))
}

impl LogLevel {
    /// Parse a level name, case-insensitive
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.timeout, 60);
        assert_eq!(config.service.page_size, 0);
        assert_eq!(config.export.standard_projection, "EPSG:4326");
        assert_eq!(config.export.standard_label, "WGS84");
        assert_eq!(config.export.delimiter, ',');
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [export]
            delimiter = ";"
            pretty_geojson = true

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.export.delimiter, ';');
        assert!(config.export.pretty_geojson);
        assert_eq!(config.export.standard_label, "WGS84");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.service.timeout, 60);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.service.page_size = 500;
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[service\ntimeout = ").unwrap_err();
        assert!(err.to_string().contains("Invalid config format"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.export.delimiter = '"';
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.service.timeout = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.standard_projection = "not a crs".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("WFS_EXPORT_TIMEOUT", "15"),
            ("WFS_EXPORT_LOG_LEVEL", "INFO"),
            ("WFS_EXPORT_DOWNLOAD_DIR", "/tmp/out"),
        ]);
        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.export.download_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = Config::default();
        let err = config
            .apply_env(|key| (key == "WFS_EXPORT_PAGE_SIZE").then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("service.page_size"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[service]\npage_size = 250\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.service.page_size, 250);

        let missing = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(missing.to_string().contains("not found"));
    }

    #[test]
    fn test_load_leaves_validation_to_caller() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[service]\ntimeout = 0\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.service.timeout, 0);
        assert!(config.validate().is_err());
    }
}
