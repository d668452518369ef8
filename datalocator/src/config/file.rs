//! Configuration file handling for ~/.datalocator/config.ini.
//!
//! ```ini
//! [cache]
//! directory = ~/.datalocator/cache
//!
//! [bundle]
//! directory = /opt/app/resources
//!
//! [remote]
//! origin = https://example.com/content
//! timeout = 60
//! connect_timeout = 30
//!
//! [workers]
//! threads = 4
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::locator::{LocatorConfig, DEFAULT_WORKER_THREADS};
use crate::fetch::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// User configuration as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache_dir: PathBuf,
    pub bundle_dir: Option<PathBuf>,
    pub remote_origin: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub worker_threads: usize,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache_dir: config_directory().join("cache"),
            bundle_dir: None,
            remote_origin: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path (~/.datalocator/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        std::fs::write(path, self.to_config_string())
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Build the locator configuration described by this file.
    pub fn to_locator_config(&self) -> LocatorConfig {
        let mut config = LocatorConfig::new(self.cache_dir.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_worker_threads(self.worker_threads);
        config.bundle_dir = self.bundle_dir.clone();
        config.remote_origin = self.remote_origin.clone();
        config
    }

    fn to_config_string(&self) -> String {
        let bundle_dir = self
            .bundle_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let origin = self.remote_origin.as_deref().unwrap_or("");

        format!(
            "\
[cache]
; Root directory of the resource cache
directory = {}

[bundle]
; Directory of resources shipped with the application (optional)
directory = {}

[remote]
; Base URL remote resources are downloaded from (optional)
origin = {}
; Request timeout in seconds
timeout = {}
; Connect timeout in seconds
connect_timeout = {}

[workers]
; Background threads for asynchronous fetches
threads = {}
",
            self.cache_dir.display(),
            bundle_dir,
            origin,
            self.timeout_secs,
            self.connect_timeout_secs,
            self.worker_threads,
        )
    }
}

/// Parse an `Ini` object into a `ConfigFile`, overlaying defaults.
fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = non_empty(section.get("directory")) {
            config.cache_dir = expand_tilde(v);
        }
    }

    if let Some(section) = ini.section(Some("bundle")) {
        if let Some(v) = non_empty(section.get("directory")) {
            config.bundle_dir = Some(expand_tilde(v));
        }
    }

    if let Some(section) = ini.section(Some("remote")) {
        if let Some(v) = non_empty(section.get("origin")) {
            if !v.starts_with("http://") && !v.starts_with("https://") {
                return Err(invalid("remote", "origin", v, "must be an http(s) URL"));
            }
            config.remote_origin = Some(v.to_string());
        }
        if let Some(v) = non_empty(section.get("timeout")) {
            config.timeout_secs = parse_positive("remote", "timeout", v)?;
        }
        if let Some(v) = non_empty(section.get("connect_timeout")) {
            config.connect_timeout_secs = parse_positive("remote", "connect_timeout", v)?;
        }
    }

    if let Some(section) = ini.section(Some("workers")) {
        if let Some(v) = non_empty(section.get("threads")) {
            config.worker_threads = parse_positive("workers", "threads", v)? as usize;
        }
    }

    Ok(config)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_positive(section: &str, key: &str, value: &str) -> Result<u64, ConfigFileError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(section, key, value, "expected a positive integer")),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Get the path to the config directory (~/.datalocator).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".datalocator")
}

/// Get the path to the config file (~/.datalocator/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
