//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;

use clap::Args;
use datalocator::config::ConfigFile;
use datalocator::{LocatorConfig, ResourceLocator, VirtualPath};

use crate::error::CliError;

/// Options accepted by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalOptions {
    /// Configuration file (default: ~/.datalocator/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory, overriding the configuration file
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Bundle directory, overriding the configuration file
    #[arg(long, global = true, value_name = "DIR")]
    pub bundle_dir: Option<PathBuf>,

    /// Remote origin URL, overriding the configuration file
    #[arg(long, global = true, value_name = "URL")]
    pub origin: Option<String>,
}

impl GlobalOptions {
    /// Load the configuration file named by `--config`, or the default one.
    pub fn load_file(&self) -> Result<ConfigFile, CliError> {
        match &self.config {
            Some(path) => Ok(ConfigFile::load_from(path)?),
            None => Ok(ConfigFile::load()?),
        }
    }

    /// Resolve the locator configuration: CLI takes precedence, then config.
    pub fn resolve(&self) -> Result<LocatorConfig, CliError> {
        let mut config = self.load_file()?.to_locator_config();

        if let Some(dir) = &self.cache_dir {
            config.base_dir = dir.clone();
        }
        if let Some(dir) = &self.bundle_dir {
            config = config.with_bundle_dir(dir.clone());
        }
        if let Some(origin) = &self.origin {
            if !origin.starts_with("http://") && !origin.starts_with("https://") {
                return Err(CliError::Config(format!(
                    "--origin must be an http:// or https:// URL, got '{}'",
                    origin
                )));
            }
            config = config.with_remote_origin(origin.clone());
        }

        Ok(config)
    }
}

/// Create a locator from resolved configuration.
pub fn create_locator(config: LocatorConfig) -> Result<ResourceLocator, CliError> {
    ResourceLocator::new(config).map_err(CliError::LocatorCreation)
}

/// Parse command-line arguments into virtual paths, failing on the first bad one.
pub fn parse_paths(raw: &[String]) -> Result<Vec<VirtualPath>, CliError> {
    raw.iter()
        .map(|p| VirtualPath::new(p.as_str()).map_err(CliError::from))
        .collect()
}

/// Format a byte count for display.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
