//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use datalocator::config::ConfigFileError;
use datalocator::{ClassificationError, LocateError, StoreError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Configuration file could not be read or written
    ConfigFile(ConfigFileError),
    /// Argument is not a valid virtual path
    InvalidPath(ClassificationError),
    /// Failed to create the locator
    LocatorCreation(LocateError),
    /// Some paths could not be resolved
    Unresolved { failed: usize, total: usize },
    /// Failed to read cache statistics
    CacheStats(StoreError),
    /// Failed to clear the cache
    CacheClear(StoreError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Unresolved { .. } => {
                eprintln!();
                eprintln!("Run with --verbose, or check the log file, for details.");
            }
            CliError::InvalidPath(_) => {
                eprintln!();
                eprintln!("Virtual paths are absolute and use '/' separators,");
                eprintln!("for example: /maps/geo_region_2880.jpg");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::InvalidPath(e) => write!(f, "{}", e),
            CliError::LocatorCreation(e) => write!(f, "Failed to create locator: {}", e),
            CliError::Unresolved { failed, total } => {
                write!(f, "{} of {} paths could not be resolved", failed, total)
            }
            CliError::CacheStats(e) => write!(f, "Failed to read cache statistics: {}", e),
            CliError::CacheClear(e) => write!(f, "Failed to clear cache: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::InvalidPath(e) => Some(e),
            CliError::LocatorCreation(e) => Some(e),
            CliError::CacheStats(e) => Some(e),
            CliError::CacheClear(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ClassificationError> for CliError {
    fn from(e: ClassificationError) -> Self {
        CliError::InvalidPath(e)
    }
}
