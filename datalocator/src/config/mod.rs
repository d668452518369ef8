//! Configuration for the resource locator.
//!
//! - [`LocatorConfig`] is the in-memory configuration injected into each
//!   [`crate::ResourceLocator`]. Independent instances may use different base
//!   directories, which is how tests stay isolated.
//! - [`ConfigFile`] loads and saves the user's `~/.datalocator/config.ini`
//!   and converts it into a `LocatorConfig`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use datalocator::config::LocatorConfig;
//!
//! let config = LocatorConfig::new("/tmp/datalocator-cache")
//!     .with_remote_origin("https://example.com/content")
//!     .with_timeout(Duration::from_secs(120))
//!     .with_worker_threads(2);
//!
//! assert_eq!(config.worker_threads, 2);
//! ```

mod file;
mod locator;

pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError};
pub use locator::{default_remote_packaging, LocatorConfig, DEFAULT_WORKER_THREADS};
