//! In-memory locator configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::classify::Packaging;
use crate::fetch::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};

/// Default number of background workers for asynchronous fetches.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Remote packaging used when none is configured.
///
/// Elevation images are served XZ-compressed; everything else is raw.
pub fn default_remote_packaging() -> Vec<(String, Packaging)> {
    vec![(".img".to_string(), Packaging::XzStream)]
}

/// Configuration for a [`crate::ResourceLocator`].
///
/// The base directory must not change while a locator built from this
/// configuration has fetches in flight. Build a new locator instead.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Root of the on-disk cache.
    pub base_dir: PathBuf,

    /// Directory holding resources shipped with the application.
    pub bundle_dir: Option<PathBuf>,

    /// Base URL remote resources are downloaded from.
    pub remote_origin: Option<String>,

    /// Deadline for a whole HTTP transfer, from sending the request until
    /// the last body byte. Raise it for origins serving large datasets.
    pub timeout: Duration,

    /// HTTP connect timeout.
    pub connect_timeout: Duration,

    /// Size of the background worker pool (minimum 1).
    pub worker_threads: usize,

    /// Virtual path suffix to remote packaging table. First match wins.
    pub remote_packaging: Vec<(String, Packaging)>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            base_dir: super::config_directory().join("cache"),
            bundle_dir: None,
            remote_origin: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            worker_threads: DEFAULT_WORKER_THREADS,
            remote_packaging: default_remote_packaging(),
        }
    }
}

impl LocatorConfig {
    /// Create a configuration with the given cache directory.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    /// Set the remote origin.
    pub fn with_remote_origin(mut self, origin: impl Into<String>) -> Self {
        self.remote_origin = Some(origin.into());
        self
    }

    /// Set the bundle directory.
    pub fn with_bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundle_dir = Some(dir.into());
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the HTTP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the number of background workers.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Register the packaging the origin uses for paths ending in `suffix`.
    ///
    /// Later registrations for the same suffix take precedence.
    pub fn with_remote_packaging(mut self, suffix: impl Into<String>, packaging: Packaging) -> Self {
        let suffix = suffix.into();
        self.remote_packaging.retain(|(s, _)| *s != suffix);
        self.remote_packaging.insert(0, (suffix, packaging));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LocatorConfig::default();
        assert!(config.base_dir.ends_with("cache"));
        assert!(config.bundle_dir.is_none());
        assert!(config.remote_origin.is_none());
        assert_eq!(config.worker_threads, DEFAULT_WORKER_THREADS);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.remote_packaging, default_remote_packaging());
    }

    #[test]
    fn test_builder_pattern() {
        let config = LocatorConfig::new("/custom/cache")
            .with_remote_origin("https://example.com/content")
            .with_bundle_dir("/opt/app/resources")
            .with_timeout(Duration::from_secs(120))
            .with_connect_timeout(Duration::from_secs(5))
            .with_worker_threads(0);

        assert_eq!(config.base_dir, PathBuf::from("/custom/cache"));
        assert_eq!(
            config.remote_origin.as_deref(),
            Some("https://example.com/content")
        );
        assert_eq!(config.bundle_dir, Some(PathBuf::from("/opt/app/resources")));
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.worker_threads, 1);
    }

    #[test]
    fn test_remote_packaging_override() {
        let config = LocatorConfig::new("/c")
            .with_remote_packaging(".img", Packaging::Raw)
            .with_remote_packaging(".jpg", Packaging::ZipEntry);

        assert_eq!(
            config.remote_packaging,
            vec![
                (".jpg".to_string(), Packaging::ZipEntry),
                (".img".to_string(), Packaging::Raw),
            ]
        );
    }
}
