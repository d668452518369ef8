//! Remote resource retrieval.
//!
//! The [`Fetcher`] trait abstracts the network so the locator can be driven
//! by a mock in tests; [`HttpFetcher`] is the reqwest-based implementation.
//!
//! Fetchers make exactly one attempt per call. Retry policy belongs to the
//! caller of [`crate::ResourceLocator::locate`].

mod http;

use std::io::{self, Read};

use thiserror::Error;

pub use http::{HttpFetcher, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};

/// Errors raised while retrieving a remote resource.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The HTTP client could not be created.
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// Connection refused, reset, DNS failure, or a broken body stream.
    #[error("failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },

    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The origin answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    /// Classify an I/O error raised while streaming a response body.
    ///
    /// reqwest surfaces its deadline as an `Other` error wrapping a timed-out
    /// `reqwest::Error`, so the wrapped error is inspected as well.
    pub fn from_body_error(url: &str, error: &io::Error, timeout_secs: u64) -> Self {
        let wrapped_timeout = error
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout);

        if error.kind() == io::ErrorKind::TimedOut || wrapped_timeout {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs,
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                reason: format!("read error: {}", error),
            }
        }
    }
}

/// Streaming response body.
pub type FetchStream = Box<dyn Read + Send>;

/// Retrieves remote resources as byte streams.
///
/// Implementations must stream the body rather than buffering it, since
/// elevation datasets can be hundreds of megabytes.
pub trait Fetcher: Send + Sync {
    /// Issue a GET for `url` and return the response body.
    fn fetch(&self, url: &str) -> Result<FetchStream, FetchError>;

    /// Timeout applied to requests, in seconds. Used for error reporting.
    fn timeout_secs(&self) -> u64 {
        DEFAULT_TIMEOUT_SECS
    }
}
