//! Top-level error type for resource resolution.

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::classify::ClassificationError;
use crate::fetch::FetchError;
use crate::store::StoreError;

/// Result type for locator operations.
pub type LocateResult<T> = Result<T, LocateError>;

/// Errors that can occur while resolving a virtual path.
///
/// Cloneable so one failed fetch can be reported to every caller waiting on
/// it.
#[derive(Debug, Clone, Error)]
pub enum LocateError {
    /// The path cannot be mapped to any resource. Not retried.
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    /// The origin could not be reached or answered with an error.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The payload could not be unpacked.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Writing the cache failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The worker running the fetch panicked.
    #[error("fetch of {path} aborted unexpectedly")]
    Aborted { path: String },

    /// The background worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}
