//! On-disk resource cache.
//!
//! The cache mirrors the virtual path hierarchy under a base directory, so
//! `/maps/geo_region_2880.jpg` lives at `{base}/maps/geo_region_2880.jpg`.
//! File existence is the index; there is no manifest.
//!
//! Files are never written in place. Content is staged in a uniquely named
//! temporary file next to its final location, synced, then renamed into
//! place, so a reader either sees the complete file or nothing.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::path::VirtualPath;

/// Suffix of staging files; they are ignored by cache statistics.
const STAGING_SUFFIX: &str = ".part";

/// Disk-level cache failures.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Failed to create a cache directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: Arc<io::Error>,
    },

    /// Failed to write a staged file.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: Arc<io::Error>,
    },

    /// Failed to move a staged file into place.
    #[error("failed to publish {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        source: Arc<io::Error>,
    },

    /// Failed to read from the cache directory.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: Arc<io::Error>,
    },

    /// The resource is not in the cache.
    #[error("{path} is not cached")]
    NotFound { path: String },
}

/// Completion state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Ready,
}

/// A virtual path and its location in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: VirtualPath,
    pub location: PathBuf,
    pub state: EntryState,
}

impl CacheEntry {
    /// Returns true once the backing file has been published.
    pub fn is_ready(&self) -> bool {
        self.state == EntryState::Ready
    }
}

/// Result of clearing the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearResult {
    pub files_deleted: u64,
    pub bytes_freed: u64,
}

/// Resource cache rooted at a base directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    base_dir: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `base_dir`. Nothing is created on disk yet.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// The cache root.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Local file location for a virtual path. Does not touch disk.
    pub fn location(&self, path: &VirtualPath) -> PathBuf {
        let mut location = self.base_dir.clone();
        for segment in path.segments() {
            location.push(segment);
        }
        location
    }

    /// Returns true if the resource is cached.
    pub fn is_ready(&self, path: &VirtualPath) -> bool {
        self.location(path).is_file()
    }

    /// Current entry for a virtual path.
    pub fn entry(&self, path: &VirtualPath) -> CacheEntry {
        let location = self.location(path);
        let state = if location.is_file() {
            EntryState::Ready
        } else {
            EntryState::Pending
        };
        CacheEntry {
            path: path.clone(),
            location,
            state,
        }
    }

    /// Open a cached resource for reading.
    pub fn open_ready(&self, path: &VirtualPath) -> Result<File, StoreError> {
        let location = self.location(path);
        if !location.is_file() {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        }
        File::open(&location).map_err(|e| StoreError::Read {
            path: location,
            source: Arc::new(e),
        })
    }

    /// Create a staging file in the same directory as the final location.
    ///
    /// The staging file is deleted when dropped unless it is published.
    pub fn staging_file(&self, path: &VirtualPath) -> Result<NamedTempFile, StoreError> {
        let location = self.location(path);
        let parent = location.parent().unwrap_or(self.base_dir.as_path()).to_path_buf();

        fs::create_dir_all(&parent).map_err(|e| StoreError::CreateDir {
            path: parent.clone(),
            source: Arc::new(e),
        })?;

        tempfile::Builder::new()
            .prefix(&format!(".{}.", path.file_name()))
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&parent)
            .map_err(|e| StoreError::Write {
                path: parent,
                source: Arc::new(e),
            })
    }

    /// Atomically install a staged file as the cached content of `path`.
    ///
    /// The staged data is flushed and synced before the rename, so the entry
    /// only becomes visible once it is durable. An existing file is replaced.
    pub fn publish(
        &self,
        path: &VirtualPath,
        mut staged: NamedTempFile,
    ) -> Result<CacheEntry, StoreError> {
        let location = self.location(path);

        let staged_path = staged.path().to_path_buf();
        let write_err = |e: io::Error| StoreError::Write {
            path: staged_path.clone(),
            source: Arc::new(e),
        };
        staged.flush().map_err(write_err)?;
        staged.as_file().sync_all().map_err(write_err)?;

        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source: Arc::new(e),
            })?;
        }

        staged
            .persist(&location)
            .map_err(|e| StoreError::Persist {
                path: location.clone(),
                source: Arc::new(e.error),
            })?;

        Ok(CacheEntry {
            path: path.clone(),
            location,
            state: EntryState::Ready,
        })
    }

    /// Count cached files and their total size.
    pub fn stats(&self) -> Result<(u64, u64), StoreError> {
        let mut files = 0;
        let mut bytes = 0;
        visit_files(&self.base_dir, &mut |path: &Path, len: u64| {
            if !is_staging(path) {
                files += 1;
                bytes += len;
            }
        })?;
        Ok((files, bytes))
    }

    /// Remove every cached file, keeping the base directory itself.
    pub fn clear(&self) -> Result<ClearResult, StoreError> {
        let mut result = ClearResult::default();
        if !self.base_dir.exists() {
            return Ok(result);
        }

        let entries = fs::read_dir(&self.base_dir).map_err(|e| StoreError::Read {
            path: self.base_dir.clone(),
            source: Arc::new(e),
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            visit_files(&path, &mut |_: &Path, len: u64| {
                result.files_deleted += 1;
                result.bytes_freed += len;
            })?;

            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|e| StoreError::Write {
                path: path.clone(),
                source: Arc::new(e),
            })?;
        }

        tracing::info!(
            base_dir = %self.base_dir.display(),
            files = result.files_deleted,
            bytes = result.bytes_freed,
            "Cleared resource cache"
        );
        Ok(result)
    }
}

fn is_staging(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(STAGING_SUFFIX))
        .unwrap_or(false)
}

/// Walk `path` recursively, calling `f` with every regular file and its size.
fn visit_files(path: &Path, f: &mut dyn FnMut(&Path, u64)) -> Result<(), StoreError> {
    if path.is_file() {
        let len = path.metadata().map(|m| m.len()).unwrap_or(0);
        f(path, len);
        return Ok(());
    }
    if !path.is_dir() {
        return Ok(());
    }

    let entries = fs::read_dir(path).map_err(|e| StoreError::Read {
        path: path.to_path_buf(),
        source: Arc::new(e),
    })?;
    for entry in entries.flatten() {
        visit_files(&entry.path(), f)?;
    }
    Ok(())
}
