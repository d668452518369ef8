//! Virtual resource paths.
//!
//! A [`VirtualPath`] names a logical resource independently of where it is
//! stored or how it is packaged, e.g. `/maps/geo_region_2880.jpg`. Paths are
//! validated once on construction so every other component can join them
//! onto directories and URLs without re-checking.

use std::fmt;
use std::str::FromStr;

use crate::classify::ClassificationError;

/// A rooted, slash-separated resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath(String);

impl VirtualPath {
    /// Parse and validate a virtual path.
    ///
    /// Rejects empty paths, unrooted paths, backslashes, empty segments and
    /// `.`/`..` segments. A single trailing slash is not allowed either since
    /// a virtual path always names a file.
    pub fn new(path: impl Into<String>) -> Result<Self, ClassificationError> {
        let path = path.into();
        let invalid = |reason: &str| ClassificationError::InvalidPath {
            path: path.clone(),
            reason: reason.to_string(),
        };

        if path.is_empty() {
            return Err(invalid("path is empty"));
        }
        if !path.starts_with('/') {
            return Err(invalid("path must start with '/'"));
        }
        if path.contains('\\') {
            return Err(invalid("backslashes are not allowed"));
        }
        for segment in path[1..].split('/') {
            match segment {
                "" => return Err(invalid("empty path segment")),
                "." | ".." => return Err(invalid("relative segments are not allowed")),
                _ => {}
            }
        }

        Ok(Self(path))
    }

    /// The path as given, including the leading slash.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments (without the leading slash).
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split('/')
    }

    /// The last segment of the path.
    pub fn file_name(&self) -> &str {
        self.segments().last().unwrap_or_default()
    }

    /// Returns true if the file name ends with `suffix` (case-sensitive).
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.file_name().ends_with(suffix)
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VirtualPath {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
