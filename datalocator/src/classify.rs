//! Resource classification.
//!
//! Decides whether a virtual path is shipped with the application (bundled)
//! or has to be downloaded from the configured origin (remote), and how the
//! stored bytes are packaged.
//!
//! Bundled resources are looked up in the bundle directory under three names,
//! in order:
//!
//! ```text
//! {bundle}/maps/geo_region_1200.jpg        -> Raw
//! {bundle}/maps/geo_region_1200.jpg.zip    -> ZipEntry (entry "geo_region_1200.jpg")
//! {bundle}/maps/geo_region_1200.jpg.xz     -> XzStream
//! ```
//!
//! Anything else is remote. Remote packaging cannot be probed without a
//! network round trip, so it comes from a static suffix table instead.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::LocatorConfig;
use crate::path::VirtualPath;

/// Errors raised while mapping a virtual path to a resource.
#[derive(Debug, Clone, Error)]
pub enum ClassificationError {
    /// The virtual path is malformed.
    #[error("invalid virtual path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The resource is not bundled and no remote origin is configured.
    #[error("resource {path} is not bundled and no remote origin is configured")]
    NoOrigin { path: String },
}

/// Where a resource comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Shipped with the application; never needs the network.
    Bundled,
    /// Downloaded from the remote origin on first use.
    Remote,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Bundled => write!(f, "bundled"),
            ResourceKind::Remote => write!(f, "remote"),
        }
    }
}

/// How the stored bytes of a resource are packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Packaging {
    /// Stored as-is.
    #[default]
    Raw,
    /// A ZIP container holding an entry named after the resource.
    ZipEntry,
    /// A single-stream XZ compressed file.
    XzStream,
}

impl Packaging {
    /// All packagings, in bundle probe order.
    pub const ALL: [Packaging; 3] = [Packaging::Raw, Packaging::ZipEntry, Packaging::XzStream];

    /// File suffix appended to the resource name for this packaging.
    pub fn suffix(&self) -> &'static str {
        match self {
            Packaging::Raw => "",
            Packaging::ZipEntry => ".zip",
            Packaging::XzStream => ".xz",
        }
    }

    /// Derive packaging from a stored file name.
    ///
    /// Unknown suffixes are treated as raw; a wrong guess surfaces later as
    /// an extraction error.
    pub fn from_file_name(name: &str) -> Self {
        if name.ends_with(".zip") {
            Packaging::ZipEntry
        } else if name.ends_with(".xz") {
            Packaging::XzStream
        } else {
            Packaging::Raw
        }
    }

    /// Strip this packaging's suffix from `name`, if present.
    pub fn strip_suffix<'a>(&self, name: &'a str) -> &'a str {
        match self {
            Packaging::Raw => name,
            _ => name.strip_suffix(self.suffix()).unwrap_or(name),
        }
    }
}

impl fmt::Display for Packaging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Packaging::Raw => write!(f, "raw"),
            Packaging::ZipEntry => write!(f, "zip"),
            Packaging::XzStream => write!(f, "xz"),
        }
    }
}

/// Concrete source of a resource's stored bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSource {
    /// A file inside the bundle directory.
    Bundled(PathBuf),
    /// A download URL.
    Remote(String),
}

/// Result of classifying a virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub packaging: Packaging,
    pub source: ResourceSource,
    /// Name of the ZIP entry holding the payload; the resource name otherwise.
    pub entry_name: String,
}

impl Classification {
    /// Bundled or remote.
    pub fn kind(&self) -> ResourceKind {
        match self.source {
            ResourceSource::Bundled(_) => ResourceKind::Bundled,
            ResourceSource::Remote(_) => ResourceKind::Remote,
        }
    }
}

/// Maps virtual paths to their source and packaging.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    bundle_dir: Option<PathBuf>,
    remote_origin: Option<String>,
    remote_packaging: Vec<(String, Packaging)>,
}

impl PathClassifier {
    /// Create a classifier.
    ///
    /// `remote_packaging` maps virtual path suffixes (e.g. `.img`) to the
    /// packaging the origin serves them in. First match wins.
    pub fn new(
        bundle_dir: Option<PathBuf>,
        remote_origin: Option<String>,
        remote_packaging: Vec<(String, Packaging)>,
    ) -> Self {
        Self {
            bundle_dir,
            remote_origin: remote_origin.map(|o| o.trim_end_matches('/').to_string()),
            remote_packaging,
        }
    }

    /// Create a classifier from locator configuration.
    pub fn from_config(config: &LocatorConfig) -> Self {
        Self::new(
            config.bundle_dir.clone(),
            config.remote_origin.clone(),
            config.remote_packaging.clone(),
        )
    }

    /// Classify a virtual path.
    ///
    /// A path whose own name ends in `.zip` or `.xz` names a packed file:
    /// it is looked up and downloaded as-is, and for ZIP the entry to
    /// extract is the name without `.zip`. Other paths probe the bundle for
    /// packed variants and consult the remote packaging table.
    pub fn classify(&self, path: &VirtualPath) -> Result<Classification, ClassificationError> {
        let declared = Packaging::from_file_name(path.file_name());
        if declared != Packaging::Raw {
            return self.classify_declared(path, declared);
        }

        if let Some(classification) = self.classify_bundled(path) {
            return Ok(classification);
        }

        let origin = self
            .remote_origin
            .as_deref()
            .ok_or_else(|| ClassificationError::NoOrigin {
                path: path.to_string(),
            })?;

        let packaging = self.remote_packaging_for(path);
        Ok(Classification {
            packaging,
            source: ResourceSource::Remote(format!(
                "{}{}{}",
                origin,
                path.as_str(),
                packaging.suffix()
            )),
            entry_name: path.file_name().to_string(),
        })
    }

    /// Classify a path that itself names a `.zip` or `.xz` file.
    fn classify_declared(
        &self,
        path: &VirtualPath,
        packaging: Packaging,
    ) -> Result<Classification, ClassificationError> {
        let entry_name = packaging.strip_suffix(path.file_name()).to_string();

        if let Some(bundle_dir) = &self.bundle_dir {
            let candidate = path
                .segments()
                .fold(bundle_dir.clone(), |dir, segment| dir.join(segment));
            if candidate.is_file() {
                return Ok(Classification {
                    packaging,
                    source: ResourceSource::Bundled(candidate),
                    entry_name,
                });
            }
        }

        let origin = self
            .remote_origin
            .as_deref()
            .ok_or_else(|| ClassificationError::NoOrigin {
                path: path.to_string(),
            })?;

        Ok(Classification {
            packaging,
            source: ResourceSource::Remote(format!("{}{}", origin, path.as_str())),
            entry_name,
        })
    }

    /// Packaging used for remote downloads of `path`.
    pub fn remote_packaging_for(&self, path: &VirtualPath) -> Packaging {
        self.remote_packaging
            .iter()
            .find(|(suffix, _)| path.has_suffix(suffix))
            .map(|(_, packaging)| *packaging)
            .unwrap_or_default()
    }

    fn classify_bundled(&self, path: &VirtualPath) -> Option<Classification> {
        let bundle_dir = self.bundle_dir.as_ref()?;
        let mut base = bundle_dir.clone();
        for segment in path.segments() {
            base.push(segment);
        }

        Packaging::ALL.into_iter().find_map(|packaging| {
            let mut candidate = base.clone().into_os_string();
            candidate.push(packaging.suffix());
            let candidate = PathBuf::from(candidate);
            if !candidate.is_file() {
                return None;
            }

            Some(Classification {
                packaging,
                source: ResourceSource::Bundled(candidate),
                entry_name: path.file_name().to_string(),
            })
        })
    }
}
