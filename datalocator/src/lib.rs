//! DataLocator - On-demand resolution of application data files
//!
//! This library resolves virtual resource paths such as
//! `/maps/geo_region_2880.jpg` to readable local files. Resources are either
//! bundled with the application (possibly zip or xz packed) or downloaded
//! from a remote origin, and in both cases materialized once into a local
//! cache. Concurrent requests for the same uncached path share one fetch.
//!
//! # Example
//!
//! ```no_run
//! use datalocator::{LocatorConfig, ResourceLocator, VirtualPath};
//!
//! let config = LocatorConfig::new("/var/cache/myapp")
//!     .with_bundle_dir("/usr/share/myapp/data")
//!     .with_remote_origin("https://data.example.com/content");
//! let locator = ResourceLocator::new(config)?;
//!
//! let path = VirtualPath::new("/maps/geo_region_2880.jpg")?;
//! let file = locator.locate(&path)?;
//! println!("{}", file.display());
//! # Ok::<(), datalocator::LocateError>(())
//! ```

pub mod archive;
pub mod classify;
pub mod config;
pub mod error;
pub mod fetch;
pub mod locator;
pub mod logging;
pub mod path;
pub mod store;

pub use classify::{Classification, ClassificationError, Packaging, ResourceKind};
pub use config::{ConfigFile, LocatorConfig};
pub use error::{LocateError, LocateResult};
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use locator::{FetchResult, LocatorStats, ResourceLocator};
pub use path::VirtualPath;
pub use store::{CacheStore, StoreError};
