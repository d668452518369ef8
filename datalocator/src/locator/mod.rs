//! Resource resolution with request coalescing.
//!
//! [`ResourceLocator`] turns a virtual path into a readable local file. When
//! several callers ask for the same uncached path at once, only one fetch
//! runs and every caller receives its result.
//!
//! # Architecture
//!
//! ```text
//! locate / locate_async
//!         │
//!         ▼
//!   ┌─────────────┐
//!   │ Cache Check │──► Hit ──► return local path
//!   └──────┬──────┘
//!          │ Miss
//!          ▼
//!   ┌─────────────┐
//!   │  In-flight  │──► Joined ──► wait / register callback
//!   │     map     │
//!   └──────┬──────┘
//!          │ New
//!          ▼
//!   ┌─────────────┐     ┌──────────┐     ┌───────────┐     ┌─────────┐
//!   │  Classify   │──►  │  Fetch   │──►  │  Extract  │──►  │ Publish │
//!   └─────────────┘     │ (remote) │     │ zip / xz  │     └────┬────┘
//!                       └──────────┘     └───────────┘          │
//!                                                               ▼
//!                                     remove from map, wake waiters,
//!                                     hand callbacks to worker pool
//! ```
//!
//! A blocking caller that creates the in-flight entry runs the fetch on its
//! own thread. An asynchronous caller that creates it schedules the fetch on
//! the bounded worker pool and returns immediately.
//!
//! Callbacks run on the worker pool. Blocking on [`ResourceLocator::locate`]
//! from inside a callback can deadlock when the pool has a single thread and
//! the awaited fetch is queued behind the callback.

mod pending;
mod stats;

use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::archive::ArchiveExtractor;
use crate::classify::{Classification, Packaging, PathClassifier, ResourceSource};
use crate::config::LocatorConfig;
use crate::error::{LocateError, LocateResult};
use crate::fetch::{FetchError, Fetcher, HttpFetcher};
use crate::path::VirtualPath;
use crate::store::{CacheStore, StoreError};

use pending::{Callback, PendingFetch};
pub use pending::FetchResult;
pub use stats::LocatorStats;
use stats::StatsCounters;

/// Buffer size for streaming downloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Resolves virtual paths to local files.
///
/// Cheap to clone; clones share the cache, in-flight map and worker pool.
#[derive(Clone)]
pub struct ResourceLocator {
    inner: Arc<Inner>,
}

struct Inner {
    store: CacheStore,
    classifier: PathClassifier,
    extractor: ArchiveExtractor,
    fetcher: Arc<dyn Fetcher>,
    in_flight: DashMap<VirtualPath, Arc<PendingFetch>>,
    pool: rayon::ThreadPool,
    stats: StatsCounters,
}

/// Outcome of registering a cache miss.
enum Registration {
    /// The resource became available while registering.
    Ready(PathBuf),
    /// Another caller is already fetching this path.
    Joined(Arc<PendingFetch>),
    /// This caller created the in-flight entry and must run the fetch.
    Leader(Arc<PendingFetch>),
}

impl ResourceLocator {
    /// Create a locator that downloads remote resources over HTTP.
    pub fn new(config: LocatorConfig) -> LocateResult<Self> {
        let fetcher = HttpFetcher::with_timeouts(config.timeout, config.connect_timeout)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a locator with a custom fetcher.
    pub fn with_fetcher(config: LocatorConfig, fetcher: Arc<dyn Fetcher>) -> LocateResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads.max(1))
            .thread_name(|idx| format!("datalocator-worker-{}", idx))
            .panic_handler(|_| tracing::error!("Resource worker job panicked"))
            .build()
            .map_err(|e| LocateError::WorkerPool(e.to_string()))?;

        info!(
            base_dir = %config.base_dir.display(),
            bundle_dir = ?config.bundle_dir,
            remote_origin = ?config.remote_origin,
            workers = config.worker_threads,
            "Resource locator configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                store: CacheStore::new(config.base_dir.clone()),
                classifier: PathClassifier::from_config(&config),
                extractor: ArchiveExtractor::new(),
                fetcher,
                in_flight: DashMap::new(),
                pool,
                stats: StatsCounters::default(),
            }),
        })
    }

    /// Resolve `path` to a local file, blocking until it is available.
    ///
    /// Returns immediately on a cache hit. Otherwise either runs the fetch
    /// on the calling thread or waits for the fetch another caller started.
    /// A failed fetch is reported to every caller that waited on it.
    pub fn locate(&self, path: &VirtualPath) -> LocateResult<PathBuf> {
        let inner = &self.inner;
        inner.stats.request();

        if inner.store.is_ready(path) {
            inner.stats.hit();
            return Ok(inner.store.location(path));
        }

        match inner.register(path) {
            Registration::Ready(location) => {
                inner.stats.hit();
                Ok(location)
            }
            Registration::Joined(pending) => {
                inner.stats.coalesced();
                debug!(path = %path, "Coalescing request - waiting for in-flight fetch");
                pending.wait()
            }
            Registration::Leader(pending) => Inner::execute(inner, &pending),
        }
    }

    /// Resolve `path` without blocking.
    ///
    /// Returns `Some(file)` if the resource is already cached; `on_done` is
    /// then never called. Otherwise returns `None` and calls `on_done`
    /// exactly once from a worker thread when the fetch succeeds. On failure
    /// the error is logged and `on_done` is not called; use
    /// [`Self::locate_async_with_result`] to observe failures.
    pub fn locate_async<F>(&self, path: &VirtualPath, on_done: F) -> Option<PathBuf>
    where
        F: FnOnce(PathBuf) + Send + 'static,
    {
        let path_str = path.to_string();
        self.locate_async_with_result(path, move |result| match result {
            Ok(location) => on_done(location),
            Err(e) => warn!(
                path = %path_str,
                error = %e,
                "Asynchronous fetch failed, callback not invoked"
            ),
        })
    }

    /// Resolve `path` without blocking, reporting success and failure.
    ///
    /// Same contract as [`Self::locate_async`] except that `on_done` is
    /// called exactly once for every `None` return, with either the file or
    /// the error.
    pub fn locate_async_with_result<F>(&self, path: &VirtualPath, on_done: F) -> Option<PathBuf>
    where
        F: FnOnce(FetchResult) + Send + 'static,
    {
        let inner = &self.inner;
        inner.stats.request();

        if inner.store.is_ready(path) {
            inner.stats.hit();
            return Some(inner.store.location(path));
        }

        match inner.register(path) {
            Registration::Ready(location) => {
                inner.stats.hit();
                Some(location)
            }
            Registration::Joined(pending) => {
                inner.stats.coalesced();
                debug!(path = %path, "Coalescing async request onto in-flight fetch");
                match pending.subscribe(Box::new(on_done)) {
                    Ok(()) => None,
                    // Resolved between joining and subscribing.
                    Err((_, Ok(location))) => Some(location),
                    Err((callback, Err(e))) => {
                        inner.dispatch(vec![callback], Err(e));
                        None
                    }
                }
            }
            Registration::Leader(pending) => {
                if let Err((callback, result)) = pending.subscribe(Box::new(on_done)) {
                    // Unreachable: nobody else can resolve a fetch we lead.
                    inner.dispatch(vec![callback], result);
                    return None;
                }

                let worker = Arc::clone(inner);
                inner.pool.spawn(move || {
                    let _ = Inner::execute(&worker, &pending);
                });
                None
            }
        }
    }

    /// Returns true if `path` is cached. Never triggers a fetch.
    pub fn is_available(&self, path: &VirtualPath) -> bool {
        self.inner.store.is_ready(path)
    }

    /// Where `path` is (or would be) cached.
    pub fn location(&self, path: &VirtualPath) -> PathBuf {
        self.inner.store.location(path)
    }

    /// Classify `path` without fetching it.
    pub fn classify(&self, path: &VirtualPath) -> LocateResult<Classification> {
        Ok(self.inner.classifier.classify(path)?)
    }

    /// The underlying cache store.
    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    /// Number of fetches currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Snapshot of the request statistics.
    pub fn stats(&self) -> LocatorStats {
        self.inner.stats.snapshot()
    }

    /// Log current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total_requests = stats.total_requests,
            cache_hits = stats.cache_hits,
            coalesced = stats.coalesced_requests,
            fetches = stats.fetches_started,
            failed = stats.fetches_failed,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Resource locator statistics"
        );
    }
}

impl Inner {
    /// Join the in-flight fetch for `path` or create it.
    ///
    /// The cache is re-checked while holding the map entry, so a fetch that
    /// completed after the caller's first cache check is not repeated.
    fn register(&self, path: &VirtualPath) -> Registration {
        match self.in_flight.entry(path.clone()) {
            Entry::Occupied(entry) => Registration::Joined(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                if self.store.is_ready(path) {
                    return Registration::Ready(self.store.location(path));
                }
                let pending = Arc::new(PendingFetch::new(path.clone()));
                entry.insert(Arc::clone(&pending));
                self.stats.started();
                Registration::Leader(pending)
            }
        }
    }

    /// Run the fetch for `pending` and fan the result out to its callers.
    fn execute(self: &Arc<Self>, pending: &Arc<PendingFetch>) -> FetchResult {
        let path = pending.path().clone();
        let started = Instant::now();

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.fetch_and_publish(&path)))
            .unwrap_or_else(|_| {
                Err(LocateError::Aborted {
                    path: path.to_string(),
                })
            });

        match &result {
            Ok(location) => info!(
                path = %path,
                location = %location.display(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Resource cached"
            ),
            Err(e) => {
                self.stats.failed();
                warn!(path = %path, error = %e, "Resource fetch failed");
            }
        }

        self.in_flight
            .remove_if(&path, |_, current| Arc::ptr_eq(current, pending));

        let callbacks = pending.resolve(result.clone());
        self.dispatch(callbacks, result.clone());
        result
    }

    /// Invoke callbacks on the worker pool.
    fn dispatch(&self, callbacks: Vec<Callback>, result: FetchResult) {
        if callbacks.is_empty() {
            return;
        }
        self.pool.spawn(move || {
            for callback in callbacks {
                let result = result.clone();
                if panic::catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
                    tracing::error!("Resource callback panicked");
                }
            }
        });
    }

    fn fetch_and_publish(&self, path: &VirtualPath) -> FetchResult {
        let classification = self.classifier.classify(path)?;
        let entry_name = classification.entry_name.as_str();
        let mut staged = self.store.staging_file(path)?;

        debug!(
            path = %path,
            kind = %classification.kind(),
            packaging = %classification.packaging,
            "Fetching resource"
        );

        let bytes = match &classification.source {
            ResourceSource::Bundled(source) => self.extractor.extract_file(
                classification.packaging,
                source,
                entry_name,
                staged.as_file_mut(),
            )?,
            ResourceSource::Remote(url) => {
                self.download(url, classification.packaging, entry_name, &mut staged)?
            }
        };

        let entry = self.store.publish(path, staged)?;
        debug!(path = %path, bytes, "Published resource");
        Ok(entry.location)
    }

    /// Download `url` into `staged`, unpacking it if needed.
    ///
    /// Packed downloads are spooled to an anonymous file first so network
    /// failures are reported as fetch errors, not archive errors.
    fn download(
        &self,
        url: &str,
        packaging: Packaging,
        entry_name: &str,
        staged: &mut NamedTempFile,
    ) -> LocateResult<u64> {
        let body = self.fetcher.fetch(url)?;

        if packaging == Packaging::Raw {
            let staged_path = staged.path().to_path_buf();
            return self.stream_body(url, body, staged.as_file_mut(), staged_path);
        }

        let base_dir = self.store.base_dir().to_path_buf();
        let mut spool = tempfile::tempfile_in(&base_dir).map_err(|e| StoreError::Write {
            path: base_dir.clone(),
            source: Arc::new(e),
        })?;
        self.stream_body(url, body, &mut spool, base_dir.clone())?;
        spool
            .seek(SeekFrom::Start(0))
            .map_err(|e| StoreError::Read {
                path: base_dir,
                source: Arc::new(e),
            })?;

        let spool = BufReader::new(spool);
        let dest = staged.as_file_mut();
        let bytes = match packaging {
            Packaging::ZipEntry => self.extractor.extract_zip_entry(spool, entry_name, dest)?,
            _ => self.extractor.extract(packaging, spool, entry_name, dest)?,
        };
        Ok(bytes)
    }

    /// Copy a response body to `writer` in fixed-size chunks.
    fn stream_body<W: Write>(
        &self,
        url: &str,
        mut body: impl Read,
        writer: &mut W,
        dest: PathBuf,
    ) -> LocateResult<u64> {
        let timeout_secs = self.fetcher.timeout_secs();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut downloaded = 0u64;

        loop {
            let bytes_read = match body.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FetchError::from_body_error(url, &e, timeout_secs).into()),
            };

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| StoreError::Write {
                    path: dest.clone(),
                    source: Arc::new(e),
                })?;
            downloaded += bytes_read as u64;
        }

        writer.flush().map_err(|e| StoreError::Write {
            path: dest,
            source: Arc::new(e),
        })?;
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{xz_bytes, zip_bytes};
    use crate::archive::ArchiveError;
    use crate::fetch::tests::MockFetcher;
    use std::fs;
    use std::sync::mpsc;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    const ORIGIN: &str = "http://origin.test";

    fn vpath(s: &str) -> VirtualPath {
        VirtualPath::new(s).unwrap()
    }

    fn locator(temp: &TempDir, fetcher: Arc<MockFetcher>) -> ResourceLocator {
        let config = LocatorConfig::new(temp.path().join("cache"))
            .with_bundle_dir(temp.path().join("bundle"))
            .with_remote_origin(ORIGIN)
            .with_worker_threads(2);
        ResourceLocator::with_fetcher(config, fetcher).unwrap()
    }

    #[test]
    fn test_remote_locate_then_cache_hit() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().with_body(&format!("{}/maps/a.jpg", ORIGIN), b"jpeg".to_vec()),
        );
        let locator = locator(&temp, Arc::clone(&fetcher));
        let path = vpath("/maps/a.jpg");

        assert!(!locator.is_available(&path));
        let first = locator.locate(&path).unwrap();
        let second = locator.locate(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, temp.path().join("cache/maps/a.jpg"));
        assert_eq!(fs::read(&first).unwrap(), b"jpeg");
        assert!(locator.is_available(&path));
        assert_eq!(fetcher.calls(), 1);

        let stats = locator.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.fetches_started, 1);
        assert_eq!(locator.in_flight_count(), 0);
    }

    #[test]
    fn test_remote_xz_is_decompressed() {
        let temp = TempDir::new().unwrap();
        let payload = vec![7u8; 10_000];
        let fetcher = Arc::new(MockFetcher::new().with_body(
            &format!("{}/elevation/e.img.xz", ORIGIN),
            xz_bytes(&payload),
        ));
        let locator = locator(&temp, fetcher);

        let file = locator.locate(&vpath("/elevation/e.img")).unwrap();
        assert_eq!(fs::read(file).unwrap(), payload);
    }

    #[test]
    fn test_remote_zip_is_extracted() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetcher::new().with_body(
            &format!("{}/maps/z.jpg.zip", ORIGIN),
            zip_bytes(&[("z.jpg", b"zipped jpeg")]),
        ));
        let config = LocatorConfig::new(temp.path().join("cache"))
            .with_remote_origin(ORIGIN)
            .with_remote_packaging(".jpg", Packaging::ZipEntry);
        let locator = ResourceLocator::with_fetcher(config, fetcher).unwrap();

        let file = locator.locate(&vpath("/maps/z.jpg")).unwrap();
        assert_eq!(fs::read(file).unwrap(), b"zipped jpeg");
    }

    #[test]
    fn test_bundled_resources_never_fetch() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("bundle/maps");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("raw.jpg"), b"raw").unwrap();
        fs::write(bundle.join("packed.jpg.zip"), zip_bytes(&[("packed.jpg", b"unzipped")])).unwrap();
        fs::write(bundle.join("dem.img.xz"), xz_bytes(b"elevation")).unwrap();

        let fetcher = Arc::new(MockFetcher::new());
        let locator = locator(&temp, Arc::clone(&fetcher));

        assert_eq!(fs::read(locator.locate(&vpath("/maps/raw.jpg")).unwrap()).unwrap(), b"raw");
        assert_eq!(
            fs::read(locator.locate(&vpath("/maps/packed.jpg")).unwrap()).unwrap(),
            b"unzipped"
        );
        assert_eq!(
            fs::read(locator.locate(&vpath("/maps/dem.img")).unwrap()).unwrap(),
            b"elevation"
        );
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn test_failure_propagates_and_leaves_no_file() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetcher::new().with_error(
            &format!("{}/maps/down.jpg", ORIGIN),
            FetchError::Network {
                url: "x".to_string(),
                reason: "connection reset".to_string(),
            },
        ));
        let locator = locator(&temp, Arc::clone(&fetcher));
        let path = vpath("/maps/down.jpg");

        let result = locator.locate(&path);
        assert!(matches!(
            result,
            Err(LocateError::Fetch(FetchError::Network { .. }))
        ));
        assert!(!locator.is_available(&path));
        assert_eq!(locator.in_flight_count(), 0);
        assert_eq!(locator.stats().fetches_failed, 1);

        // Nothing but empty directories remains in the cache.
        assert_eq!(locator.store().stats().unwrap(), (0, 0));

        // A later call retries.
        assert!(locator.locate(&path).is_err());
        assert_eq!(fetcher.calls(), 2);
    }

    #[test]
    fn test_zip_suffixed_path_bundled_is_extracted() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("bundle/maps");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("tile.jpg.zip"), zip_bytes(&[("tile.jpg", b"tile payload")])).unwrap();

        let fetcher = Arc::new(MockFetcher::new());
        let locator = locator(&temp, Arc::clone(&fetcher));

        let file = locator.locate(&vpath("/maps/tile.jpg.zip")).unwrap();
        assert_eq!(fs::read(file).unwrap(), b"tile payload");
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn test_packed_suffixed_path_remote_is_unpacked() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_body(
                    &format!("{}/maps/tile.jpg.zip", ORIGIN),
                    zip_bytes(&[("tile.jpg", b"remote tile")]),
                )
                .with_body(&format!("{}/maps/dem.bin.xz", ORIGIN), xz_bytes(b"remote dem")),
        );
        let locator = locator(&temp, Arc::clone(&fetcher));

        let zip = fs::read(locator.locate(&vpath("/maps/tile.jpg.zip")).unwrap()).unwrap();
        assert!(!zip.starts_with(b"PK"));
        assert_eq!(zip, b"remote tile");

        let xz = fs::read(locator.locate(&vpath("/maps/dem.bin.xz")).unwrap()).unwrap();
        assert_eq!(xz, b"remote dem");
        assert_eq!(fetcher.calls(), 2);
    }

    /// A body that breaks off after some bytes fails every waiter alike and
    /// leaves nothing behind in the cache.
    fn assert_mid_body_failure(kind: std::io::ErrorKind) -> LocateError {
        let temp = TempDir::new().unwrap();
        let callers = 3;
        let gate = Arc::new(Barrier::new(2));
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_truncated_body(
                    &format!("{}/maps/big.jpg", ORIGIN),
                    vec![1u8; 100_000],
                    kind,
                )
                .with_gate(Arc::clone(&gate)),
        );
        let locator = locator(&temp, Arc::clone(&fetcher));
        let path = vpath("/maps/big.jpg");

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let locator = locator.clone();
                let path = path.clone();
                thread::spawn(move || locator.locate(&path))
            })
            .collect();

        while locator.stats().coalesced_requests < callers as u64 - 1 {
            thread::yield_now();
        }
        gate.wait();

        let errors: Vec<LocateError> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap_err())
            .collect();
        let first = errors[0].to_string();
        assert!(errors.iter().all(|e| e.to_string() == first));

        assert!(!locator.is_available(&path));
        assert_eq!(locator.store().stats().unwrap(), (0, 0));
        assert_eq!(locator.in_flight_count(), 0);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(locator.stats().fetches_failed, 1);

        errors.into_iter().next().unwrap()
    }

    #[test]
    fn test_body_timeout_mid_transfer() {
        let error = assert_mid_body_failure(std::io::ErrorKind::TimedOut);
        assert!(matches!(
            error,
            LocateError::Fetch(FetchError::Timeout { .. })
        ));
    }

    #[test]
    fn test_body_reset_mid_transfer() {
        let error = assert_mid_body_failure(std::io::ErrorKind::ConnectionReset);
        assert!(matches!(
            error,
            LocateError::Fetch(FetchError::Network { .. })
        ));
    }

    #[test]
    fn test_corrupt_remote_archive() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetcher::new().with_body(
            &format!("{}/elevation/bad.img.xz", ORIGIN),
            b"garbage".to_vec(),
        ));
        let locator = locator(&temp, fetcher);

        let result = locator.locate(&vpath("/elevation/bad.img"));
        assert!(matches!(
            result,
            Err(LocateError::Archive(ArchiveError::CorruptStream { .. }))
        ));
        assert!(!locator.is_available(&vpath("/elevation/bad.img")));
    }

    #[test]
    fn test_concurrent_locate_single_flight() {
        let temp = TempDir::new().unwrap();
        let callers = 4;
        // The gate holds the fetch until every caller has registered.
        let gate = Arc::new(Barrier::new(2));
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_body(&format!("{}/maps/hot.jpg", ORIGIN), b"hot".to_vec())
                .with_gate(Arc::clone(&gate)),
        );
        let locator = locator(&temp, Arc::clone(&fetcher));
        let path = vpath("/maps/hot.jpg");

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let locator = locator.clone();
                let path = path.clone();
                thread::spawn(move || locator.locate(&path).unwrap())
            })
            .collect();

        // Wait until all but the leader have joined the in-flight fetch.
        while locator.stats().coalesced_requests < callers as u64 - 1 {
            thread::yield_now();
        }
        gate.wait();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(locator.stats().fetches_started, 1);
    }

    #[test]
    fn test_async_callback_fires_once() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().with_body(&format!("{}/maps/async.jpg", ORIGIN), b"async".to_vec()),
        );
        let locator = locator(&temp, Arc::clone(&fetcher));
        let path = vpath("/maps/async.jpg");

        let (tx, rx) = mpsc::channel();
        let immediate = locator.locate_async(&path, move |file| tx.send(file).unwrap());
        assert!(immediate.is_none());

        let delivered = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(fs::read(&delivered).unwrap(), b"async");
        // The sender was consumed by the callback, so the channel is closed.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        let again = locator.locate_async(&path, |_| panic!("must not be called on a cache hit"));
        assert_eq!(again, Some(delivered));
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_async_failure_reported_with_result() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        let locator = locator(&temp, fetcher);

        let (tx, rx) = mpsc::channel();
        let immediate =
            locator.locate_async_with_result(&vpath("/maps/missing.jpg"), move |result| {
                tx.send(result).unwrap()
            });
        assert!(immediate.is_none());

        let result = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(matches!(
            result,
            Err(LocateError::Fetch(FetchError::Status { status: 404, .. }))
        ));
    }

    #[test]
    fn test_async_failure_skips_callback() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        let locator = locator(&temp, Arc::clone(&fetcher));
        let path = vpath("/maps/missing.jpg");

        let (tx, rx) = mpsc::channel::<PathBuf>();
        assert!(locator
            .locate_async(&path, move |file| tx.send(file).unwrap())
            .is_none());

        // The callback is dropped without being called, closing the channel.
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(10)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        ));
        assert!(!locator.is_available(&path));
    }

    #[test]
    fn test_unclassifiable_path() {
        let temp = TempDir::new().unwrap();
        let config = LocatorConfig::new(temp.path().join("cache"));
        let locator = ResourceLocator::with_fetcher(config, Arc::new(MockFetcher::new())).unwrap();

        let result = locator.locate(&vpath("/maps/nowhere.jpg"));
        assert!(matches!(result, Err(LocateError::Classification(_))));
    }
}
