//! Shared state of one in-flight fetch.
//!
//! A [`PendingFetch`] is created by the first caller that misses the cache
//! for a path. Every later caller for the same path attaches to it: blocking
//! callers wait on the condition variable, asynchronous callers register a
//! callback. The fetch resolves exactly once and every attached caller sees
//! the same result.

use std::path::PathBuf;

use parking_lot::{Condvar, Mutex};

use crate::error::LocateError;
use crate::path::VirtualPath;

/// Outcome shared by all callers of one fetch.
pub type FetchResult = Result<PathBuf, LocateError>;

/// Completion callback registered by an asynchronous caller.
pub(crate) type Callback = Box<dyn FnOnce(FetchResult) + Send + 'static>;

struct PendingState {
    result: Option<FetchResult>,
    callbacks: Vec<Callback>,
}

pub(crate) struct PendingFetch {
    path: VirtualPath,
    state: Mutex<PendingState>,
    resolved: Condvar,
}

impl PendingFetch {
    pub(crate) fn new(path: VirtualPath) -> Self {
        Self {
            path,
            state: Mutex::new(PendingState {
                result: None,
                callbacks: Vec::new(),
            }),
            resolved: Condvar::new(),
        }
    }

    pub(crate) fn path(&self) -> &VirtualPath {
        &self.path
    }

    /// Register a callback to run when the fetch resolves.
    ///
    /// If the fetch has already resolved, the callback is handed back
    /// together with the result instead of being registered.
    pub(crate) fn subscribe(&self, callback: Callback) -> Result<(), (Callback, FetchResult)> {
        let mut state = self.state.lock();
        match &state.result {
            Some(result) => Err((callback, result.clone())),
            None => {
                state.callbacks.push(callback);
                Ok(())
            }
        }
    }

    /// Block the calling thread until the fetch resolves.
    pub(crate) fn wait(&self) -> FetchResult {
        let mut state = self.state.lock();
        loop {
            if let Some(result) = &state.result {
                return result.clone();
            }
            self.resolved.wait(&mut state);
        }
    }

    /// Store the result, wake blocked callers and take the callbacks.
    ///
    /// Only the first resolution takes effect; later calls return no
    /// callbacks.
    pub(crate) fn resolve(&self, result: FetchResult) -> Vec<Callback> {
        let mut state = self.state.lock();
        if state.result.is_some() {
            return Vec::new();
        }
        state.result = Some(result);
        let callbacks = std::mem::take(&mut state.callbacks);
        drop(state);

        self.resolved.notify_all();
        callbacks
    }

    #[cfg(test)]
    pub(crate) fn is_resolved(&self) -> bool {
        self.state.lock().result.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn pending() -> Arc<PendingFetch> {
        Arc::new(PendingFetch::new(VirtualPath::new("/maps/a.jpg").unwrap()))
    }

    #[test]
    fn test_resolve_wakes_all_waiters() {
        let pending = pending();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let p = Arc::clone(&pending);
                thread::spawn(move || p.wait())
            })
            .collect();

        let callbacks = pending.resolve(Ok(PathBuf::from("/cache/maps/a.jpg")));
        assert!(callbacks.is_empty());

        for waiter in waiters {
            assert_eq!(
                waiter.join().unwrap().unwrap(),
                PathBuf::from("/cache/maps/a.jpg")
            );
        }
    }

    #[test]
    fn test_callbacks_returned_once() {
        let pending = pending();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            pending
                .subscribe(Box::new(move |result| {
                    assert!(result.is_ok());
                    calls.fetch_add(1, Ordering::SeqCst);
                }))
                .ok()
                .unwrap();
        }

        let callbacks = pending.resolve(Ok(PathBuf::from("/x")));
        assert_eq!(callbacks.len(), 3);
        let result: FetchResult = Ok(PathBuf::from("/x"));
        for cb in callbacks {
            cb(result.clone());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Second resolution is ignored.
        assert!(pending.resolve(Ok(PathBuf::from("/y"))).is_empty());
        assert_eq!(pending.wait().unwrap(), PathBuf::from("/x"));
    }

    #[test]
    fn test_subscribe_after_resolve_hands_back() {
        let pending = pending();
        pending.resolve(Err(LocateError::Aborted {
            path: "/maps/a.jpg".to_string(),
        }));
        assert!(pending.is_resolved());

        let result = pending.subscribe(Box::new(|_| panic!("must not be registered")));
        match result {
            Err((_callback, Err(LocateError::Aborted { .. }))) => {}
            _ => panic!("expected the callback and the failure to be handed back"),
        }
    }
}
