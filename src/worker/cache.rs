//! Per-route response cache.
//!
//! The cache entry for a route is written only by that route's supervisor
//! (single-writer discipline) and read by any number of request threads via
//! atomic snapshots - a reader can never observe a half-updated entry.
//!
//! Requests that arrive before the first build resolves block on a latch
//! (mutex + condvar, a real blocking primitive rather than a polling loop)
//! and are woken by the first applied message.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::{Condvar, Mutex};

use super::messages::WorkerMsg;
use crate::response::{PrepareOptions, PreparedResponse};

/// Cache entry for one bundle route.
pub struct ResponseCache {
    options: PrepareOptions,
    /// Last successful prepared response
    current: ArcSwapOption<PreparedResponse>,
    /// Last build failure; cleared on success
    last_error: ArcSwapOption<String>,
    /// Incremented on every successful build
    generation: AtomicU64,
    /// First-result latch
    ready: Mutex<bool>,
    ready_cv: Condvar,
}

impl ResponseCache {
    pub fn new(options: PrepareOptions) -> Self {
        Self {
            options,
            current: ArcSwapOption::empty(),
            last_error: ArcSwapOption::empty(),
            generation: AtomicU64::new(0),
            ready: Mutex::new(false),
            ready_cv: Condvar::new(),
        }
    }

    /// Apply one worker message.
    ///
    /// Success atomically swaps in the freshly prepared response and clears
    /// the error; failure records the error and leaves the previous
    /// response untouched (serve stale-but-valid over an error).
    pub fn apply(&self, msg: WorkerMsg) {
        match msg {
            WorkerMsg::LatestBundle { contents } => {
                let response = PreparedResponse::prepare(contents, &self.options);
                self.current.store(Some(Arc::new(response)));
                self.last_error.store(None);
                self.generation.fetch_add(1, Ordering::AcqRel);
            }
            WorkerMsg::BuildError { message } => {
                self.last_error.store(Some(Arc::new(message)));
            }
        }
        self.open_latch();
    }

    /// Unblock waiters without a result (shutdown before the first build).
    pub fn close(&self) {
        self.open_latch();
    }

    fn open_latch(&self) {
        let mut ready = self.ready.lock();
        if !*ready {
            *ready = true;
            self.ready_cv.notify_all();
        }
    }

    /// Block until the first build result has been recorded (or the cache
    /// was closed). Non-blocking from then on.
    pub fn wait_ready(&self) {
        let mut ready = self.ready.lock();
        while !*ready {
            self.ready_cv.wait(&mut ready);
        }
    }

    /// Snapshot of the last successful response.
    pub fn response(&self) -> Option<Arc<PreparedResponse>> {
        self.current.load_full()
    }

    /// The last build failure, if the most recent build failed.
    pub fn last_error(&self) -> Option<Arc<String>> {
        self.last_error.load_full()
    }

    /// Number of successful builds applied so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
