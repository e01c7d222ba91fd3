//! Background updater populating the working set off the caller's thread
//!
//! The worker takes the cache lock for one position at a time and yields
//! between positions, so foreground calls interleave with it and a quit
//! request is observed before the next fetch. That yield is the only form of
//! reduced priority: the thread's OS scheduling priority is left unchanged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use planesource::Result;
use tracing::{debug, info, warn};

use crate::cache::{Cache, Step};

/// Cancellable background prefetch worker bound to one cache
pub struct CacheUpdater {
    /// Handle to the worker thread
    thread_handle: Option<JoinHandle<()>>,
    /// Cancellation signal
    quit: Arc<AtomicBool>,
}

impl CacheUpdater {
    /// Start populating `cache`'s current load list in the background
    ///
    /// # Errors
    /// * `Error::Io` - the worker thread could not be spawned
    pub fn start<T: Send + Sync + 'static>(cache: &Cache<T>) -> Result<Self> {
        let quit = Arc::new(AtomicBool::new(false));
        let quit_clone = Arc::clone(&quit);
        let cache = cache.clone();

        let thread_handle = thread::Builder::new()
            .name("cache-updater".to_string())
            .spawn(move || Self::run_loop(cache, quit_clone))?;

        debug!("Cache updater started");
        Ok(Self {
            thread_handle: Some(thread_handle),
            quit,
        })
    }

    fn run_loop<T: Send + Sync + 'static>(cache: Cache<T>, quit: Arc<AtomicBool>) {
        let (mut epoch, mut list) = match cache.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(error = %e, "Cache updater has nothing to do");
                return;
            }
        };
        let mut loaded = 0;
        let mut next = 0;

        while next < list.len() {
            if quit.load(Ordering::Acquire) {
                debug!(remaining = list.len() - next, "Cache updater cancelled");
                return;
            }

            match cache.prefetch_step(epoch, &list[next]) {
                Ok(Step::Done) => {
                    loaded += 1;
                    next += 1;
                }
                Ok(Step::Stale) => match cache.snapshot() {
                    Ok((new_epoch, new_list)) => {
                        debug!("Working set moved, refreshing load list");
                        epoch = new_epoch;
                        list = new_list;
                        next = 0;
                    }
                    Err(e) => {
                        debug!(error = %e, "Cache updater stopping");
                        return;
                    }
                },
                Err(e) => {
                    warn!(pos = %list[next], error = %e, "Background fetch failed");
                    next += 1;
                }
            }

            thread::yield_now();
        }

        info!(positions = loaded, "Cache updater finished");
    }

    /// Signal cancellation and wait for the worker to exit
    ///
    /// Once this returns the worker makes no further source calls.
    pub fn quit(&mut self) {
        self.quit.store(true, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!("Cache updater thread panicked: {:?}", e);
            }
        }
    }

    /// Check if the worker is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for CacheUpdater {
    fn drop(&mut self) {
        self.quit();
    }
}
