//! Cache events and the listener channel
//!
//! Listeners are pure consumers. A panicking listener is logged and skipped;
//! it never aborts the mutation that raised the event.
//!
//! Events raised by concurrent mutations go through one queue. Whichever
//! thread finds the queue undrained delivers everything in it, so listeners
//! see events in the order the mutations happened.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{error, trace};

/// One cache state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEvent {
    /// A new source was installed
    SourceChanged,
    /// A new strategy was installed
    StrategyChanged,
    /// The focal position moved to this raster index
    PositionChanged(usize),
    /// An axis priority changed
    PrioritiesChanged,
    /// An axis order changed
    OrderChanged,
    /// An axis reach changed
    RangeChanged,
    /// The object at this raster index became resident
    ObjectLoaded(usize),
    /// The object at this raster index was evicted
    ObjectDropped(usize),
}

impl CacheEvent {
    /// Raster index the event refers to, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            CacheEvent::PositionChanged(i)
            | CacheEvent::ObjectLoaded(i)
            | CacheEvent::ObjectDropped(i) => Some(*i),
            _ => None,
        }
    }

    /// Upper-case event name
    pub fn name(&self) -> &'static str {
        match self {
            CacheEvent::SourceChanged => "SOURCE_CHANGED",
            CacheEvent::StrategyChanged => "STRATEGY_CHANGED",
            CacheEvent::PositionChanged(_) => "POSITION_CHANGED",
            CacheEvent::PrioritiesChanged => "PRIORITIES_CHANGED",
            CacheEvent::OrderChanged => "ORDER_CHANGED",
            CacheEvent::RangeChanged => "RANGE_CHANGED",
            CacheEvent::ObjectLoaded(_) => "OBJECT_LOADED",
            CacheEvent::ObjectDropped(_) => "OBJECT_DROPPED",
        }
    }
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index() {
            Some(index) => write!(f, "{}({})", self.name(), index),
            None => f.write_str(self.name()),
        }
    }
}

/// Receiver of cache events
pub trait CacheListener: Send + Sync {
    /// Called once per published event
    fn on_cache_event(&self, event: &CacheEvent);
}

impl<F> CacheListener for F
where
    F: Fn(&CacheEvent) + Send + Sync,
{
    fn on_cache_event(&self, event: &CacheEvent) {
        self(event)
    }
}

/// Broadcasts events to registered listeners
#[derive(Default)]
pub struct EventChannel {
    listeners: RwLock<Vec<Arc<dyn CacheListener>>>,
    queue: Mutex<VecDeque<CacheEvent>>,
    /// Held by the thread currently delivering queued events
    draining: Mutex<()>,
}

impl EventChannel {
    /// Create a channel with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn subscribe(&self, listener: Arc<dyn CacheListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, listener: &Arc<dyn CacheListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `event` to every listener
    pub fn publish(&self, event: CacheEvent) {
        // Snapshot so listeners may subscribe or unsubscribe re-entrantly
        let listeners: Vec<Arc<dyn CacheListener>> = self.listeners.read().clone();
        trace!(%event, listeners = listeners.len(), "Publishing cache event");

        for listener in listeners {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| listener.on_cache_event(&event)));
            if let Err(payload) = delivered {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(%event, %reason, "Cache listener panicked");
            }
        }
    }

    /// Deliver several events in order
    pub fn publish_all(&self, events: impl IntoIterator<Item = CacheEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Append events to the delivery queue without publishing them
    ///
    /// Callers enqueue while still holding the lock that orders their
    /// mutations, then call [`drain`](Self::drain) after releasing it.
    pub fn enqueue(&self, events: impl IntoIterator<Item = CacheEvent>) {
        self.queue.lock().extend(events);
    }

    /// Publish queued events unless another thread is already doing so
    ///
    /// A listener that mutates the cache re-entrantly has its events
    /// delivered by the outer drain, after the current event.
    pub fn drain(&self) {
        loop {
            let Some(guard) = self.draining.try_lock() else {
                return;
            };
            loop {
                let batch: Vec<CacheEvent> = self.queue.lock().drain(..).collect();
                if batch.is_empty() {
                    break;
                }
                self.publish_all(batch);
            }
            drop(guard);

            // Events queued after the last check but before the release
            if self.queue.lock().is_empty() {
                return;
            }
        }
    }
}
