//! PlaneCache: strategy-driven working set over a source
//!
//! All mutable state sits behind one mutex and every source fetch happens
//! while holding it, so at most one fetch per cache is in flight. Events
//! raised under the lock are queued before it is released and published
//! after, in lock order.

use std::collections::HashSet;
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::Mutex;
use planesource::{position_to_raster, Error, Position, Result, Source};
use tracing::{debug, info, warn};

use crate::event::{CacheEvent, CacheListener, EventChannel};
use crate::stats::CacheStats;
use crate::strategy::{Axis, Order, Strategy, StrategyKind};

type BoxedSource<T> = Box<dyn Source<Object = T>>;

/// Outcome of a single background prefetch step
pub(crate) enum Step {
    /// Slot filled or already resident
    Done,
    /// The working set moved since the load list was computed
    Stale,
}

/// State guarded by the cache lock
pub(crate) struct CacheState<T> {
    source: Option<BoxedSource<T>>,
    strategy: Option<Box<dyn Strategy>>,
    /// `Some` exactly when the slot is resident
    slots: Vec<Option<Arc<T>>>,
    position: Position,
    /// Bumped whenever the working set may have moved
    epoch: u64,
}

impl<T> CacheState<T> {
    fn strategy(&self) -> Result<&dyn Strategy> {
        self.strategy
            .as_deref()
            .ok_or(Error::NotConfigured("strategy"))
    }

    fn strategy_mut(&mut self) -> Result<&mut Box<dyn Strategy>> {
        self.strategy
            .as_mut()
            .ok_or(Error::NotConfigured("strategy"))
    }

    fn reset(&mut self) {
        let count = self.source.as_ref().map_or(0, |s| s.count());
        let axes = self.strategy.as_ref().map_or(0, |s| s.lengths().len());
        self.slots = vec![None; count];
        self.position = Position::origin(axes);
        self.epoch += 1;
    }

    /// Fetch `pos` into slot `index` unless it is already resident
    fn fetch(
        &mut self,
        index: usize,
        pos: &Position,
        lengths: &[usize],
        events: &mut Vec<CacheEvent>,
        stats: &CacheStats,
    ) -> Result<()> {
        if index >= self.slots.len() {
            debug!(%pos, index, "Position beyond dataset, skipping");
            return Ok(());
        }
        if self.slots[index].is_some() {
            return Ok(());
        }

        let source = self.source.as_mut().ok_or(Error::NotConfigured("source"))?;
        match source.get(lengths, pos) {
            Ok(object) => {
                self.slots[index] = Some(Arc::new(object));
                stats.record_load();
                events.push(CacheEvent::ObjectLoaded(index));
                debug!(%pos, index, "Loaded object");
                Ok(())
            }
            Err(e) => {
                stats.record_source_error();
                warn!(%pos, index, error = %e, "Source fetch failed");
                Err(e.into())
            }
        }
    }

    /// Move the focal position to `pos`, evict and fetch the load list
    fn load(
        &mut self,
        pos: &[usize],
        events: &mut Vec<CacheEvent>,
        stats: &CacheStats,
    ) -> Result<Arc<T>> {
        if self.source.is_none() {
            return Err(Error::NotConfigured("source"));
        }
        let strategy = self.strategy()?;
        let lengths = strategy.lengths().to_vec();
        if pos.len() != lengths.len() {
            return Err(Error::DimensionMismatch {
                expected: lengths.len(),
                actual: pos.len(),
            });
        }
        let list = strategy.load_list(pos)?;
        let focal = position_to_raster(&lengths, pos)?;
        if focal >= self.slots.len() {
            return Err(Error::InvalidAxis(format!(
                "position {} maps to index {} but the source holds {} objects",
                Position::from(pos),
                focal,
                self.slots.len()
            )));
        }

        if self.position.as_slice() != pos {
            self.position = Position::from(pos);
            self.epoch += 1;
        }
        events.push(CacheEvent::PositionChanged(focal));

        let indices = list
            .iter()
            .map(|p| position_to_raster(&lengths, p))
            .collect::<Result<Vec<usize>>>()?;
        let keep: HashSet<usize, RandomState> = indices.iter().copied().collect();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !keep.contains(&index) {
                *slot = None;
                stats.record_drop();
                events.push(CacheEvent::ObjectDropped(index));
            }
        }

        if self.slots[focal].is_some() {
            stats.record_hit();
        } else {
            stats.record_miss();
        }

        for (p, &index) in list.iter().zip(&indices) {
            self.fetch(index, p, &lengths, events, stats)?;
        }

        self.slots[focal]
            .clone()
            .ok_or_else(|| Error::InvalidAxis(format!("focal slot {} not resident", focal)))
    }

    /// Reset and repopulate around the previous focal position when both
    /// components are present
    fn repopulate(&mut self, events: &mut Vec<CacheEvent>, stats: &CacheStats) -> Result<()> {
        if self.source.is_none() || self.strategy.is_none() {
            return Ok(());
        }
        let previous = std::mem::take(&mut self.position);
        self.reset();

        let keeps_position = self
            .strategy()
            .map(|s| s.core().check_position(&previous).is_ok())
            .unwrap_or(false);
        let focal = if keeps_position {
            previous
        } else {
            self.position.clone()
        };
        self.position = focal.clone();
        self.load(&focal, events, stats).map(|_| ())
    }
}

struct Shared<T> {
    state: Mutex<CacheState<T>>,
    events: EventChannel,
    stats: CacheStats,
}

/// Multi-dimensional prefetching cache
///
/// Cloning yields another handle to the same cache.
pub struct Cache<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Cache<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Send + Sync + 'static> Cache<T> {
    /// Create a cache with neither a source nor a strategy
    pub fn empty() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CacheState {
                    source: None,
                    strategy: None,
                    slots: Vec::new(),
                    position: Position::default(),
                    epoch: 0,
                }),
                events: EventChannel::new(),
                stats: CacheStats::new(),
            }),
        }
    }

    /// Create a cache over `source` using `strategy`
    ///
    /// Nothing is fetched until the first [`get_object`](Self::get_object).
    pub fn new<St, So>(strategy: St, source: So) -> Self
    where
        St: Strategy + 'static,
        So: Source<Object = T> + 'static,
    {
        let cache = Self::empty();
        {
            let mut state = cache.shared.state.lock();
            state.strategy = Some(Box::new(strategy));
            state.source = Some(Box::new(source));
            state.reset();
        }
        cache
    }

    /// Run `f` under the lock, then publish the events it raised
    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut CacheState<T>, &mut Vec<CacheEvent>, &CacheStats) -> R,
    ) -> R {
        let mut events = Vec::new();
        let result = {
            let mut state = self.shared.state.lock();
            let result = f(&mut state, &mut events, &self.shared.stats);
            self.shared.events.enqueue(events);
            result
        };
        self.shared.events.drain();
        result
    }

    /// Get the object at `pos`, making the strategy's load list resident
    ///
    /// Everything outside the load list is evicted. A source failure stops
    /// the call; slots already evicted or loaded stay that way.
    ///
    /// # Errors
    /// * `Error::NotConfigured` - no source or strategy installed
    /// * `Error::DimensionMismatch` - wrong number of coordinates
    /// * `Error::InvalidAxis` - a coordinate is out of range
    /// * `Error::Source` - the source failed to produce an object
    pub fn get_object(&self, pos: &[usize]) -> Result<Arc<T>> {
        self.with_state(|state, events, stats| state.load(pos, events, stats))
    }

    /// Empty every slot and move the focal position to the origin
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        state.reset();
        info!(slots = state.slots.len(), "Cache reset");
    }

    /// Replace the strategy and repopulate around the focal position
    ///
    /// The strategy is installed even if repopulation fails.
    pub fn set_strategy<St: Strategy + 'static>(&self, strategy: St) -> Result<()> {
        self.set_boxed_strategy(Box::new(strategy))
    }

    /// Replace the strategy with an already boxed one
    pub fn set_boxed_strategy(&self, strategy: Box<dyn Strategy>) -> Result<()> {
        self.with_state(|state, events, stats| {
            info!(strategy = %strategy.describe(), "Strategy changed");
            state.strategy = Some(strategy);
            events.push(CacheEvent::StrategyChanged);
            state.repopulate(events, stats)
        })
    }

    /// Replace the source and repopulate around the focal position
    ///
    /// The source is installed even if repopulation fails.
    pub fn set_source<So: Source<Object = T> + 'static>(&self, source: So) -> Result<()> {
        self.set_boxed_source(Box::new(source))
    }

    /// Replace the source with an already boxed one
    pub fn set_boxed_source(&self, source: Box<dyn Source<Object = T>>) -> Result<()> {
        self.with_state(|state, events, stats| {
            info!(source = %source.describe(), count = source.count(), "Source changed");
            state.source = Some(source);
            events.push(CacheEvent::SourceChanged);
            state.repopulate(events, stats)
        })
    }

    /// Current focal position
    pub fn current_position(&self) -> Position {
        self.shared.state.lock().position.clone()
    }

    /// Load list for the current focal position
    pub fn load_list(&self) -> Result<Vec<Position>> {
        let state = self.shared.state.lock();
        state.strategy()?.load_list(&state.position)
    }

    /// Check whether the object at `pos` is resident
    pub fn is_resident(&self, pos: &[usize]) -> Result<bool> {
        let state = self.shared.state.lock();
        let index = position_to_raster(state.strategy()?.lengths(), pos)?;
        Ok(state.slots.get(index).is_some_and(Option::is_some))
    }

    /// Raster indices of every resident slot, ascending
    pub fn resident_indices(&self) -> Vec<usize> {
        let state = self.shared.state.lock();
        state
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| i))
            .collect()
    }

    /// Number of resident objects
    pub fn resident_count(&self) -> usize {
        let state = self.shared.state.lock();
        state.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Number of objects the source addresses (0 without a source)
    pub fn source_count(&self) -> usize {
        self.shared.state.lock().slots.len()
    }

    /// Set the priority of `axis` on the installed strategy
    pub fn set_priority(&self, axis: usize, priority: i32) -> Result<()> {
        self.update_strategy(CacheEvent::PrioritiesChanged, |s| s.set_priority(axis, priority))
    }

    /// Set the forward and backward reach of `axis` on the installed strategy
    pub fn set_range(&self, axis: usize, forward: usize, backward: usize) -> Result<()> {
        self.update_strategy(CacheEvent::RangeChanged, |s| s.set_range(axis, forward, backward))
    }

    /// Set the walk order of `axis` on the installed strategy
    pub fn set_order(&self, axis: usize, order: Order) -> Result<()> {
        self.update_strategy(CacheEvent::OrderChanged, |s| s.set_order(axis, order))
    }

    fn update_strategy(
        &self,
        event: CacheEvent,
        f: impl FnOnce(&mut dyn Strategy) -> Result<bool>,
    ) -> Result<()> {
        self.with_state(|state, events, _| {
            if f(&mut **state.strategy_mut()?)? {
                state.epoch += 1;
                events.push(event);
            }
            Ok(())
        })
    }

    /// Snapshot of the strategy's axes
    pub fn axes(&self) -> Result<Vec<Axis>> {
        Ok(self.shared.state.lock().strategy()?.core().axes().to_vec())
    }

    /// Kind of the installed strategy
    pub fn strategy_kind(&self) -> Option<StrategyKind> {
        self.shared.state.lock().strategy.as_ref().map(|s| s.kind())
    }

    /// One-line description of the installed components
    pub fn describe(&self) -> String {
        let state = self.shared.state.lock();
        let strategy = state
            .strategy
            .as_ref()
            .map_or_else(|| "no strategy".to_string(), |s| s.describe());
        let source = state
            .source
            .as_ref()
            .map_or_else(|| "no source".to_string(), |s| s.describe());
        format!("{} over {}", strategy, source)
    }

    /// Cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.shared.stats
    }

    /// Event channel of this cache
    pub fn events(&self) -> &EventChannel {
        &self.shared.events
    }

    /// Register a listener for cache events
    pub fn subscribe(&self, listener: Arc<dyn CacheListener>) {
        self.shared.events.subscribe(listener);
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, listener: &Arc<dyn CacheListener>) -> bool {
        self.shared.events.unsubscribe(listener)
    }

    /// Epoch and load list of the current working set
    pub(crate) fn snapshot(&self) -> Result<(u64, Vec<Position>)> {
        let state = self.shared.state.lock();
        if state.source.is_none() {
            return Err(Error::NotConfigured("source"));
        }
        let list = state.strategy()?.load_list(&state.position)?;
        Ok((state.epoch, list))
    }

    /// Fetch one listed position if the working set has not moved
    pub(crate) fn prefetch_step(&self, epoch: u64, pos: &Position) -> Result<Step> {
        self.with_state(|state, events, stats| {
            if state.epoch != epoch {
                return Ok(Step::Stale);
            }
            let lengths = state.strategy()?.lengths().to_vec();
            let index = position_to_raster(&lengths, pos)?;
            state.fetch(index, pos, &lengths, events, stats)?;
            Ok(Step::Done)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{CrosshairStrategy, RectangleStrategy};
    use planesource::SourceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source returning the raster index, counting calls, failing on request
    struct IndexSource {
        count: usize,
        calls: Arc<AtomicUsize>,
        fail_on_call: Option<usize>,
    }

    impl IndexSource {
        fn new(count: usize) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    count,
                    calls: Arc::clone(&calls),
                    fail_on_call: None,
                },
                calls,
            )
        }
    }

    impl Source for IndexSource {
        type Object = usize;

        fn count(&self) -> usize {
            self.count
        }

        fn get(&mut self, lengths: &[usize], pos: &[usize]) -> std::result::Result<usize, SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(call) == self.fail_on_call {
                return Err(SourceError::new("decode failed"));
            }
            position_to_raster(lengths, pos).map_err(|e| SourceError::with_cause("bad position", e))
        }

        fn describe(&self) -> String {
            "index".to_string()
        }
    }

    fn crosshair(lengths: &[usize], reach: usize) -> CrosshairStrategy {
        CrosshairStrategy::from_axes(
            lengths
                .iter()
                .map(|&l| Axis::new(l).with_range(reach, reach))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_get_object_loads_working_set() {
        let (source, calls) = IndexSource::new(25);
        let cache = Cache::new(crosshair(&[5, 5], 1), source);

        let object = cache.get_object(&[2, 2]).unwrap();

        assert_eq!(*object, 12);
        assert_eq!(cache.resident_count(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(cache.is_resident(&[1, 2]).unwrap());
        assert!(!cache.is_resident(&[1, 1]).unwrap());
        assert_eq!(cache.current_position().as_slice(), &[2, 2]);
    }

    #[test]
    fn test_exact_eviction() {
        let (source, _) = IndexSource::new(25);
        let cache = Cache::new(crosshair(&[5, 5], 1), source);

        cache.get_object(&[2, 2]).unwrap();
        cache.get_object(&[2, 3]).unwrap();

        // [2, 3] and its neighbors; 13, 11 and 7 left the working set
        let expected: HashSet<usize> = [17, 18, 16, 22, 12].into_iter().collect();
        let resident: HashSet<usize> = cache.resident_indices().into_iter().collect();
        assert_eq!(resident, expected);
        assert_eq!(cache.stats().drops(), 3);
    }

    #[test]
    fn test_idempotent_get() {
        let (source, calls) = IndexSource::new(25);
        let cache = Cache::new(crosshair(&[5, 5], 1), source);

        let first = cache.get_object(&[0, 0]).unwrap();
        let second = cache.get_object(&[0, 0]).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let (source, calls) = IndexSource::new(25);
        let cache = Cache::new(crosshair(&[5, 5], 1), source);

        let result = cache.get_object(&[1, 1, 1]);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_out_of_range_position() {
        let (source, _) = IndexSource::new(25);
        let cache = Cache::new(crosshair(&[5, 5], 1), source);
        assert!(matches!(cache.get_object(&[5, 0]), Err(Error::InvalidAxis(_))));
    }

    #[test]
    fn test_not_configured() {
        let cache: Cache<usize> = Cache::empty();
        assert!(matches!(
            cache.get_object(&[0]),
            Err(Error::NotConfigured("source"))
        ));
        assert_eq!(cache.describe(), "no strategy over no source");
    }

    #[test]
    fn test_fail_fast_keeps_earlier_loads() {
        let (mut source, _) = IndexSource::new(10);
        source.fail_on_call = Some(3);
        let strategy = CrosshairStrategy::from_axes(vec![
            Axis::new(10).with_range(3, 0).with_order(Order::Forward),
        ])
        .unwrap();
        let cache = Cache::new(strategy, source);

        let result = cache.get_object(&[0]);

        assert!(matches!(result, Err(Error::Source(_))));
        assert_eq!(cache.resident_indices(), vec![0, 1]);
        assert_eq!(cache.stats().source_errors(), 1);
    }

    #[test]
    fn test_reset() {
        let (source, _) = IndexSource::new(25);
        let cache = Cache::new(crosshair(&[5, 5], 1), source);
        cache.get_object(&[3, 3]).unwrap();

        cache.reset();

        assert_eq!(cache.resident_count(), 0);
        assert_eq!(cache.current_position().as_slice(), &[0, 0]);
        assert_eq!(cache.source_count(), 25);
    }

    #[test]
    fn test_set_strategy_repopulates_at_focal_position() {
        let (source, _) = IndexSource::new(25);
        let cache = Cache::new(crosshair(&[5, 5], 1), source);
        cache.get_object(&[2, 2]).unwrap();

        let rectangle = RectangleStrategy::from_axes(vec![
            Axis::new(5).with_range(1, 1),
            Axis::new(5).with_range(1, 1),
        ])
        .unwrap();
        cache.set_strategy(rectangle).unwrap();

        assert_eq!(cache.strategy_kind(), Some(StrategyKind::Rectangle));
        assert_eq!(cache.current_position().as_slice(), &[2, 2]);
        assert_eq!(cache.resident_count(), 9);
    }

    #[test]
    fn test_set_strategy_with_new_shape_falls_back_to_origin() {
        let (source, _) = IndexSource::new(25);
        let cache = Cache::new(crosshair(&[5, 5], 0), source);
        cache.get_object(&[4, 4]).unwrap();

        cache.set_strategy(crosshair(&[25], 0)).unwrap();

        assert_eq!(cache.current_position().as_slice(), &[0]);
        assert_eq!(cache.resident_indices(), vec![0]);
    }

    #[test]
    fn test_set_source_swaps_objects() {
        let (source, _) = IndexSource::new(25);
        let cache = Cache::new(crosshair(&[5, 5], 0), source);
        let old = cache.get_object(&[1, 1]).unwrap();

        let (replacement, calls) = IndexSource::new(25);
        cache.set_source(replacement).unwrap();
        let new = cache.get_object(&[1, 1]).unwrap();

        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_strategy_setters_publish() {
        let (source, _) = IndexSource::new(25);
        let cache = Cache::new(crosshair(&[5, 5], 0), source);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        cache.subscribe(Arc::new(move |e: &CacheEvent| sink.lock().push(*e)));

        cache.set_priority(0, 4).unwrap();
        cache.set_priority(0, 4).unwrap();
        cache.set_range(1, 2, 2).unwrap();
        cache.set_order(1, Order::Forward).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                CacheEvent::PrioritiesChanged,
                CacheEvent::RangeChanged,
                CacheEvent::OrderChanged
            ]
        );
        assert_eq!(cache.axes().unwrap()[1].forward, 2);
        assert!(cache.set_range(5, 1, 1).is_err());
    }

    #[test]
    fn test_describe() {
        let (source, _) = IndexSource::new(4);
        let cache = Cache::new(CrosshairStrategy::new(&[4]).unwrap(), source);
        assert_eq!(cache.describe(), "crosshair 4(+0/-0 p0 centered) over index");
    }
}
