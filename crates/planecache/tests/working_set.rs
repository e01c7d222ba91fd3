use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use planecache::{
    Axis, Cache, CacheEvent, CacheListener, CacheUpdater, CrosshairStrategy, Error, Order,
    RectangleStrategy, Source, SourceError,
};
use planesource::{position_to_raster, ByteSource, PixelSource, PixelType, SyntheticReader};

/// Source handing out a fresh counter value per call, failing on chosen calls
struct TicketSource {
    count: usize,
    calls: Arc<AtomicUsize>,
    fail_on_call: Option<usize>,
}

impl Source for TicketSource {
    type Object = (usize, usize);

    fn count(&self) -> usize {
        self.count
    }

    fn get(&mut self, lengths: &[usize], pos: &[usize]) -> Result<(usize, usize), SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(call) == self.fail_on_call {
            return Err(SourceError::new(format!("call {} failed", call)));
        }
        let index = position_to_raster(lengths, pos)
            .map_err(|e| SourceError::with_cause("bad position", e))?;
        Ok((index, call))
    }

    fn describe(&self) -> String {
        "tickets".to_string()
    }
}

fn tickets(count: usize) -> (TicketSource, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        TicketSource {
            count,
            calls: Arc::clone(&calls),
            fail_on_call: None,
        },
        calls,
    )
}

fn symmetric(lengths: &[usize], reach: usize) -> Vec<Axis> {
    lengths
        .iter()
        .map(|&l| Axis::new(l).with_range(reach, reach))
        .collect()
}

fn record(cache: &Cache<(usize, usize)>) -> Arc<Mutex<Vec<CacheEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: Arc<dyn CacheListener> = Arc::new(move |e: &CacheEvent| sink.lock().push(*e));
    cache.subscribe(listener);
    seen
}

#[test]
fn resident_object_is_last_fetched() {
    let (source, _) = tickets(25);
    let cache = Cache::new(CrosshairStrategy::from_axes(symmetric(&[5, 5], 1)).unwrap(), source);

    let first = cache.get_object(&[2, 2]).unwrap();
    assert_eq!(first.0, 12);
    assert!(cache.is_resident(&[2, 2]).unwrap());

    // Move away far enough to evict [2, 2], then come back
    cache.get_object(&[0, 0]).unwrap();
    assert!(!cache.is_resident(&[2, 2]).unwrap());
    let again = cache.get_object(&[2, 2]).unwrap();

    assert_eq!(again.0, 12);
    assert!(again.1 > first.1);
}

#[test]
fn working_set_matches_load_list_for_every_move() {
    let (source, _) = tickets(60);
    let strategy = RectangleStrategy::from_axes(vec![
        Axis::new(5).with_range(1, 2),
        Axis::new(4).with_range(1, 0).with_order(Order::Forward),
        Axis::new(3).with_priority(2).with_range(1, 1),
    ])
    .unwrap();
    let cache = Cache::new(strategy, source);

    for pos in [[0, 0, 0], [4, 3, 2], [2, 1, 1], [2, 2, 1], [0, 3, 0]] {
        cache.get_object(&pos).unwrap();

        let lengths = [5, 4, 3];
        let mut expected: Vec<usize> = cache
            .load_list()
            .unwrap()
            .iter()
            .map(|p| position_to_raster(&lengths, p).unwrap())
            .collect();
        expected.sort_unstable();
        assert_eq!(cache.resident_indices(), expected, "after moving to {:?}", pos);
    }
}

#[test]
fn repeated_get_publishes_no_second_load() {
    let (source, calls) = tickets(25);
    let cache = Cache::new(CrosshairStrategy::from_axes(symmetric(&[5, 5], 1)).unwrap(), source);
    let seen = record(&cache);

    let a = cache.get_object(&[1, 1]).unwrap();
    let b = cache.get_object(&[1, 1]).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    let events = seen.lock();
    let loads_of_focal = events
        .iter()
        .filter(|e| **e == CacheEvent::ObjectLoaded(6))
        .count();
    assert_eq!(loads_of_focal, 1);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, CacheEvent::PositionChanged(6)))
            .count(),
        2
    );
}

#[test]
fn event_sequence_for_a_move() {
    let (source, _) = tickets(10);
    let strategy = CrosshairStrategy::from_axes(vec![Axis::new(10).with_range(1, 0)]).unwrap();
    let cache = Cache::new(strategy, source);
    cache.get_object(&[0]).unwrap();
    let seen = record(&cache);

    cache.get_object(&[1]).unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            CacheEvent::PositionChanged(1),
            CacheEvent::ObjectDropped(0),
            CacheEvent::ObjectLoaded(2),
        ]
    );
}

#[test]
fn fail_fast_on_third_of_four() {
    let (mut source, calls) = tickets(10);
    source.fail_on_call = Some(3);
    let strategy = CrosshairStrategy::from_axes(vec![
        Axis::new(10).with_range(3, 0).with_order(Order::Forward)
    ])
    .unwrap();
    let cache = Cache::new(strategy, source);

    assert_eq!(cache.load_list().unwrap().len(), 4);
    let result = cache.get_object(&[0]);

    assert!(matches!(result, Err(Error::Source(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(cache.is_resident(&[0]).unwrap());
    assert!(cache.is_resident(&[1]).unwrap());
    assert!(!cache.is_resident(&[2]).unwrap());
    assert!(!cache.is_resident(&[3]).unwrap());

    // Retrying the whole call fills the rest
    cache.get_object(&[0]).unwrap();
    assert_eq!(cache.resident_count(), 4);
}

#[test]
fn listener_panic_does_not_abort_get() {
    let (source, _) = tickets(4);
    let cache = Cache::new(CrosshairStrategy::new(&[4]).unwrap(), source);
    let bad: Arc<dyn CacheListener> = Arc::new(|_: &CacheEvent| panic!("broken console"));
    cache.subscribe(Arc::clone(&bad));

    let object = cache.get_object(&[3]).unwrap();

    assert_eq!(object.0, 3);
    assert!(cache.unsubscribe(&bad));
}

#[test]
fn listener_may_read_cache_state() {
    let (source, _) = tickets(25);
    let cache = Cache::new(CrosshairStrategy::from_axes(symmetric(&[5, 5], 1)).unwrap(), source);
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let reader = cache.clone();
    cache.subscribe(Arc::new(move |e: &CacheEvent| {
        if let CacheEvent::PositionChanged(_) = e {
            sink.lock().push(reader.resident_count());
        }
    }));

    cache.get_object(&[2, 2]).unwrap();

    // Published after the lock is released, so the count is already final
    assert_eq!(*observed.lock(), vec![5]);
}

#[test]
fn quit_protected_source_swap() {
    let (source, old_calls) = tickets(400);
    let strategy = RectangleStrategy::from_axes(symmetric(&[20, 20], 4)).unwrap();
    let cache = Cache::new(strategy, source);

    let mut updater = CacheUpdater::start(&cache).unwrap();
    updater.quit();
    let before = old_calls.load(Ordering::SeqCst);

    let (replacement, new_calls) = tickets(400);
    cache.set_source(replacement).unwrap();

    assert_eq!(old_calls.load(Ordering::SeqCst), before);
    assert_eq!(new_calls.load(Ordering::SeqCst), 81);
    updater.quit();
    assert_eq!(old_calls.load(Ordering::SeqCst), before);
}

#[test]
fn byte_and_image_sources_behind_the_cache() {
    let strategy = CrosshairStrategy::from_axes(symmetric(&[4, 3], 1)).unwrap();
    let bytes = Cache::new(
        strategy.clone(),
        ByteSource::new(SyntheticReader::new(12, 8, 8, PixelType::Uint8)),
    );
    let plane = bytes.get_object(&[1, 2]).unwrap();
    assert_eq!(plane.len(), 64);
    assert_eq!(plane[0], 9);

    let images = Cache::new(
        strategy,
        PixelSource::images(SyntheticReader::new(12, 4, 2, PixelType::Float)),
    );
    let image = images.get_object(&[3, 0]).unwrap();
    assert_eq!((image.width, image.height), (4, 2));
    assert_eq!(image.data.pixel_type(), PixelType::Float);
    assert!(images.describe().ends_with(" over image (synthetic)"));
}

#[test]
fn dataset_smaller_than_axis_space() {
    let (source, calls) = tickets(6);
    let cache = Cache::new(CrosshairStrategy::from_axes(symmetric(&[3, 3], 1)).unwrap(), source);

    // Neighbors on the third row do not exist in the dataset and are skipped
    cache.get_object(&[1, 1]).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    assert!(matches!(cache.get_object(&[0, 2]), Err(Error::InvalidAxis(_))));
}

#[test]
fn listeners_see_updater_and_foreground_events_in_mutation_order() {
    let (source, _) = tickets(10);
    let strategy = CrosshairStrategy::from_axes(vec![
        Axis::new(10).with_range(3, 0).with_order(Order::Forward)
    ])
    .unwrap();
    let cache = Cache::new(strategy, source);
    let seen = record(&cache);

    // Stall delivery of the updater's first event until the foreground has moved
    let (started_tx, started_rx) = mpsc::channel();
    let started_tx = Mutex::new(Some(started_tx));
    cache.subscribe(Arc::new(move |_: &CacheEvent| {
        if thread::current().name() == Some("cache-updater") {
            if let Some(tx) = started_tx.lock().take() {
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(200));
            }
        }
    }));

    let mut updater = CacheUpdater::start(&cache).unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    cache.get_object(&[6]).unwrap();
    updater.quit();

    let events = seen.lock().clone();
    assert_eq!(events[0], CacheEvent::ObjectLoaded(0));
    assert_eq!(events[1], CacheEvent::PositionChanged(6));

    let mut view = BTreeSet::new();
    for event in &events {
        match event {
            CacheEvent::ObjectLoaded(i) => {
                view.insert(*i);
            }
            CacheEvent::ObjectDropped(i) => {
                view.remove(i);
            }
            _ => {}
        }
    }
    assert_eq!(view.into_iter().collect::<Vec<_>>(), cache.resident_indices());
    assert_eq!(cache.resident_indices(), vec![6, 7, 8, 9]);
}

#[test]
fn swaps_announce_themselves_before_repopulating() {
    let (source, _) = tickets(5);
    let cache = Cache::new(CrosshairStrategy::from_axes(symmetric(&[5], 1)).unwrap(), source);
    cache.get_object(&[2]).unwrap();
    let seen = record(&cache);

    cache
        .set_strategy(CrosshairStrategy::from_axes(symmetric(&[5], 0)).unwrap())
        .unwrap();
    assert_eq!(
        *seen.lock(),
        vec![
            CacheEvent::StrategyChanged,
            CacheEvent::PositionChanged(2),
            CacheEvent::ObjectLoaded(2),
        ]
    );
    seen.lock().clear();

    let (replacement, calls) = tickets(5);
    cache.set_source(replacement).unwrap();
    assert_eq!(
        *seen.lock(),
        vec![
            CacheEvent::SourceChanged,
            CacheEvent::PositionChanged(2),
            CacheEvent::ObjectLoaded(2),
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.resident_indices(), vec![2]);
}
