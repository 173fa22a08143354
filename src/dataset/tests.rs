//! Test suite for the dataset submodule.
//!
//! Test categories:
//! 1. ReplayDataset mapping of table states to fetch outcomes
//! 2. Prefetcher readiness and in-order delivery
//! 3. End-of-stream draining and stickiness
//! 4. Backpressure under a bounded queue
//! 5. Shutdown (drop stops and joins the fetch thread)
//! 6. End-to-end delivery over a live table

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use super::*;
use crate::core::rate_limiter::RateLimiter;
use crate::core::transition::Transition;
use crate::error::TrainingError;
use crate::replay::table::{replay_table, ReplayTableConfig, SharedReplayTable};

// =============================================================================
// HELPER SOURCES
// =============================================================================

/// Yields its scripted batches in order, then reports exhaustion.
struct ScriptedSource {
    batches: VecDeque<Vec<u32>>,
}

impl ScriptedSource {
    fn new(count: u32) -> Self {
        Self {
            batches: (0..count).map(|i| vec![i]).collect(),
        }
    }
}

impl BatchSource for ScriptedSource {
    type Batch = Vec<u32>;

    fn fetch_timeout(&mut self, _timeout: Duration) -> Fetch<Vec<u32>> {
        match self.batches.pop_front() {
            Some(batch) => Fetch::Ready(batch),
            None => Fetch::Exhausted,
        }
    }
}

/// Never produces; always times out.
struct PendingSource;

impl BatchSource for PendingSource {
    type Batch = Vec<u32>;

    fn fetch_timeout(&mut self, timeout: Duration) -> Fetch<Vec<u32>> {
        thread::sleep(timeout);
        Fetch::Pending
    }
}

fn make_item(i: usize) -> Transition {
    Transition::new_discrete(vec![i as f32], 0, 0.0, 1.0, vec![(i + 1) as f32])
}

fn fast_config(buffer_size: usize) -> PrefetchConfig {
    PrefetchConfig::new()
        .with_buffer_size(buffer_size)
        .with_fetch_timeout(Duration::from_millis(10))
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

// =============================================================================
// REPLAY DATASET
// =============================================================================

#[test]
fn test_dataset_rejects_zero_batch_size() {
    let table: SharedReplayTable<Transition> = replay_table(
        ReplayTableConfig::new().with_max_size(10),
        RateLimiter::min_size(1).unwrap(),
    )
    .unwrap();
    assert!(matches!(
        ReplayDataset::new(table, 0),
        Err(TrainingError::InvalidConfig(_))
    ));
}

#[test]
fn test_dataset_maps_table_states() {
    let table: SharedReplayTable<Transition> = replay_table(
        ReplayTableConfig::new().with_max_size(100).with_seed(7),
        RateLimiter::min_size(5).unwrap(),
    )
    .unwrap();
    let mut dataset = ReplayDataset::new(table.clone(), 2).unwrap();

    // Below the minimum size the fetch times out.
    table.try_insert(make_item(0)).unwrap();
    assert!(matches!(
        dataset.fetch_timeout(Duration::from_millis(10)),
        Fetch::Pending
    ));

    for i in 1..5 {
        table.try_insert(make_item(i)).unwrap();
    }
    match dataset.fetch_timeout(Duration::from_millis(100)) {
        Fetch::Ready(batch) => assert_eq!(batch.len(), 2),
        other => panic!("expected Ready, got {:?}", other),
    }

    table.close();
    assert!(matches!(
        dataset.fetch_timeout(Duration::from_millis(10)),
        Fetch::Exhausted
    ));
}

// =============================================================================
// PREFETCHER LIFECYCLE
// =============================================================================

#[test]
fn test_ready_false_while_source_pends() {
    let iterator = PrefetchingIterator::spawn(PendingSource, fast_config(2)).unwrap();
    assert!(!iterator.ready());
    thread::sleep(Duration::from_millis(50));
    assert!(!iterator.ready());
    assert_eq!(iterator.fetched(), 0);
}

#[test]
fn test_delivers_batches_in_order_then_ends() {
    let iterator = PrefetchingIterator::spawn(ScriptedSource::new(3), fast_config(2)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || iterator.ready()));

    assert_eq!(iterator.next().unwrap(), vec![0]);
    assert_eq!(iterator.next().unwrap(), vec![1]);
    assert_eq!(iterator.next().unwrap(), vec![2]);

    assert!(matches!(iterator.next(), Err(TrainingError::EndOfStream)));
    assert!(iterator.is_exhausted());
    assert!(!iterator.ready());
    // Exhaustion is sticky.
    assert!(matches!(iterator.next(), Err(TrainingError::EndOfStream)));
}

#[test]
fn test_queued_batches_survive_exhaustion() {
    // The source dries up immediately; everything queued must still arrive.
    let iterator = PrefetchingIterator::spawn(ScriptedSource::new(2), fast_config(4)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || iterator.fetched() == 2));
    thread::sleep(Duration::from_millis(20));

    assert_eq!(iterator.next().unwrap(), vec![0]);
    assert_eq!(iterator.next().unwrap(), vec![1]);
    assert!(matches!(iterator.next(), Err(TrainingError::EndOfStream)));
}

// =============================================================================
// BACKPRESSURE
// =============================================================================

#[test]
fn test_bounded_queue_limits_fetch_ahead() {
    let iterator = PrefetchingIterator::spawn(ScriptedSource::new(10), fast_config(1)).unwrap();

    // One batch queued plus one parked in the send loop, never more.
    assert!(wait_until(Duration::from_secs(2), || iterator.fetched() == 2));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(iterator.fetched(), 2);

    for i in 0..10 {
        assert_eq!(iterator.next().unwrap(), vec![i]);
    }
    assert!(matches!(iterator.next(), Err(TrainingError::EndOfStream)));
}

// =============================================================================
// SHUTDOWN
// =============================================================================

#[test]
fn test_drop_stops_fetch_thread() {
    let iterator = PrefetchingIterator::spawn(PendingSource, fast_config(1)).unwrap();
    thread::sleep(Duration::from_millis(30));

    let start = Instant::now();
    drop(iterator);
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "drop must stop and join the fetch thread promptly"
    );
}

// =============================================================================
// END TO END
// =============================================================================

#[test]
fn test_prefetch_over_live_table() {
    let table: SharedReplayTable<Transition> = replay_table(
        ReplayTableConfig::new().with_max_size(100).with_seed(7),
        RateLimiter::min_size(5).unwrap(),
    )
    .unwrap();
    let dataset = ReplayDataset::new(table.clone(), 3).unwrap();
    let iterator = PrefetchingIterator::spawn(dataset, fast_config(1)).unwrap();

    // Nothing admissible yet.
    assert!(!iterator.ready());

    for i in 0..5 {
        table.try_insert(make_item(i)).unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || iterator.ready()));
    assert_eq!(iterator.next().unwrap().len(), 3);
    assert_eq!(iterator.next().unwrap().len(), 3);

    // Closing the table ends the stream after the queue drains.
    table.close();
    let err = loop {
        match iterator.next() {
            Ok(batch) => assert_eq!(batch.len(), 3),
            Err(err) => break err,
        }
    };
    assert!(matches!(err, TrainingError::EndOfStream));
}
