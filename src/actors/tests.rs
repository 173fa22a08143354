//! Test suite for the actors submodule.
//!
//! Test categories:
//! 1. Passthrough of acting calls to the wrapped actor
//! 2. Data-gated learner stepping (no data, exactly enough data, growth)
//! 3. Batch size estimation (sentinel start, shrink toward truth)
//! 4. Parameter snapshot refresh after training
//! 5. Fatal learner error propagation

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::*;
use crate::core::rate_limiter::RateLimiter;
use crate::core::transition::{Action, Observation, Transition};
use crate::core::variable_slot::{
    variable_slot, SharedVariableSlot, SharedVariableSource, VariableSnapshot, VariableSource,
};
use crate::dataset::prefetch::{PrefetchConfig, PrefetchingIterator, SharedPrefetchingIterator};
use crate::dataset::replay_dataset::{BatchSource, Fetch, ReplayDataset};
use crate::environment::TimeStep;
use crate::error::TrainingError;
use crate::learner::Learner;
use crate::replay::table::{replay_table, ReplayTableConfig, SharedReplayTable};

// =============================================================================
// HELPER DOUBLES
// =============================================================================

/// Counts every call and always picks action 0.
#[derive(Default)]
struct RecordingActor {
    select_calls: u64,
    observe_first_calls: u64,
    observe_calls: u64,
    update_calls: u64,
}

impl Actor for RecordingActor {
    fn select_action(&mut self, _observation: &Observation) -> Action {
        self.select_calls += 1;
        Action::Discrete(0)
    }

    fn observe_first(&mut self, _timestep: &TimeStep) -> Result<(), TrainingError> {
        self.observe_first_calls += 1;
        Ok(())
    }

    fn observe(
        &mut self,
        _action: &Action,
        _next_timestep: &TimeStep,
    ) -> Result<(), TrainingError> {
        self.observe_calls += 1;
        Ok(())
    }

    fn update(&mut self) -> Result<(), TrainingError> {
        self.update_calls += 1;
        Ok(())
    }
}

/// Consumes one batch per step and publishes bumped parameters.
struct CountingLearner<B> {
    iterator: SharedPrefetchingIterator<B>,
    slot: SharedVariableSlot<Vec<f32>>,
    steps: u64,
    fail_after: Option<u64>,
}

impl<B> CountingLearner<B> {
    fn new(iterator: SharedPrefetchingIterator<B>) -> Self {
        Self {
            iterator,
            slot: variable_slot(vec![0.0; 2]),
            steps: 0,
            fail_after: None,
        }
    }

    fn failing_after(iterator: SharedPrefetchingIterator<B>, steps: u64) -> Self {
        Self {
            fail_after: Some(steps),
            ..Self::new(iterator)
        }
    }
}

impl<B> Learner for CountingLearner<B> {
    type Params = Vec<f32>;

    fn step(&mut self) -> Result<(), TrainingError> {
        if let Some(limit) = self.fail_after {
            if self.steps >= limit {
                return Err(TrainingError::TrainingDiverged(
                    "loss is not finite".to_string(),
                ));
            }
        }
        self.iterator.next()?;
        self.steps += 1;
        self.slot.publish(vec![self.steps as f32; 2]);
        Ok(())
    }

    fn get_variables(&self, names: &[&str]) -> Arc<VariableSnapshot<Vec<f32>>> {
        self.slot.get_variables(names)
    }

    fn variable_source(&self) -> SharedVariableSource<Vec<f32>> {
        self.slot.clone()
    }
}

/// Yields scripted batches then exhausts; never touches a table.
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

/// Never produces a batch.
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

/// Table whose limiter admits exactly one batch of 4 per 100 inserts:
/// offset 400, band [396, 404].
fn make_gated_table() -> SharedReplayTable<Transition> {
    let config = ReplayTableConfig::new().with_max_size(1_000).with_seed(7);
    let limiter = RateLimiter::sample_to_insert_ratio(4.0, 100, 4.0).unwrap();
    replay_table(config, limiter).unwrap()
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
// PASSTHROUGH
// =============================================================================

#[test]
fn test_acting_calls_pass_through() {
    let table = make_gated_table();
    let iterator = PrefetchingIterator::spawn(PendingSource, fast_config(1)).unwrap();
    let learner = CountingLearner::new(Arc::clone(&iterator));
    let mut coordinator = LearningActor::new(
        RecordingActor::default(),
        learner,
        iterator,
        vec![table],
    );

    let action = coordinator.select_action(&vec![0.0]);
    assert_eq!(action, Action::Discrete(0));
    coordinator
        .observe_first(&TimeStep::first(vec![0.0]))
        .unwrap();
    coordinator
        .observe(&action, &TimeStep::mid(1.0, 1.0, vec![1.0]))
        .unwrap();

    assert_eq!(coordinator.actor().select_calls, 1);
    assert_eq!(coordinator.actor().observe_first_calls, 1);
    assert_eq!(coordinator.actor().observe_calls, 1);
}

// =============================================================================
// DATA-GATED STEPPING
// =============================================================================

#[test]
fn test_bounds_start_at_sentinel() {
    let table = make_gated_table();
    let iterator = PrefetchingIterator::spawn(PendingSource, fast_config(1)).unwrap();
    let learner = CountingLearner::new(Arc::clone(&iterator));
    let coordinator = LearningActor::new(
        RecordingActor::default(),
        learner,
        iterator,
        vec![table],
    );

    assert_eq!(coordinator.learner_steps(), 0);
    assert_eq!(coordinator.batch_size_upper_bounds(), &[1_000_000_000]);
}

#[test]
fn test_update_without_data_does_nothing() {
    let table = make_gated_table();
    let iterator = PrefetchingIterator::spawn(PendingSource, fast_config(1)).unwrap();
    let learner = CountingLearner::new(Arc::clone(&iterator));
    let mut coordinator = LearningActor::new(
        RecordingActor::default(),
        learner,
        iterator,
        vec![table],
    );

    coordinator.update().unwrap();
    assert_eq!(coordinator.learner_steps(), 0);
    assert_eq!(coordinator.actor().update_calls, 0);
}

/// INTENT: the coordinator trains exactly as much as the limiter pays for.
/// With samples_per_insert 4, min size 100 and a narrow error buffer, 100
/// inserts admit one batch of 4; with no further inserts the next update
/// must be a no-op, and one more insert buys exactly one more step.
#[test]
fn test_update_tracks_data_availability() {
    let table = make_gated_table();
    let dataset = ReplayDataset::new(table.clone(), 4).unwrap();
    let iterator = PrefetchingIterator::spawn(dataset, fast_config(1)).unwrap();
    let learner = CountingLearner::new(Arc::clone(&iterator));
    let mut coordinator = LearningActor::new(
        RecordingActor::default(),
        learner,
        Arc::clone(&iterator),
        vec![table.clone()],
    );

    for i in 0..100 {
        table.try_insert(make_item(i)).unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || iterator.ready()));

    coordinator.update().unwrap();
    assert_eq!(coordinator.learner_steps(), 1);
    assert_eq!(coordinator.actor().update_calls, 1);
    assert_eq!(coordinator.batch_size_upper_bounds(), &[4]);

    // No data growth, no training.
    coordinator.update().unwrap();
    assert_eq!(coordinator.learner_steps(), 1);
    assert_eq!(coordinator.actor().update_calls, 1);

    // One insert moves the band enough for exactly one more batch.
    table.try_insert(make_item(100)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || iterator.ready()));
    coordinator.update().unwrap();
    assert_eq!(coordinator.learner_steps(), 2);
    assert_eq!(coordinator.actor().update_calls, 2);
}

// =============================================================================
// BATCH SIZE ESTIMATION
// =============================================================================

/// INTENT: the per-table estimate `ceil(completed_samples / learner_steps)`
/// starts far too high and converges toward the true batch size without
/// ever dropping below it.
#[test]
fn test_upper_bound_shrinks_toward_batch_size() {
    // offset 20, band [8, 32]; drive completed_samples to 18 by hand.
    let config = ReplayTableConfig::new().with_max_size(1_000).with_seed(7);
    let limiter = RateLimiter::sample_to_insert_ratio(2.0, 10, 12.0).unwrap();
    let table: SharedReplayTable<Transition> = replay_table(config, limiter).unwrap();
    for i in 0..10 {
        table.try_insert(make_item(i)).unwrap();
    }
    table.try_sample(6).unwrap();
    table.try_sample(6).unwrap();
    for i in 10..13 {
        table.try_insert(make_item(i)).unwrap();
    }
    table.try_sample(6).unwrap();
    assert_eq!(table.completed_samples(), 18);
    // Sample side is now shut: diff 8 leaves no headroom above min_diff 8.
    assert!(!table.can_sample(1));

    let iterator = PrefetchingIterator::spawn(ScriptedSource::new(3), fast_config(4)).unwrap();
    assert!(wait_until(Duration::from_secs(2), || iterator.fetched() == 3));
    thread::sleep(Duration::from_millis(20));

    let learner = CountingLearner::new(Arc::clone(&iterator));
    let mut coordinator = LearningActor::new(
        RecordingActor::default(),
        learner,
        Arc::clone(&iterator),
        vec![table],
    );

    coordinator.update().unwrap();
    // ceil(18/1)=18, ceil(18/2)=9, ceil(18/3)=6.
    assert_eq!(coordinator.learner_steps(), 3);
    assert_eq!(coordinator.batch_size_upper_bounds(), &[6]);
}

// =============================================================================
// SNAPSHOT REFRESH
// =============================================================================

#[test]
fn test_actor_refreshes_snapshot_after_training() {
    let table = make_gated_table();
    let dataset = ReplayDataset::new(table.clone(), 4).unwrap();
    let iterator = PrefetchingIterator::spawn(dataset, fast_config(1)).unwrap();
    let learner = CountingLearner::new(Arc::clone(&iterator));
    let source = learner.variable_source();
    let policy: PolicyFn<Vec<f32>> = Box::new(|_params, _obs, rng| Action::Discrete(rng.u32(..2)));
    let base = GenericActor::new(policy, 11, source, None);
    let mut coordinator =
        LearningActor::new(base, learner, Arc::clone(&iterator), vec![table.clone()]);

    assert_eq!(coordinator.actor().snapshot_version(), 0);

    for i in 0..100 {
        table.try_insert(make_item(i)).unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || iterator.ready()));
    coordinator.update().unwrap();

    assert_eq!(coordinator.learner_steps(), 1);
    assert_eq!(coordinator.actor().snapshot_version(), 1);
    assert!(!coordinator.actor().stale());

    // A no-op update must not touch the snapshot.
    coordinator.update().unwrap();
    assert_eq!(coordinator.actor().snapshot_version(), 1);
}

// =============================================================================
// FATAL ERRORS
// =============================================================================

#[test]
fn test_learner_failure_aborts_update() {
    let table = make_gated_table();
    let iterator = PrefetchingIterator::spawn(ScriptedSource::new(5), fast_config(2)).unwrap();
    // Two sends complete only once the third fetch has started.
    assert!(wait_until(Duration::from_secs(2), || iterator.fetched() >= 3));

    let learner = CountingLearner::failing_after(Arc::clone(&iterator), 1);
    let mut coordinator = LearningActor::new(
        RecordingActor::default(),
        learner,
        Arc::clone(&iterator),
        vec![table],
    );

    let err = coordinator.update();
    assert!(matches!(err, Err(TrainingError::TrainingDiverged(_))));
    assert_eq!(coordinator.learner_steps(), 2);
    // The wrapped actor must not refresh on a failed update.
    assert_eq!(coordinator.actor().update_calls, 0);
}
