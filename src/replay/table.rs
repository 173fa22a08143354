//! Bounded, rate-limited replay table.
//!
//! # Design
//!
//! One mutex owns storage, limiter and RNG together, so an admission check
//! and the mutation it admits are a single critical section. The ratio
//! invariant cannot be violated by interleaving between the writer (main
//! thread) and the sampler (prefetch thread):
//!
//! ```text
//! main thread                      prefetch thread
//! ─────────────                    ───────────────
//! insert(item) ──┐            ┌── sample_timeout(batch)
//!                ▼            ▼
//!         Mutex<TableState { items, limiter, rng }>
//!                │
//!                └─ size mirrored in an AtomicUsize for stat reads
//! ```
//!
//! Blocking variants poll on a short tick and bail out when the table is
//! closed; there is no wait that a stuck peer could hold forever.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::selectors::{RemoveStrategy, SampleStrategy};
use crate::core::rate_limiter::{RateLimiter, RateLimiterInfo};
use crate::environment::ItemSignature;
use crate::error::TrainingError;

/// Table name used when a config does not override it.
pub const DEFAULT_TABLE_NAME: &str = "replay";

/// Tick for the blocking poll loops.
const POLL_TICK: Duration = Duration::from_millis(1);

/// Replay table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayTableConfig {
    /// Table name, carried in errors and statistics.
    pub name: String,
    /// Capacity; inserting at capacity evicts per `remover` first.
    pub max_size: usize,
    /// Batch selection policy.
    pub sampler: SampleStrategy,
    /// Eviction policy.
    pub remover: RemoveStrategy,
    /// Declared item layout, checked by adders at wiring time.
    pub signature: Option<ItemSignature>,
    /// Seed for the selection RNG; random when absent.
    pub seed: Option<u64>,
}

impl Default for ReplayTableConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE_NAME.to_string(),
            max_size: 1_000_000,
            sampler: SampleStrategy::Uniform,
            remover: RemoveStrategy::Fifo,
            signature: None,
            seed: None,
        }
    }
}

impl ReplayTableConfig {
    /// New config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the capacity.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the selection policy.
    pub fn with_sampler(mut self, sampler: SampleStrategy) -> Self {
        self.sampler = sampler;
        self
    }

    /// Set the eviction policy.
    pub fn with_remover(mut self, remover: RemoveStrategy) -> Self {
        self.remover = remover;
        self
    }

    /// Declare the item layout.
    pub fn with_signature(mut self, signature: ItemSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Seed the selection RNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check invariants that must hold before a table is built.
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.name.is_empty() {
            return Err(TrainingError::invalid_config("table name must not be empty"));
        }
        if self.max_size == 0 {
            return Err(TrainingError::invalid_config(
                "table max_size must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Point-in-time table statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name.
    pub name: String,
    /// Items currently stored.
    pub size: usize,
    /// Capacity.
    pub max_size: usize,
    /// Limiter state.
    pub rate_limiter: RateLimiterInfo,
}

struct TableState<T> {
    items: VecDeque<T>,
    limiter: RateLimiter,
    rng: fastrand::Rng,
}

/// Bounded item store gated by a rate limiter.
///
/// Sampling is non-destructive: items leave only through eviction.
pub struct ReplayTable<T> {
    config: ReplayTableConfig,
    state: Mutex<TableState<T>>,
    /// Mirror of `items.len()` for lock-free reads.
    size: AtomicUsize,
    closed: AtomicBool,
}

/// Shared handle to a replay table.
pub type SharedReplayTable<T> = Arc<ReplayTable<T>>;

/// Create a shared replay table.
pub fn replay_table<T: Clone>(
    config: ReplayTableConfig,
    limiter: RateLimiter,
) -> Result<SharedReplayTable<T>, TrainingError> {
    Ok(Arc::new(ReplayTable::new(config, limiter)?))
}

impl<T: Clone> ReplayTable<T> {
    /// Build a table from a validated config and a limiter.
    pub fn new(config: ReplayTableConfig, limiter: RateLimiter) -> Result<Self, TrainingError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Ok(Self {
            state: Mutex::new(TableState {
                items: VecDeque::with_capacity(config.max_size.min(4096)),
                limiter,
                rng,
            }),
            size: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            config,
        })
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Declared item layout, if any.
    pub fn signature(&self) -> Option<&ItemSignature> {
        self.config.signature.as_ref()
    }

    /// Capacity.
    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    /// Items currently stored (lock-free).
    pub fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Whether the table holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Pure admission check for `num` inserts. Never mutates.
    pub fn can_insert(&self, num: usize) -> bool {
        !self.is_closed() && self.state.lock().limiter.can_insert(num)
    }

    /// Pure admission check for a batch of `num` samples. Never mutates.
    pub fn can_sample(&self, num: usize) -> bool {
        !self.is_closed() && self.state.lock().limiter.can_sample(num)
    }

    /// Insert without waiting; rejected inserts are the caller's problem.
    pub fn try_insert(&self, item: T) -> Result<(), TrainingError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        let mut state = self.state.lock();
        if !state.limiter.can_insert(1) {
            return Err(TrainingError::CapacityOrRateExceeded {
                table: self.config.name.clone(),
            });
        }
        self.insert_locked(&mut state, item);
        Ok(())
    }

    /// Insert, waiting for admission.
    ///
    /// Returns `TableClosed` if the table closes while waiting. With insert
    /// blocking disabled this never waits.
    pub fn insert(&self, item: T) -> Result<(), TrainingError> {
        let mut item = Some(item);
        loop {
            if self.is_closed() {
                return Err(self.closed_error());
            }
            {
                let mut state = self.state.lock();
                if state.limiter.can_insert(1) {
                    // item is always Some here; the loop only parks it between polls.
                    if let Some(item) = item.take() {
                        self.insert_locked(&mut state, item);
                    }
                    return Ok(());
                }
            }
            std::thread::sleep(POLL_TICK);
        }
    }

    /// Sample a batch without waiting.
    pub fn try_sample(&self, batch_size: usize) -> Result<Vec<T>, TrainingError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        let mut state = self.state.lock();
        if state.items.is_empty() || !state.limiter.can_sample(batch_size) {
            return Err(TrainingError::InsufficientData {
                table: self.config.name.clone(),
                requested: batch_size,
            });
        }
        Ok(self.sample_locked(&mut state, batch_size))
    }

    /// Sample a batch, waiting at most `timeout` for admission.
    pub fn sample_timeout(
        &self,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Vec<T>, TrainingError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_closed() {
                return Err(self.closed_error());
            }
            {
                let mut state = self.state.lock();
                if !state.items.is_empty() && state.limiter.can_sample(batch_size) {
                    return Ok(self.sample_locked(&mut state, batch_size));
                }
            }
            if Instant::now() >= deadline {
                return Err(TrainingError::InsufficientData {
                    table: self.config.name.clone(),
                    requested: batch_size,
                });
            }
            std::thread::sleep(POLL_TICK);
        }
    }

    /// Sample a batch, waiting for admission.
    ///
    /// Returns `TableClosed` if the table closes while waiting. Must only run
    /// on a thread that is not also responsible for inserts.
    pub fn sample(&self, batch_size: usize) -> Result<Vec<T>, TrainingError> {
        loop {
            match self.sample_timeout(batch_size, Duration::from_millis(100)) {
                Err(TrainingError::InsufficientData { .. }) => continue,
                other => return other,
            }
        }
    }

    /// Swap the limiter for a copy that admits every insert.
    ///
    /// Required before running producer and consumer on one thread; the
    /// sample-side constraint and the completed counters are preserved.
    pub fn disable_insert_blocking(&self) {
        let mut state = self.state.lock();
        state.limiter = state.limiter.without_insert_blocking();
    }

    /// Close the table: blocked and future blocking calls return
    /// `TableClosed`; pure checks return false.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Statistics snapshot.
    pub fn info(&self) -> TableInfo {
        let state = self.state.lock();
        TableInfo {
            name: self.config.name.clone(),
            size: state.items.len(),
            max_size: self.config.max_size,
            rate_limiter: state.limiter.info(),
        }
    }

    /// Total sampled items, as counted by the limiter.
    pub fn completed_samples(&self) -> u64 {
        self.state.lock().limiter.completed_samples()
    }

    fn insert_locked(&self, state: &mut TableState<T>, item: T) {
        if state.items.len() >= self.config.max_size {
            let victim = self
                .config
                .remover
                .victim(state.items.len(), &mut state.rng);
            state.items.remove(victim);
        }
        state.items.push_back(item);
        state.limiter.record_insert(1);
        self.size.store(state.items.len(), Ordering::Relaxed);
    }

    fn sample_locked(&self, state: &mut TableState<T>, batch_size: usize) -> Vec<T> {
        let len = state.items.len();
        let positions = self.config.sampler.pick(len, batch_size, &mut state.rng);
        let batch = positions
            .into_iter()
            .map(|idx| state.items[idx].clone())
            .collect();
        state.limiter.record_sample(batch_size);
        batch
    }

    fn closed_error(&self) -> TrainingError {
        TrainingError::TableClosed {
            table: self.config.name.clone(),
        }
    }
}
