//! Background prefetching over a batch source.
//!
//! One named thread owns the source and keeps a bounded queue of batches warm
//! so the learner's `next()` usually returns without touching the table:
//!
//! ```text
//!                    fetch thread                         caller
//!              ┌──────────────────────┐           ┌─────────────────────┐
//! BatchSource ─┤ fetch_timeout(tick)  ├─ bounded ─┤ ready()  (lock-free)│
//!              │ stop flag checked    │  channel  │ next()   (blocking) │
//!              │ between attempts     │           └─────────────────────┘
//!              └──────────────────────┘
//! ```
//!
//! `ready()` doubles as the coordinator's cheap "a batch is already paid for"
//! signal; it must never take a lock. When the source reports exhaustion the
//! thread exits and drops its sender, so callers drain whatever is queued and
//! then see `EndOfStream` forever after.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use super::replay_dataset::{BatchSource, Fetch};
use crate::error::TrainingError;

/// Tick for parking a fetched batch while the queue is full.
const SEND_TICK: Duration = Duration::from_millis(10);

/// Prefetcher configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrefetchConfig {
    /// Queue capacity in batches. 1 keeps the coordinator's data-availability
    /// heuristic tight; larger values trade accuracy for fetch latency.
    pub buffer_size: usize,
    /// Upper bound on one fetch attempt, and therefore on stop latency.
    pub fetch_timeout: Duration,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1,
            fetch_timeout: Duration::from_millis(100),
        }
    }
}

impl PrefetchConfig {
    /// New config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue capacity.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the per-attempt fetch timeout.
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Check invariants that must hold before the thread spawns.
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.buffer_size == 0 {
            return Err(TrainingError::invalid_config(
                "prefetch buffer_size must be at least 1",
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(TrainingError::invalid_config(
                "prefetch fetch_timeout must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Handle to a background fetch thread and its queue.
///
/// Shared between the learner (which consumes via `next()`) and the
/// coordinator (which only asks `ready()`). Dropping the last handle stops
/// and joins the thread.
pub struct PrefetchingIterator<B> {
    receiver: Receiver<B>,
    stop: Arc<AtomicBool>,
    exhausted: AtomicBool,
    fetched: Arc<AtomicUsize>,
    thread: Option<JoinHandle<()>>,
}

/// Shared handle to a prefetching iterator.
pub type SharedPrefetchingIterator<B> = Arc<PrefetchingIterator<B>>;

impl<B: Send + 'static> PrefetchingIterator<B> {
    /// Spawn the fetch thread over `source`.
    pub fn spawn<S>(
        source: S,
        config: PrefetchConfig,
    ) -> Result<SharedPrefetchingIterator<B>, TrainingError>
    where
        S: BatchSource<Batch = B> + 'static,
    {
        config.validate()?;
        let (sender, receiver) = crossbeam_channel::bounded(config.buffer_size);
        let stop = Arc::new(AtomicBool::new(false));
        let fetched = Arc::new(AtomicUsize::new(0));

        let thread = {
            let stop = Arc::clone(&stop);
            let fetched = Arc::clone(&fetched);
            std::thread::Builder::new()
                .name("replay-prefetch".to_string())
                .spawn(move || fetch_loop(source, sender, stop, fetched, config.fetch_timeout))
                .expect("Failed to spawn prefetch thread")
        };

        Ok(Arc::new(Self {
            receiver,
            stop,
            exhausted: AtomicBool::new(false),
            fetched,
            thread: Some(thread),
        }))
    }
}

impl<B> PrefetchingIterator<B> {
    /// Whether a batch is queued right now. Lock-free; false once the queue
    /// has drained after exhaustion.
    pub fn ready(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Take the next batch, blocking until one is queued.
    ///
    /// Once the source is exhausted, remaining queued batches are still
    /// delivered; after that every call fails with `EndOfStream`.
    pub fn next(&self) -> Result<B, TrainingError> {
        match self.receiver.recv() {
            Ok(batch) => Ok(batch),
            Err(_) => {
                self.exhausted.store(true, Ordering::Release);
                Err(TrainingError::EndOfStream)
            }
        }
    }

    /// Whether `next()` has already reported `EndOfStream`.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    /// Batches fetched from the source so far (queued or delivered).
    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::Relaxed)
    }
}

impl<B> Drop for PrefetchingIterator<B> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn fetch_loop<S: BatchSource>(
    mut source: S,
    sender: Sender<S::Batch>,
    stop: Arc<AtomicBool>,
    fetched: Arc<AtomicUsize>,
    fetch_timeout: Duration,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        match source.fetch_timeout(fetch_timeout) {
            Fetch::Ready(batch) => {
                fetched.fetch_add(1, Ordering::Relaxed);
                let mut pending = Some(batch);
                while let Some(batch) = pending.take() {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    match sender.send_timeout(batch, SEND_TICK) {
                        Ok(()) => {}
                        Err(SendTimeoutError::Timeout(batch)) => pending = Some(batch),
                        // Receiver gone; nothing left to feed.
                        Err(SendTimeoutError::Disconnected(_)) => return,
                    }
                }
            }
            Fetch::Pending => continue,
            // Dropping the sender is the end-of-stream signal.
            Fetch::Exhausted => return,
        }
    }
}
