//! Copy-on-publish parameter distribution.
//!
//! The learner never hands actors a live reference to its parameters. After
//! each step it publishes an immutable, versioned snapshot into a slot; actors
//! pull whole snapshots on their own schedule and keep the `Arc` they pulled
//! until the next refresh.
//!
//! ```text
//! Learner                                Actor
//! ┌──────────────────┐                   ┌──────────────────┐
//! │ step()           │                   │ select_action()  │
//! │   ↓              │                   │       ↑          │
//! │ publish(params) ─┼──▶ VariableSlot ──┼─▶ client.pull()  │
//! └──────────────────┘   (Arc swap +     └──────────────────┘
//!                         version)
//! ```
//!
//! Readers either see the old snapshot or the new one, never a mix; the write
//! is a single pointer swap under the lock.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Versioned, immutable copy of learner parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSnapshot<P> {
    /// The parameter payload. Opaque to the coordination layer.
    pub params: P,
    /// Publication version; strictly increases with each publish.
    pub version: u64,
}

/// Anything actors can pull parameter snapshots from.
///
/// `names` selects named collections for sources that hold several; sources
/// holding a single parameter set return it regardless of names.
pub trait VariableSource<P>: Send + Sync {
    /// Current snapshot. Consistent, possibly slightly stale.
    fn get_variables(&self, names: &[&str]) -> Arc<VariableSnapshot<P>>;

    /// Version of the snapshot `get_variables` would return now.
    fn version(&self) -> u64;
}

/// Shared handle to a variable source.
pub type SharedVariableSource<P> = Arc<dyn VariableSource<P>>;

/// Single-slot container the learner publishes snapshots into.
///
/// # Thread Safety
///
/// Publication swaps one `Arc` under a write lock and bumps the version
/// inside the same critical section, so `version()` never runs ahead of the
/// snapshot a reader can observe.
pub struct VariableSlot<P> {
    current: RwLock<Arc<VariableSnapshot<P>>>,
    version: AtomicU64,
    /// Counter for snapshots published
    published_count: AtomicUsize,
    /// Counter for snapshots pulled by readers
    pulled_count: AtomicUsize,
}

impl<P> VariableSlot<P> {
    /// Create a slot holding the initial parameters at version 0.
    pub fn new(initial: P) -> Self {
        Self {
            current: RwLock::new(Arc::new(VariableSnapshot {
                params: initial,
                version: 0,
            })),
            version: AtomicU64::new(0),
            published_count: AtomicUsize::new(0),
            pulled_count: AtomicUsize::new(0),
        }
    }

    /// Publish new parameters, replacing the current snapshot wholesale.
    ///
    /// Returns the new version.
    pub fn publish(&self, params: P) -> u64 {
        let mut guard = self.current.write();
        let next = guard.version + 1;
        *guard = Arc::new(VariableSnapshot {
            params,
            version: next,
        });
        self.version.store(next, Ordering::Release);
        self.published_count.fetch_add(1, Ordering::Relaxed);
        next
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<VariableSnapshot<P>> {
        self.pulled_count.fetch_add(1, Ordering::Relaxed);
        Arc::clone(&self.current.read())
    }

    /// Version of the current snapshot.
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Debug statistics: (published, pulled).
    pub fn stats(&self) -> (usize, usize) {
        (
            self.published_count.load(Ordering::Relaxed),
            self.pulled_count.load(Ordering::Relaxed),
        )
    }
}

impl<P: Send + Sync> VariableSource<P> for VariableSlot<P> {
    fn get_variables(&self, _names: &[&str]) -> Arc<VariableSnapshot<P>> {
        self.snapshot()
    }

    fn version(&self) -> u64 {
        self.current_version()
    }
}

/// Shared variable slot.
pub type SharedVariableSlot<P> = Arc<VariableSlot<P>>;

/// Create a shared variable slot seeded with `initial`.
pub fn variable_slot<P>(initial: P) -> SharedVariableSlot<P> {
    Arc::new(VariableSlot::new(initial))
}

/// Pull-based client actors own.
///
/// Holds the most recently pulled snapshot; `pull()` replaces it wholesale
/// (last-writer-wins, single writer on the slot side).
pub struct VariableClient<P> {
    source: SharedVariableSource<P>,
    names: Vec<String>,
    current: Arc<VariableSnapshot<P>>,
}

impl<P> VariableClient<P> {
    /// Create a client and perform the initial pull.
    pub fn new(source: SharedVariableSource<P>, names: &[&str]) -> Self {
        let current = source.get_variables(names);
        Self {
            source,
            names: names.iter().map(|s| s.to_string()).collect(),
            current,
        }
    }

    /// Replace the held snapshot with the source's current one.
    pub fn pull(&mut self) {
        let names: Vec<&str> = self.names.iter().map(|s| s.as_str()).collect();
        self.current = self.source.get_variables(&names);
    }

    /// Parameters of the held snapshot.
    pub fn params(&self) -> &P {
        &self.current.params
    }

    /// Version of the held snapshot.
    pub fn version(&self) -> u64 {
        self.current.version
    }

    /// Whether the source has published past the held snapshot.
    pub fn stale(&self) -> bool {
        self.source.version() > self.current.version
    }
}
