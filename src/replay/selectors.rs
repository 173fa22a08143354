//! Selection and eviction policies for the replay table.
//!
//! Positions index the table's insertion-ordered storage: position 0 is the
//! oldest surviving item. Policies are pure position pickers; the table owns
//! the storage and the RNG.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Above this size, distinct uniform draws use rejection sampling instead of
/// a partial shuffle over the whole index range.
const SHUFFLE_CUTOFF: usize = 2048;

/// How a sample batch picks stored positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleStrategy {
    /// Uniform over the stored items; distinct positions within one batch
    /// whenever the table holds at least `batch` items.
    Uniform,
    /// Oldest items first.
    Fifo,
    /// Newest items first.
    Lifo,
}

/// Which item leaves when the table is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveStrategy {
    /// Evict the oldest item.
    Fifo,
    /// Evict the newest item.
    Lifo,
    /// Evict a uniformly chosen item.
    Uniform,
}

impl SampleStrategy {
    /// Pick `batch` positions in `[0, len)`. `len` must be non-zero.
    ///
    /// When `batch > len` the batch is filled with repeats (uniform draws
    /// with replacement, or cyclic repeats for the ordered strategies).
    pub(crate) fn pick(&self, len: usize, batch: usize, rng: &mut fastrand::Rng) -> Vec<usize> {
        debug_assert!(len > 0, "pick on empty storage");
        match self {
            SampleStrategy::Uniform => {
                if batch > len {
                    return (0..batch).map(|_| rng.usize(..len)).collect();
                }
                if len <= SHUFFLE_CUTOFF {
                    // Partial Fisher-Yates: first `batch` slots end up distinct.
                    let mut indices: Vec<usize> = (0..len).collect();
                    for i in 0..batch {
                        let j = rng.usize(i..len);
                        indices.swap(i, j);
                    }
                    indices.truncate(batch);
                    indices
                } else {
                    let mut seen = HashSet::with_capacity(batch);
                    let mut picked = Vec::with_capacity(batch);
                    while picked.len() < batch {
                        let idx = rng.usize(..len);
                        if seen.insert(idx) {
                            picked.push(idx);
                        }
                    }
                    picked
                }
            }
            SampleStrategy::Fifo => (0..batch).map(|i| i % len).collect(),
            SampleStrategy::Lifo => (0..batch).map(|i| len - 1 - (i % len)).collect(),
        }
    }
}

impl RemoveStrategy {
    /// Position of the item to evict from storage of `len` items.
    pub(crate) fn victim(&self, len: usize, rng: &mut fastrand::Rng) -> usize {
        debug_assert!(len > 0, "victim on empty storage");
        match self {
            RemoveStrategy::Fifo => 0,
            RemoveStrategy::Lifo => len - 1,
            RemoveStrategy::Uniform => rng.usize(..len),
        }
    }
}
