//! Batch delivery from replay storage to the learner.
//!
//! [`replay_dataset::ReplayDataset`] turns a table into a stream of
//! fixed-size batches; [`prefetch::PrefetchingIterator`] moves the blocking
//! part of that onto a background thread and exposes the lock-free `ready()`
//! signal the coordination layer keys off.

pub mod prefetch;
pub mod replay_dataset;

#[cfg(test)]
mod tests;

pub use prefetch::{PrefetchConfig, PrefetchingIterator, SharedPrefetchingIterator};
pub use replay_dataset::{BatchSource, Fetch, ReplayDataset};
