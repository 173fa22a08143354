//! Batch sources the prefetcher pulls from.

use std::time::Duration;

use crate::error::TrainingError;
use crate::replay::table::SharedReplayTable;

/// Outcome of one bounded fetch attempt.
#[derive(Debug)]
pub enum Fetch<B> {
    /// A batch was produced.
    Ready(B),
    /// Nothing admissible within the timeout; try again.
    Pending,
    /// The source will never produce again.
    Exhausted,
}

/// Upstream of the prefetch thread.
///
/// `fetch_timeout` must return within roughly the given timeout so the
/// prefetch thread can observe its stop flag between attempts.
pub trait BatchSource: Send {
    /// Batch type delivered downstream.
    type Batch: Send;

    /// Attempt to produce one batch, waiting at most `timeout`.
    fn fetch_timeout(&mut self, timeout: Duration) -> Fetch<Self::Batch>;
}

/// Fixed-size batch view over one replay table.
///
/// Each fetch blocks on the table's sample admission; a closed table turns
/// into permanent exhaustion, which the prefetcher surfaces as end of stream.
pub struct ReplayDataset<T> {
    table: SharedReplayTable<T>,
    batch_size: usize,
}

impl<T: Clone + Send> ReplayDataset<T> {
    /// Dataset drawing batches of `batch_size` from `table`.
    pub fn new(table: SharedReplayTable<T>, batch_size: usize) -> Result<Self, TrainingError> {
        if batch_size == 0 {
            return Err(TrainingError::invalid_config(
                "dataset batch_size must be at least 1",
            ));
        }
        Ok(Self { table, batch_size })
    }

    /// Configured batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The table this dataset reads.
    pub fn table(&self) -> &SharedReplayTable<T> {
        &self.table
    }
}

impl<T: Clone + Send> BatchSource for ReplayDataset<T> {
    type Batch = Vec<T>;

    fn fetch_timeout(&mut self, timeout: Duration) -> Fetch<Vec<T>> {
        match self.table.sample_timeout(self.batch_size, timeout) {
            Ok(batch) => Fetch::Ready(batch),
            Err(TrainingError::InsufficientData { .. }) => Fetch::Pending,
            // TableClosed, or anything else terminal.
            Err(_) => Fetch::Exhausted,
        }
    }
}
