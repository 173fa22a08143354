//! Admission control between inserts and samples.
//!
//! The limiter tracks two monotone counters and admits operations so that the
//! sample/insert ratio stays near a configured target once the table holds
//! enough data:
//!
//! ```text
//!            diff = completed_inserts * samples_per_insert - completed_samples
//!
//!   sample blocked           allowed band              insert blocked
//! ──────────────────┃━━━━━━━━━━━━━━━━━━━━━━━━━━┃──────────────────────▶ diff
//!               min_diff                    max_diff
//!                      (spi * min_size ± error_buffer)
//! ```
//!
//! # Design
//!
//! The limiter is a pure state machine: `can_*` checks never mutate, and
//! `record_*` only bumps counters. All blocking lives in the table, which owns
//! the limiter behind its mutex so that check-then-record pairs are atomic
//! with the storage mutation they gate.
//!
//! Checks account for the operation they admit: an insert is admitted when the
//! diff *after* it stays at or below `max_diff` (with a free pass while the
//! table is still filling toward `min_size_to_sample`), and a batch sample is
//! admitted when the diff after removing `num` sample credits stays at or
//! above `min_diff`.

use serde::{Deserialize, Serialize};

use crate::error::TrainingError;

/// Point-in-time view of the limiter, exposed through table statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterInfo {
    /// Target number of samples per insert.
    pub samples_per_insert: f64,
    /// Inserts required before any sample is admitted.
    pub min_size_to_sample: u64,
    /// Lower edge of the allowed diff band.
    pub min_diff: f64,
    /// Upper edge of the allowed diff band.
    pub max_diff: f64,
    /// Total inserts recorded so far.
    pub completed_inserts: u64,
    /// Total sampled items recorded so far.
    pub completed_samples: u64,
}

/// Sample/insert ratio limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    samples_per_insert: f64,
    min_size_to_sample: u64,
    min_diff: f64,
    max_diff: f64,
    error_buffer: f64,
    completed_inserts: u64,
    completed_samples: u64,
}

impl RateLimiter {
    /// Limiter that keeps `completed_samples / completed_inserts` tracking
    /// `samples_per_insert` within `error_buffer`, once `min_size_to_sample`
    /// inserts have completed.
    ///
    /// Fails fast on windows narrow enough to wedge one side permanently.
    pub fn sample_to_insert_ratio(
        samples_per_insert: f64,
        min_size_to_sample: u64,
        error_buffer: f64,
    ) -> Result<Self, TrainingError> {
        if !samples_per_insert.is_finite() || samples_per_insert <= 0.0 {
            return Err(TrainingError::invalid_config(format!(
                "samples_per_insert ({}) must be > 0",
                samples_per_insert
            )));
        }
        if min_size_to_sample < 1 {
            return Err(TrainingError::invalid_config(
                "min_size_to_sample must be at least 1",
            ));
        }
        if error_buffer < samples_per_insert.max(1.0) {
            return Err(TrainingError::invalid_config(format!(
                "error_buffer ({}) must be >= max(1.0, samples_per_insert) or one side \
                 of the band can never move again",
                error_buffer
            )));
        }
        let offset = samples_per_insert * min_size_to_sample as f64;
        Ok(Self {
            samples_per_insert,
            min_size_to_sample,
            min_diff: offset - error_buffer,
            max_diff: offset + error_buffer,
            error_buffer,
            completed_inserts: 0,
            completed_samples: 0,
        })
    }

    /// Degenerate limiter that only enforces a minimum size before sampling.
    pub fn min_size(min_size_to_sample: u64) -> Result<Self, TrainingError> {
        if min_size_to_sample < 1 {
            return Err(TrainingError::invalid_config(
                "min_size_to_sample must be at least 1",
            ));
        }
        Ok(Self {
            samples_per_insert: 1.0,
            min_size_to_sample,
            min_diff: -f64::MAX,
            max_diff: f64::MAX,
            error_buffer: f64::MAX,
            completed_inserts: 0,
            completed_samples: 0,
        })
    }

    /// Error buffer for a given tolerance, expressed as a fraction of the
    /// steady-state offset `min_size_to_sample * samples_per_insert`.
    pub fn error_buffer_from_tolerance(
        samples_per_insert: f64,
        min_size_to_sample: u64,
        tolerance_rate: f64,
    ) -> f64 {
        min_size_to_sample as f64 * samples_per_insert * tolerance_rate
    }

    /// Copy of this limiter with the insert side unbounded.
    ///
    /// Required when producer and consumer share a thread: an insert that
    /// waits for sample progress on the thread that must perform the sample
    /// can never complete. Counters and the sample-side constraint carry over
    /// unchanged.
    pub fn without_insert_blocking(&self) -> Self {
        Self {
            max_diff: f64::MAX,
            ..self.clone()
        }
    }

    /// Whether `num` more inserts may proceed now.
    ///
    /// Inserts get a free pass while the table still fills toward
    /// `min_size_to_sample`; past that, the post-insert diff must stay at or
    /// below `max_diff`.
    pub fn can_insert(&self, num: usize) -> bool {
        let after = self.completed_inserts + num as u64;
        if after <= self.min_size_to_sample {
            return true;
        }
        after as f64 * self.samples_per_insert - self.completed_samples as f64 <= self.max_diff
    }

    /// Whether a batch of `num` sampled items may proceed now.
    pub fn can_sample(&self, num: usize) -> bool {
        if self.completed_inserts < self.min_size_to_sample {
            return false;
        }
        self.diff() - num as f64 >= self.min_diff
    }

    /// Record `num` completed inserts.
    pub fn record_insert(&mut self, num: usize) {
        self.completed_inserts += num as u64;
    }

    /// Record `num` sampled items.
    pub fn record_sample(&mut self, num: usize) {
        self.completed_samples += num as u64;
    }

    /// Current value of the tracked ratio expression.
    pub fn diff(&self) -> f64 {
        self.completed_inserts as f64 * self.samples_per_insert - self.completed_samples as f64
    }

    /// Inserts recorded so far.
    pub fn completed_inserts(&self) -> u64 {
        self.completed_inserts
    }

    /// Sampled items recorded so far.
    pub fn completed_samples(&self) -> u64 {
        self.completed_samples
    }

    /// Inserts required before sampling opens.
    pub fn min_size_to_sample(&self) -> u64 {
        self.min_size_to_sample
    }

    /// Configured tolerance width.
    pub fn error_buffer(&self) -> f64 {
        self.error_buffer
    }

    /// Snapshot of the full limiter state.
    pub fn info(&self) -> RateLimiterInfo {
        RateLimiterInfo {
            samples_per_insert: self.samples_per_insert,
            min_size_to_sample: self.min_size_to_sample,
            min_diff: self.min_diff,
            max_diff: self.max_diff,
            completed_inserts: self.completed_inserts,
            completed_samples: self.completed_samples,
        }
    }
}
