//! Error taxonomy for the training run.
//!
//! One enum covers the whole pipeline. The split that matters operationally:
//!
//! - `CapacityOrRateExceeded` / `InsufficientData` are recoverable. The
//!   coordinator absorbs them by re-checking availability; writers may retry
//!   or drop.
//! - `EndOfStream` / `TrainingDiverged` are fatal for the run. No retry.
//! - `InvalidConfig` is raised at wiring time, before any thread is spawned.
//! - `TableClosed` marks use of a table after `close()`; the dataset layer
//!   turns it into upstream exhaustion.

/// Errors produced by the replay, dataset and coordination layers.
#[derive(Debug)]
pub enum TrainingError {
    /// Insert rejected by the rate limiter or capacity policy.
    CapacityOrRateExceeded {
        /// Name of the rejecting table.
        table: String,
    },
    /// Sample rejected (or timed out) under non-blocking policy.
    InsufficientData {
        /// Name of the rejecting table.
        table: String,
        /// Batch size that was requested.
        requested: usize,
    },
    /// The batch iterator is exhausted and will never yield again.
    EndOfStream,
    /// The concrete learner detected non-finite parameters.
    TrainingDiverged(String),
    /// A precondition failed at configuration time.
    InvalidConfig(String),
    /// Operation on a table after `close()`.
    TableClosed {
        /// Name of the closed table.
        table: String,
    },
}

impl std::fmt::Display for TrainingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainingError::CapacityOrRateExceeded { table } => {
                write!(f, "insert rejected by table '{}'", table)
            }
            TrainingError::InsufficientData { table, requested } => {
                write!(
                    f,
                    "table '{}' cannot serve a batch of {} items",
                    table, requested
                )
            }
            TrainingError::EndOfStream => write!(f, "batch iterator exhausted"),
            TrainingError::TrainingDiverged(reason) => {
                write!(f, "training diverged: {}", reason)
            }
            TrainingError::InvalidConfig(reason) => {
                write!(f, "invalid configuration: {}", reason)
            }
            TrainingError::TableClosed { table } => {
                write!(f, "table '{}' is closed", table)
            }
        }
    }
}

impl std::error::Error for TrainingError {}

impl TrainingError {
    /// True for conditions the coordinator may absorb and re-check.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TrainingError::CapacityOrRateExceeded { .. }
                | TrainingError::InsufficientData { .. }
        )
    }

    /// Shorthand used by config validators.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        TrainingError::InvalidConfig(reason.into())
    }
}
