//! Learner-side contract.
//!
//! The crate does not ship a concrete learning algorithm; it coordinates one.
//! A learner owns its batch iterator, performs one optimization step per
//! `step()` call, and publishes parameter snapshots through a variable source
//! that actors pull from.

use std::sync::Arc;

use crate::core::variable_slot::{SharedVariableSource, VariableSnapshot};
use crate::error::TrainingError;

/// One optimization step at a time, driven by the coordinator.
pub trait Learner {
    /// Parameter payload published to actors.
    type Params;

    /// Consume one batch from the iterator and update parameters.
    ///
    /// Fails with `EndOfStream` when the iterator is exhausted, or
    /// `TrainingDiverged` when the concrete algorithm detects non-finite
    /// parameters. Both are fatal for the run.
    fn step(&mut self) -> Result<(), TrainingError>;

    /// Current parameter snapshot.
    fn get_variables(&self, names: &[&str]) -> Arc<VariableSnapshot<Self::Params>>;

    /// Shared handle actors use to pull snapshots without holding the learner.
    fn variable_source(&self) -> SharedVariableSource<Self::Params>;
}
