//! Single-process coupling of an actor and its learner.
//!
//! The environment loop sees one `Actor`; inside, every `update()` call runs
//! as many learner steps as the replay buffer can currently pay for, then
//! lets the wrapped actor refresh its parameters once. Acting and learning
//! interleave on one thread, so training progress depends only on data
//! availability, never on wall-clock races.
//!
//! Availability is a deliberate heuristic. The learner's true batch size is
//! opaque here, so it is estimated from the table's own accounting:
//! `ceil(completed_samples / learner_steps)` never undercounts (every
//! completed step consumed one full batch) and converges on the real batch
//! size as steps accumulate. Until the first step the estimate is a huge
//! sentinel, which makes the table-side check maximally conservative and
//! leaves the "a batch is already queued" signal as the only green light.

use crate::core::transition::{Action, Observation};
use crate::dataset::prefetch::SharedPrefetchingIterator;
use crate::environment::TimeStep;
use crate::error::TrainingError;
use crate::learner::Learner;
use crate::replay::table::SharedReplayTable;

use super::actor::Actor;

/// Estimated per-step batch size before any learner step has completed.
const BATCH_SIZE_SENTINEL: usize = 1_000_000_000;

/// Actor that trains its learner whenever replay data allows.
pub struct LearningActor<A, L, T, B> {
    actor: A,
    learner: L,
    iterator: SharedPrefetchingIterator<B>,
    tables: Vec<SharedReplayTable<T>>,
    batch_size_upper_bounds: Vec<usize>,
    learner_steps: u64,
}

impl<A, L, T, B> LearningActor<A, L, T, B>
where
    A: Actor,
    L: Learner,
    T: Clone,
{
    /// Couple `actor` and `learner` over the tables feeding `iterator`.
    pub fn new(
        actor: A,
        learner: L,
        iterator: SharedPrefetchingIterator<B>,
        tables: Vec<SharedReplayTable<T>>,
    ) -> Self {
        let batch_size_upper_bounds = vec![BATCH_SIZE_SENTINEL; tables.len()];
        Self {
            actor,
            learner,
            iterator,
            tables,
            batch_size_upper_bounds,
            learner_steps: 0,
        }
    }

    /// The wrapped acting component.
    pub fn actor(&self) -> &A {
        &self.actor
    }

    /// The wrapped learner.
    pub fn learner(&self) -> &L {
        &self.learner
    }

    /// Learner steps performed so far.
    pub fn learner_steps(&self) -> u64 {
        self.learner_steps
    }

    /// Current per-table batch size estimates.
    pub fn batch_size_upper_bounds(&self) -> &[usize] {
        &self.batch_size_upper_bounds
    }

    /// Whether a learner step can proceed without waiting on the actor.
    ///
    /// Order matters: the prefetched-batch check is exact and free, the
    /// table checks are the conservative fallback for batches not yet
    /// fetched.
    fn has_data_for_training(&self) -> bool {
        if self.iterator.ready() {
            return true;
        }
        self.tables
            .iter()
            .zip(&self.batch_size_upper_bounds)
            .all(|(table, &bound)| table.can_sample(bound))
    }
}

impl<A, L, T, B> Actor for LearningActor<A, L, T, B>
where
    A: Actor,
    L: Learner,
    T: Clone,
{
    fn select_action(&mut self, observation: &Observation) -> Action {
        self.actor.select_action(observation)
    }

    fn observe_first(&mut self, timestep: &TimeStep) -> Result<(), TrainingError> {
        self.actor.observe_first(timestep)
    }

    fn observe(
        &mut self,
        action: &Action,
        next_timestep: &TimeStep,
    ) -> Result<(), TrainingError> {
        self.actor.observe(action, next_timestep)
    }

    fn update(&mut self) -> Result<(), TrainingError> {
        let mut stepped = false;
        while self.has_data_for_training() {
            self.learner_steps += 1;
            for (bound, table) in self
                .batch_size_upper_bounds
                .iter_mut()
                .zip(self.tables.iter())
            {
                *bound = table.completed_samples().div_ceil(self.learner_steps) as usize;
            }
            self.learner.step()?;
            stepped = true;
        }
        // Only grab fresh parameters after the learner actually moved.
        if stepped {
            self.actor.update()?;
        }
        Ok(())
    }
}
