//! Synchronous actor driven by the environment loop.
//!
//! The loop owns the actor and calls it once per environment step:
//! `select_action`, then `observe` with the step the action produced, then
//! `update`. Nothing here spawns threads; experience leaves through the
//! adder and parameters arrive through the variable client.

use crate::core::transition::{Action, Observation};
use crate::core::variable_slot::{SharedVariableSource, VariableClient};
use crate::environment::TimeStep;
use crate::error::TrainingError;
use crate::replay::adder::Adder;

/// Per-step contract between the environment loop and an agent.
pub trait Actor {
    /// Pick an action for `observation`.
    fn select_action(&mut self, observation: &Observation) -> Action;

    /// Record the first timestep of an episode.
    fn observe_first(&mut self, timestep: &TimeStep) -> Result<(), TrainingError>;

    /// Record one transition: the action taken and the timestep it produced.
    fn observe(&mut self, action: &Action, next_timestep: &TimeStep)
        -> Result<(), TrainingError>;

    /// Housekeeping after a step; typically refreshes parameters.
    fn update(&mut self) -> Result<(), TrainingError>;
}

/// Policy closure: parameters, observation and an owned RNG in, action out.
pub type PolicyFn<P> = Box<dyn FnMut(&P, &Observation, &mut fastrand::Rng) -> Action + Send>;

/// Actor built from a policy closure.
///
/// Training actors carry an adder; evaluation actors pass `None` and only
/// act. Exploration noise belongs inside the policy closure, fed by the
/// actor's seeded RNG.
pub struct GenericActor<P> {
    policy: PolicyFn<P>,
    rng: fastrand::Rng,
    variable_client: VariableClient<P>,
    adder: Option<Box<dyn Adder>>,
    steps: u64,
}

impl<P> GenericActor<P> {
    /// Variable names a generic actor pulls.
    const VARIABLE_NAMES: [&'static str; 1] = ["policy"];

    pub fn new(
        policy: PolicyFn<P>,
        seed: u64,
        variable_source: SharedVariableSource<P>,
        adder: Option<Box<dyn Adder>>,
    ) -> Self {
        Self {
            policy,
            rng: fastrand::Rng::with_seed(seed),
            variable_client: VariableClient::new(variable_source, &Self::VARIABLE_NAMES),
            adder,
            steps: 0,
        }
    }

    /// Version of the parameter snapshot currently acted with.
    pub fn snapshot_version(&self) -> u64 {
        self.variable_client.version()
    }

    /// Whether the source has published past the held snapshot.
    pub fn stale(&self) -> bool {
        self.variable_client.stale()
    }

    /// Actions selected so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl<P> Actor for GenericActor<P> {
    fn select_action(&mut self, observation: &Observation) -> Action {
        self.steps += 1;
        (self.policy)(self.variable_client.params(), observation, &mut self.rng)
    }

    fn observe_first(&mut self, timestep: &TimeStep) -> Result<(), TrainingError> {
        match self.adder.as_mut() {
            Some(adder) => adder.add_first(timestep),
            None => Ok(()),
        }
    }

    fn observe(
        &mut self,
        action: &Action,
        next_timestep: &TimeStep,
    ) -> Result<(), TrainingError> {
        match self.adder.as_mut() {
            Some(adder) => adder.add(action, next_timestep),
            None => Ok(()),
        }
    }

    fn update(&mut self) -> Result<(), TrainingError> {
        self.variable_client.pull();
        Ok(())
    }
}
