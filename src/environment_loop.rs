//! Driver connecting an environment to an actor, one step at a time.
//!
//! Each loop iteration selects an action, steps the environment, feeds the
//! result back to the actor, and gives the actor one `update()` opportunity.
//! Episode metrics go to the loop's logger; step and episode totals go to its
//! counter, so a parent counter sees every loop's progress under its label.

use std::time::Instant;

use crate::actors::Actor;
use crate::environment::Environment;
use crate::error::TrainingError;
use crate::metrics::{LoopSnapshot, SharedCounter, TrainingLogger};

/// Outcome of one episode.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeResult {
    /// Environment steps taken.
    pub steps: u64,
    /// Undiscounted return.
    pub episode_return: f32,
}

/// Runs an actor against an environment for whole episodes.
pub struct EnvironmentLoop<E, A> {
    environment: E,
    actor: A,
    counter: SharedCounter,
    logger: Box<dyn TrainingLogger>,
    label: String,
}

impl<E: Environment, A: Actor> EnvironmentLoop<E, A> {
    pub fn new(
        environment: E,
        actor: A,
        counter: SharedCounter,
        logger: Box<dyn TrainingLogger>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            environment,
            actor,
            counter,
            logger,
            label: label.into(),
        }
    }

    /// Run one full episode and report its metrics.
    pub fn run_episode(&mut self) -> Result<EpisodeResult, TrainingError> {
        let start = Instant::now();
        let mut steps: u64 = 0;
        let mut episode_return: f32 = 0.0;

        let mut timestep = self.environment.reset();
        self.actor.observe_first(&timestep)?;

        while !timestep.is_last() {
            let action = self.actor.select_action(&timestep.observation);
            timestep = self.environment.step(&action);
            self.actor.observe(&action, &timestep)?;
            self.actor.update()?;
            steps += 1;
            episode_return += timestep.reward;
        }

        let episode = self.counter.increment("episodes", 1);
        let total_steps = self.counter.increment("steps", steps);
        let snapshot = LoopSnapshot::new(&self.label, episode, steps, episode_return)
            .with_rate(safe_steps_per_second(steps, start.elapsed().as_secs_f32()))
            .with_totals(episode, total_steps);
        self.logger.log(&snapshot);

        Ok(EpisodeResult {
            steps,
            episode_return,
        })
    }

    /// Run whole episodes until at least `num_steps` environment steps have
    /// been taken; returns the number actually taken.
    pub fn run_steps(&mut self, num_steps: u64) -> Result<u64, TrainingError> {
        let mut taken = 0;
        while taken < num_steps {
            taken += self.run_episode()?.steps;
        }
        Ok(taken)
    }

    /// Run exactly `num_episodes` episodes.
    pub fn run_episodes(&mut self, num_episodes: u64) -> Result<(), TrainingError> {
        for _ in 0..num_episodes {
            self.run_episode()?;
        }
        Ok(())
    }

    /// The wrapped actor.
    pub fn actor(&self) -> &A {
        &self.actor
    }

    /// This loop's counter.
    pub fn counter(&self) -> &SharedCounter {
        &self.counter
    }
}

fn safe_steps_per_second(steps: u64, elapsed_secs: f32) -> f32 {
    if elapsed_secs > 0.0 {
        steps as f32 / elapsed_secs
    } else {
        0.0
    }
}
