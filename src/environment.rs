//! Environment abstraction for the synchronous training loop.
//!
//! Environments are stepped one timestep at a time by the loop driver. Each
//! `TimeStep` carries the per-step discount alongside the reward so the adder
//! can distinguish a true terminal (discount 0, no bootstrapping) from a
//! truncation (episode cut short, value bootstrapping still valid).

use serde::{Deserialize, Serialize};

use crate::core::{Action, Observation};

/// Position of a timestep within an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// First step after a reset; carries no reward.
    First,
    /// Interior step.
    Mid,
    /// Final step of the episode.
    Last,
}

/// One environment timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStep {
    /// Where in the episode this step falls.
    pub kind: StepKind,
    /// Reward for the transition that produced this step (0.0 on First).
    pub reward: f32,
    /// Per-step discount: 0.0 on a terminal step, the environment's
    /// continuation discount otherwise.
    pub discount: f32,
    /// Observation after the transition.
    pub observation: Observation,
}

impl TimeStep {
    /// First step of a fresh episode.
    pub fn first(observation: Observation) -> Self {
        Self {
            kind: StepKind::First,
            reward: 0.0,
            discount: 1.0,
            observation,
        }
    }

    /// Interior step.
    pub fn mid(reward: f32, discount: f32, observation: Observation) -> Self {
        Self {
            kind: StepKind::Mid,
            reward,
            discount,
            observation,
        }
    }

    /// Terminal step: the episode truly ended, no value remains.
    pub fn termination(reward: f32, observation: Observation) -> Self {
        Self {
            kind: StepKind::Last,
            reward,
            discount: 0.0,
            observation,
        }
    }

    /// Truncated step: the episode was cut short but semantically continues,
    /// so the discount stays open for bootstrapping.
    pub fn truncation(reward: f32, discount: f32, observation: Observation) -> Self {
        Self {
            kind: StepKind::Last,
            reward,
            discount,
            observation,
        }
    }

    /// Whether this is the first step of an episode.
    pub fn is_first(&self) -> bool {
        matches!(self.kind, StepKind::First)
    }

    /// Whether this step ends the episode.
    pub fn is_last(&self) -> bool {
        matches!(self.kind, StepKind::Last)
    }
}

/// Action space description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionSpec {
    /// Discrete space with `num_actions` choices.
    Discrete {
        /// Number of distinct actions.
        num_actions: u32,
    },
    /// Box space of `dim` values in `[low, high]`.
    Continuous {
        /// Action vector length.
        dim: usize,
        /// Lower bound per component.
        low: f32,
        /// Upper bound per component.
        high: f32,
    },
}

/// Shapes the core needs to know about an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Observation vector length.
    pub observation_size: usize,
    /// Action space.
    pub actions: ActionSpec,
}

/// Declared layout of items a table stores.
///
/// Derived from the environment spec by the adder that will write the table;
/// used for wiring-time compatibility checks, not per-item validation of
/// opaque payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSignature {
    /// Observation vector length on both ends of a transition.
    pub observation_size: usize,
    /// Action space of the stored action.
    pub actions: ActionSpec,
}

impl ItemSignature {
    /// Signature for transitions drawn from `spec`.
    pub fn from_env_spec(spec: &EnvironmentSpec) -> Self {
        Self {
            observation_size: spec.observation_size,
            actions: spec.actions.clone(),
        }
    }
}

/// Single environment stepped by the loop driver.
pub trait Environment {
    /// Start a new episode.
    fn reset(&mut self) -> TimeStep;

    /// Apply an action; returns the resulting timestep.
    fn step(&mut self, action: &Action) -> TimeStep;

    /// Shape description for wiring tables and policies.
    fn spec(&self) -> EnvironmentSpec;
}
