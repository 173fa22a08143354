//! Transition assembly from raw environment steps.
//!
//! The adder sits between the actor and the table. It receives one timestep at
//! a time and maintains a trailing window of up to `n` steps; every time the
//! window is full it writes one discounted n-step transition and slides:
//!
//! ```text
//! steps:      s0   s1   s2   s3   s4(terminal)          n = 3
//!             └────┬────┘
//!            item(s0..s2)                 full window
//!                  └────┬────┘
//!                 item(s1..s3)            full window
//!                       └────┬────┘
//!                      item(s2..s4)       full window
//!                            └───┬───┘
//!                          item(s3..s4)   flushed, shrinking
//!                                └─┬─┘
//!                             item(s4)    flushed, shrinking
//! ```
//!
//! An episode of length `L >= n` therefore produces `L - n + 1` full items and
//! `n - 1` boundary-flushed partials; a shorter episode produces `L` partials.
//! Either way every step starts exactly one stored item.
//!
//! Reward and discount for a window of `k` steps starting at `(o_t, a_t)`:
//!
//! ```text
//! reward   = sum_{i<k} (prod_{j<i} gamma * d_{t+j}) * r_{t+i}
//! discount = prod_{i<k} gamma * d_{t+i}
//! ```
//!
//! where `gamma` is the adder's configured discount and `d` the per-step
//! environment discount (0 at a true terminal, so windows crossing a terminal
//! carry `discount == 0` and cannot bootstrap).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::table::SharedReplayTable;
use crate::core::{Action, Observation, Transition};
use crate::environment::{ActionSpec, EnvironmentSpec, ItemSignature, TimeStep};
use crate::error::TrainingError;

/// Anything that turns observed environment steps into stored items.
pub trait Adder: Send {
    /// Begin a new episode at `timestep` (must be a First step).
    fn add_first(&mut self, timestep: &TimeStep) -> Result<(), TrainingError>;

    /// Ingest one transition: the action taken and the timestep it produced.
    fn add(&mut self, action: &Action, next_timestep: &TimeStep) -> Result<(), TrainingError>;

    /// Discard any partially accumulated state.
    fn reset(&mut self);
}

/// N-step adder configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NStepAdderConfig {
    /// Window length; 1 yields plain one-step transitions.
    pub n_step: usize,
    /// Discount applied per step on top of the environment's own discount.
    pub discount: f32,
}

impl Default for NStepAdderConfig {
    fn default() -> Self {
        Self {
            n_step: 5,
            discount: 0.99,
        }
    }
}

impl NStepAdderConfig {
    /// New config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window length.
    pub fn with_n_step(mut self, n_step: usize) -> Self {
        self.n_step = n_step;
        self
    }

    /// Set the per-step discount.
    pub fn with_discount(mut self, discount: f32) -> Self {
        self.discount = discount;
        self
    }

    /// Check invariants that must hold before an adder is built.
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.n_step < 1 {
            return Err(TrainingError::invalid_config("n_step must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return Err(TrainingError::invalid_config(format!(
                "discount ({}) must be in [0, 1]",
                self.discount
            )));
        }
        Ok(())
    }
}

/// One step waiting in the trailing window.
struct WindowStep {
    observation: Observation,
    action: Action,
    reward: f32,
    discount: f32,
}

/// Assembles discounted n-step transitions and inserts them into one table.
pub struct NStepAdder {
    table: SharedReplayTable<Transition>,
    config: NStepAdderConfig,
    signature: Option<ItemSignature>,
    window: VecDeque<WindowStep>,
    /// Observation after the most recently added step; None outside episodes.
    latest_observation: Option<Observation>,
}

impl NStepAdder {
    /// Build an adder writing to `table`, adopting the table's declared
    /// signature for step validation (if one was declared).
    pub fn new(
        table: SharedReplayTable<Transition>,
        config: NStepAdderConfig,
    ) -> Result<Self, TrainingError> {
        config.validate()?;
        let signature = table.signature().cloned();
        Ok(Self {
            table,
            config,
            signature,
            window: VecDeque::new(),
            latest_observation: None,
        })
    }

    /// Build an adder that validates steps against `signature`.
    ///
    /// Fails fast when the table declares a conflicting signature.
    pub fn with_signature(
        table: SharedReplayTable<Transition>,
        config: NStepAdderConfig,
        signature: ItemSignature,
    ) -> Result<Self, TrainingError> {
        config.validate()?;
        if let Some(declared) = table.signature() {
            if declared != &signature {
                return Err(TrainingError::invalid_config(format!(
                    "table '{}' declares a different item signature than the adder",
                    table.name()
                )));
            }
        }
        Ok(Self {
            table,
            config,
            signature: Some(signature),
            window: VecDeque::new(),
            latest_observation: None,
        })
    }

    /// Signature of the items this adder would produce for `env_spec`.
    ///
    /// Tables fed by an n-step adder should declare this.
    pub fn signature(env_spec: &EnvironmentSpec) -> ItemSignature {
        ItemSignature::from_env_spec(env_spec)
    }

    /// Configured window length.
    pub fn n_step(&self) -> usize {
        self.config.n_step
    }

    /// Steps currently buffered in the window.
    pub fn pending(&self) -> usize {
        self.window.len()
    }

    fn check_observation(&self, observation: &Observation) -> Result<(), TrainingError> {
        if let Some(signature) = &self.signature {
            if observation.len() != signature.observation_size {
                return Err(TrainingError::invalid_config(format!(
                    "observation length {} does not match signature length {}",
                    observation.len(),
                    signature.observation_size
                )));
            }
        }
        Ok(())
    }

    fn check_action(&self, action: &Action) -> Result<(), TrainingError> {
        let Some(signature) = &self.signature else {
            return Ok(());
        };
        match (&signature.actions, action) {
            (ActionSpec::Discrete { .. }, Action::Discrete(_)) => Ok(()),
            (ActionSpec::Continuous { dim, .. }, Action::Continuous(values)) => {
                if values.len() != *dim {
                    return Err(TrainingError::invalid_config(format!(
                        "continuous action length {} does not match signature dim {}",
                        values.len(),
                        dim
                    )));
                }
                Ok(())
            }
            _ => Err(TrainingError::invalid_config(
                "action kind does not match the declared signature",
            )),
        }
    }

    /// Transition covering the whole current window, bootstrapping past
    /// `next_observation`.
    fn assemble(&self, next_observation: &Observation) -> Transition {
        let mut reward = 0.0f32;
        let mut total_discount = 1.0f32;
        for step in &self.window {
            reward += total_discount * step.reward;
            total_discount *= self.config.discount * step.discount;
        }
        // The window is never empty when assembling.
        let first = &self.window[0];
        Transition {
            observation: first.observation.clone(),
            action: first.action.clone(),
            reward,
            discount: total_discount,
            next_observation: next_observation.clone(),
        }
    }

    fn emit(&mut self, next_observation: &Observation) -> Result<(), TrainingError> {
        let item = self.assemble(next_observation);
        self.table.insert(item)
    }
}

impl Adder for NStepAdder {
    /// Begins a new episode. Any partially accumulated window from an episode
    /// that was abandoned mid-run is discarded.
    fn add_first(&mut self, timestep: &TimeStep) -> Result<(), TrainingError> {
        if !timestep.is_first() {
            return Err(TrainingError::invalid_config(
                "add_first requires a First timestep",
            ));
        }
        self.check_observation(&timestep.observation)?;
        self.window.clear();
        self.latest_observation = Some(timestep.observation.clone());
        Ok(())
    }

    fn add(&mut self, action: &Action, next_timestep: &TimeStep) -> Result<(), TrainingError> {
        if next_timestep.is_first() {
            return Err(TrainingError::invalid_config(
                "add expects a Mid or Last timestep; got First",
            ));
        }
        self.check_observation(&next_timestep.observation)?;
        self.check_action(action)?;
        // Validation first: a rejected step must not consume episode state.
        let Some(previous) = self.latest_observation.take() else {
            return Err(TrainingError::invalid_config(
                "add called before add_first",
            ));
        };

        self.window.push_back(WindowStep {
            observation: previous,
            action: action.clone(),
            reward: next_timestep.reward,
            discount: next_timestep.discount,
        });

        if self.window.len() == self.config.n_step {
            self.emit(&next_timestep.observation)?;
            self.window.pop_front();
        }

        if next_timestep.is_last() {
            // Flush shrinking windows so every step of the episode heads an item.
            while !self.window.is_empty() {
                self.emit(&next_timestep.observation)?;
                self.window.pop_front();
            }
            self.latest_observation = None;
        } else {
            self.latest_observation = Some(next_timestep.observation.clone());
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.window.clear();
        self.latest_observation = None;
    }
}
