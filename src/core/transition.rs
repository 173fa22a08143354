//! Item types stored in the replay table.
//!
//! The table itself is generic; this module provides the one concrete item
//! the crate ships (the discounted n-step `Transition` assembled by the
//! adder) plus the `Action` representation shared with actors and policies.

use std::fmt::Debug;

/// Observation vector handed to policies and stored in transitions.
pub type Observation = Vec<f32>;

/// Action representation (discrete or continuous).
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Discrete action index
    Discrete(u32),
    /// Continuous action vector
    Continuous(Vec<f32>),
}

impl Action {
    /// Get discrete action index, panics if continuous.
    pub fn as_discrete(&self) -> u32 {
        match self {
            Action::Discrete(a) => *a,
            Action::Continuous(_) => panic!("Expected discrete action"),
        }
    }

    /// Get continuous action vector, panics if discrete.
    pub fn as_continuous(&self) -> &[f32] {
        match self {
            Action::Discrete(_) => panic!("Expected continuous action"),
            Action::Continuous(a) => a,
        }
    }
}

/// Discounted n-step transition.
///
/// `reward` is the discounted sum over the window and `discount` the compound
/// discount for bootstrapping past `next_observation`. A window that crossed
/// a terminal step carries `discount == 0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Observation at the start of the window
    pub observation: Observation,
    /// Action taken at the start of the window
    pub action: Action,
    /// Discounted reward accumulated over the window
    pub reward: f32,
    /// Compound discount to apply to values past the window
    pub discount: f32,
    /// Observation after the last step of the window
    pub next_observation: Observation,
}

impl Transition {
    /// Create a transition with a discrete action.
    pub fn new_discrete(
        observation: Observation,
        action: u32,
        reward: f32,
        discount: f32,
        next_observation: Observation,
    ) -> Self {
        Self {
            observation,
            action: Action::Discrete(action),
            reward,
            discount,
            next_observation,
        }
    }

    /// Create a transition with a continuous action.
    pub fn new_continuous(
        observation: Observation,
        action: Vec<f32>,
        reward: f32,
        discount: f32,
        next_observation: Observation,
    ) -> Self {
        Self {
            observation,
            action: Action::Continuous(action),
            reward,
            discount,
            next_observation,
        }
    }

    /// Whether the window ended the episode (no bootstrapping possible).
    pub fn is_terminal(&self) -> bool {
        self.discount == 0.0
    }
}
