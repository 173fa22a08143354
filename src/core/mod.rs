//! Core primitives shared across the crate.

pub mod rate_limiter;
pub mod transition;
pub mod variable_slot;

pub use rate_limiter::{RateLimiter, RateLimiterInfo};
pub use transition::{Action, Observation, Transition};
pub use variable_slot::{
    variable_slot, SharedVariableSlot, SharedVariableSource, VariableClient, VariableSlot,
    VariableSnapshot, VariableSource,
};
