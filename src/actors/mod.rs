//! Acting side of the agent.
//!
//! - `Actor`: per-step contract the environment loop drives
//! - `GenericActor`: policy closure + variable client + optional adder
//! - `LearningActor`: wraps an actor and a learner into one synchronous unit

pub mod actor;
pub mod learning_actor;

#[cfg(test)]
mod tests;

pub use actor::{Actor, GenericActor, PolicyFn};
pub use learning_actor::LearningActor;
