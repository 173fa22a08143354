//! Training program runners.
//!
//! [`local::run_agent`] is the entry point: it takes an [`local::AgentBuilder`]
//! plus an environment factory and drives the whole synchronous program,
//! alternating training legs with evaluation passes and reporting final
//! counter totals.

pub mod local;


pub use local::{derive_seed, run_agent, AgentBuilder, RunConfig, RunReport};
