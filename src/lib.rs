//! # Local RL: synchronous actor-learner training
//!
//! Single-process training framework coordinating an acting loop, a
//! rate-limited replay buffer and an in-line learner, so that experience
//! collection and optimization proceed in lockstep on one thread.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Training program                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Main thread                              Fetch thread           │
//! │  ┌───────────────────┐                                           │
//! │  │ EnvironmentLoop   │                                           │
//! │  │  env ──▶ actor    │                                           │
//! │  └────┬─────────┬────┘                                           │
//! │       │ adder   │ update()                                       │
//! │       ▼         ▼                                                │
//! │  ┌──────────┐  ┌───────────────┐      ┌─────────────────┐        │
//! │  │ReplayTable│ │ LearningActor │◀─────│ PrefetchBuffer  │        │
//! │  │(rate-    │  │ learner.step()│      │ (bounded queue) │        │
//! │  │ limited) │  └───────┬───────┘      └────────▲────────┘        │
//! │  └────▲─────┘          │ publish               │ sample          │
//! │       │                ▼                ┌──────┴──────┐          │
//! │       │          ┌──────────────┐       │ReplayDataset│          │
//! │       └──────────│ VariableSlot │       └─────────────┘          │
//! │        sample    └──────────────┘                                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The replay table's rate limiter holds the sample/insert ratio inside a
//! configured band; the coordinator only steps the learner when data is
//! admissible, so neither side ever blocks the main thread.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use local_rl::{run_agent, RunConfig};
//!
//! let config = RunConfig::new()
//!     .with_seed(1)
//!     .with_num_steps(100_000)
//!     .with_eval_every(10_000)
//!     .with_num_eval_episodes(5);
//!
//! let report = run_agent(&builder, env_factory, logger_factory, &config)?;
//! println!("trained for {} learner steps", report.count("learner_steps"));
//! ```

pub mod actors;
pub mod core;
pub mod dataset;
pub mod environment;
pub mod environment_loop;
pub mod error;
pub mod learner;
pub mod metrics;
pub mod replay;
pub mod runners;

// Re-export commonly used types
pub use crate::core::rate_limiter::{RateLimiter, RateLimiterInfo};
pub use crate::core::transition::{Action, Observation, Transition};
pub use crate::core::variable_slot::{
    variable_slot, SharedVariableSlot, SharedVariableSource, VariableClient, VariableSlot,
    VariableSnapshot, VariableSource,
};

pub use error::TrainingError;

pub use environment::{
    ActionSpec, Environment, EnvironmentSpec, ItemSignature, StepKind, TimeStep,
};
pub use environment_loop::{EnvironmentLoop, EpisodeResult};

pub use replay::{
    replay_table, Adder, NStepAdder, NStepAdderConfig, RemoveStrategy, ReplayTable,
    ReplayTableConfig, SampleStrategy, SharedReplayTable, TableInfo, DEFAULT_TABLE_NAME,
};

pub use dataset::{
    BatchSource, Fetch, PrefetchConfig, PrefetchingIterator, ReplayDataset,
    SharedPrefetchingIterator,
};

pub use learner::Learner;

pub use actors::{Actor, GenericActor, LearningActor, PolicyFn};

pub use metrics::{
    CSVLogger, ConsoleLogger, Counter, LoopSnapshot, MultiLogger, NullLogger, SharedCounter,
    TrainingLogger,
};

pub use runners::{derive_seed, run_agent, AgentBuilder, RunConfig, RunReport};
