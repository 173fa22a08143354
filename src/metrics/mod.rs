//! Counters and loggers shared by the training and evaluation loops.
//!
//! ## Counters
//!
//! - [`Counter`]: hierarchical named counters; a child reports into its
//!   parent under a prefixed key space
//!
//! ## Loggers
//!
//! - [`ConsoleLogger`]: interval-gated aligned console output
//! - [`CSVLogger`]: CSV file logging for analysis
//! - [`MultiLogger`]: combine multiple loggers
//! - [`NullLogger`]: discard everything

pub mod counter;
pub mod logger;

pub use counter::{Counter, SharedCounter};
pub use logger::{
    CSVLogger, ConsoleLogger, LoopSnapshot, MultiLogger, NullLogger, TrainingLogger,
};
