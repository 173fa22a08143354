//! Rate-limited replay storage.
//!
//! A [`table::ReplayTable`] stores items up to a capacity, evicts by strategy
//! when full, and gates progress through a
//! [`crate::core::rate_limiter::RateLimiter`] so that sampling cannot outrun
//! insertion. The [`adder::NStepAdder`] assembles discounted n-step
//! transitions from raw environment steps and feeds them to a table.

pub mod adder;
pub mod selectors;
pub mod table;


pub use adder::{Adder, NStepAdder, NStepAdderConfig};
pub use selectors::{RemoveStrategy, SampleStrategy};
pub use table::{
    replay_table, ReplayTable, ReplayTableConfig, SharedReplayTable, TableInfo, DEFAULT_TABLE_NAME,
};
