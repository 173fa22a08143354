//! Single-process agent runner.
//!
//! Builds every piece of an agent through an [`AgentBuilder`] and wires them
//! into one synchronous program: a training loop whose actor inserts
//! experience and steps the learner in-line, alternated with evaluation
//! episodes run by a second actor that shares the learner's parameters but
//! writes nothing back.
//!
//! ```text
//!   round = eval(num_eval_episodes) then train(eval_every steps)
//!
//!   [eval] [train....] [eval] [train....] ... [eval]
//!          num_steps / eval_every rounds       final
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::actors::{Actor, LearningActor};
use crate::core::variable_slot::SharedVariableSource;
use crate::dataset::{BatchSource, PrefetchConfig, PrefetchingIterator, SharedPrefetchingIterator};
use crate::environment::{Environment, EnvironmentSpec};
use crate::environment_loop::EnvironmentLoop;
use crate::error::TrainingError;
use crate::learner::Learner;
use crate::metrics::{Counter, SharedCounter, TrainingLogger};
use crate::replay::{Adder, SharedReplayTable};

/// Factory for the agent-specific pieces of a training program.
///
/// The runner owns the wiring and the loop structure; implementors own the
/// concrete algorithm behind each piece.
pub trait AgentBuilder {
    /// Parameter payload the learner publishes.
    type Params: Send + Sync + 'static;
    /// Item stored in the replay tables.
    type Item: Clone + Send + 'static;
    /// Batch delivered to the learner.
    type Batch: Send + 'static;
    /// Learner type.
    type Learner: Learner<Params = Self::Params>;
    /// Actor type for both training and evaluation.
    type Actor: Actor;
    /// Batch source feeding the prefetcher.
    type Dataset: BatchSource<Batch = Self::Batch> + 'static;

    /// Replay tables sized and gated for this agent.
    fn make_replay_tables(
        &self,
        env_spec: &EnvironmentSpec,
    ) -> Result<Vec<SharedReplayTable<Self::Item>>, TrainingError>;

    /// Adder the training actor writes through.
    fn make_adder(
        &self,
        tables: &[SharedReplayTable<Self::Item>],
    ) -> Result<Box<dyn Adder>, TrainingError>;

    /// Batch source reading from the tables.
    fn make_dataset(
        &self,
        tables: &[SharedReplayTable<Self::Item>],
    ) -> Result<Self::Dataset, TrainingError>;

    /// Learner consuming the prefetched batches.
    fn make_learner(
        &self,
        seed: u64,
        iterator: SharedPrefetchingIterator<Self::Batch>,
        counter: Option<SharedCounter>,
    ) -> Result<Self::Learner, TrainingError>;

    /// Actor acting from the given parameter source. Evaluation actors get
    /// no adder and should act greedily.
    fn make_actor(
        &self,
        seed: u64,
        variable_source: SharedVariableSource<Self::Params>,
        adder: Option<Box<dyn Adder>>,
        evaluation: bool,
    ) -> Result<Self::Actor, TrainingError>;
}

/// Configuration for a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Root seed; per-component seeds derive from it.
    pub seed: u64,
    /// Total training environment steps.
    pub num_steps: u64,
    /// Training steps between evaluation passes. Must divide `num_steps`.
    pub eval_every: u64,
    /// Episodes per evaluation pass.
    pub num_eval_episodes: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            num_steps: 1_000,
            eval_every: 100,
            num_eval_episodes: 1,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_num_steps(mut self, num_steps: u64) -> Self {
        self.num_steps = num_steps;
        self
    }

    pub fn with_eval_every(mut self, eval_every: u64) -> Self {
        self.eval_every = eval_every;
        self
    }

    pub fn with_num_eval_episodes(mut self, num_eval_episodes: u64) -> Self {
        self.num_eval_episodes = num_eval_episodes;
        self
    }

    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.num_steps == 0 {
            return Err(TrainingError::invalid_config("num_steps must be at least 1"));
        }
        if self.eval_every == 0 {
            return Err(TrainingError::invalid_config(
                "eval_every must be at least 1",
            ));
        }
        if self.num_eval_episodes == 0 {
            return Err(TrainingError::invalid_config(
                "num_eval_episodes must be at least 1",
            ));
        }
        if self.num_steps % self.eval_every != 0 {
            return Err(TrainingError::invalid_config(format!(
                "num_steps ({}) must be a multiple of eval_every ({})",
                self.num_steps, self.eval_every
            )));
        }
        Ok(())
    }
}

/// Derive a per-component seed from the root seed.
///
/// Splitmix64 finalizer over `seed` offset by the stream index, so distinct
/// components get decorrelated streams from one root seed.
pub fn derive_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed
        .wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Final counter totals of a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Merged counts from all loops, keyed by `{label}_{name}`.
    pub counts: HashMap<String, u64>,
}

impl RunReport {
    /// Total for `key`, zero if the run never touched it.
    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

/// Run a full training program and return its final counts.
///
/// `env_factory` is called twice, once for the training environment and once
/// for evaluation. `logger_factory` is called with each loop's label.
pub fn run_agent<E, F, B, LF>(
    builder: &B,
    mut env_factory: F,
    mut logger_factory: LF,
    config: &RunConfig,
) -> Result<RunReport, TrainingError>
where
    E: Environment,
    F: FnMut() -> E,
    B: AgentBuilder,
    LF: FnMut(&str) -> Box<dyn TrainingLogger>,
{
    config.validate()?;

    let train_env = env_factory();
    let eval_env = env_factory();
    let env_spec = train_env.spec();

    let tables = builder.make_replay_tables(&env_spec)?;
    if tables.is_empty() {
        return Err(TrainingError::invalid_config(
            "agent requires at least one replay table",
        ));
    }
    // One thread both inserts and triggers sampling; an insert that waited
    // for samples would deadlock the whole program.
    for table in &tables {
        table.disable_insert_blocking();
    }

    let adder = builder.make_adder(&tables)?;
    let dataset = builder.make_dataset(&tables)?;
    let iterator = PrefetchingIterator::spawn(dataset, PrefetchConfig::default())?;

    let counter = Counter::root();
    let learner = builder.make_learner(
        derive_seed(config.seed, 0),
        Arc::clone(&iterator),
        Some(Counter::child(&counter, "learner")),
    )?;
    let variable_source = learner.variable_source();

    let train_actor = builder.make_actor(
        derive_seed(config.seed, 1),
        Arc::clone(&variable_source),
        Some(adder),
        false,
    )?;
    let learning_actor = LearningActor::new(
        train_actor,
        learner,
        Arc::clone(&iterator),
        tables.clone(),
    );
    let mut train_loop = EnvironmentLoop::new(
        train_env,
        learning_actor,
        Counter::child(&counter, "train"),
        logger_factory("train"),
        "train",
    );

    let eval_actor = builder.make_actor(
        config.seed,
        Arc::clone(&variable_source),
        None,
        true,
    )?;
    let mut eval_loop = EnvironmentLoop::new(
        eval_env,
        eval_actor,
        Counter::child(&counter, "eval"),
        logger_factory("eval"),
        "eval",
    );

    // Evaluate before each training leg, and once more at the end.
    for _ in 0..(config.num_steps / config.eval_every) {
        eval_loop.run_episodes(config.num_eval_episodes)?;
        train_loop.run_steps(config.eval_every)?;
    }
    eval_loop.run_episodes(config.num_eval_episodes)?;

    for table in &tables {
        table.close();
    }

    Ok(RunReport {
        counts: counter.get_counts(),
    })
}
