//! Loggers for the training and evaluation loops.
//!
//! Provides different logging backends for per-episode loop metrics.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Per-episode snapshot emitted by an environment loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSnapshot {
    /// Loop label ("train", "eval", ...).
    pub label: String,
    /// Episode ordinal within this loop, starting at 1.
    pub episode: u64,
    /// Steps taken in this episode.
    pub episode_length: u64,
    /// Undiscounted return of this episode.
    pub episode_return: f32,
    /// Environment steps per wall-clock second over this episode.
    pub steps_per_second: f32,
    /// Episodes completed by this loop so far.
    pub total_episodes: u64,
    /// Environment steps taken by this loop so far.
    pub total_steps: u64,
}

impl LoopSnapshot {
    /// Create a snapshot carrying the per-episode fields.
    pub fn new(
        label: impl Into<String>,
        episode: u64,
        episode_length: u64,
        episode_return: f32,
    ) -> Self {
        Self {
            label: label.into(),
            episode,
            episode_length,
            episode_return,
            steps_per_second: 0.0,
            total_episodes: 0,
            total_steps: 0,
        }
    }

    /// Set the wall-clock stepping rate.
    pub fn with_rate(mut self, steps_per_second: f32) -> Self {
        self.steps_per_second = steps_per_second;
        self
    }

    /// Set the loop totals.
    pub fn with_totals(mut self, total_episodes: u64, total_steps: u64) -> Self {
        self.total_episodes = total_episodes;
        self.total_steps = total_steps;
        self
    }
}

/// Logger trait for different logging backends.
pub trait TrainingLogger: Send {
    /// Log a loop snapshot.
    fn log(&mut self, snapshot: &LoopSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Console logger with aligned columns.
pub struct ConsoleLogger {
    log_interval: u64,
    last_log_episode: u64,
    show_header: bool,
}

impl ConsoleLogger {
    /// Create a new console logger.
    ///
    /// # Arguments
    ///
    /// * `log_interval` - Episodes between log entries
    pub fn new(log_interval: u64) -> Self {
        Self {
            log_interval: log_interval.max(1),
            last_log_episode: 0,
            show_header: true,
        }
    }

    fn print_header(&self) {
        println!(
            "{:>8} {:>10} {:>8} {:>10} {:>10} {:>10} {:>12}",
            "Label", "Episode", "Length", "Return", "Steps/s", "Episodes", "TotalSteps"
        );
        println!("{}", "-".repeat(76));
    }
}

impl TrainingLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &LoopSnapshot) {
        if snapshot.episode < self.last_log_episode + self.log_interval {
            return;
        }

        if self.show_header {
            self.print_header();
            self.show_header = false;
        }

        println!(
            "{:>8} {:>10} {:>8} {:>10.2} {:>10.1} {:>10} {:>12}",
            snapshot.label,
            snapshot.episode,
            snapshot.episode_length,
            snapshot.episode_return,
            snapshot.steps_per_second,
            snapshot.total_episodes,
            snapshot.total_steps
        );

        self.last_log_episode = snapshot.episode;
    }

    fn flush(&mut self) {
        // stdout is line-buffered, nothing to do
    }
}

/// CSV file logger for analysis.
pub struct CSVLogger {
    writer: BufWriter<File>,
}

impl CSVLogger {
    /// Create a new CSV logger writing to `path`, truncating any existing
    /// file and emitting the header row up front.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "label,episode,episode_length,episode_return,steps_per_second,total_episodes,total_steps"
        )?;

        Ok(Self { writer })
    }
}

impl TrainingLogger for CSVLogger {
    fn log(&mut self, snapshot: &LoopSnapshot) {
        let _ = writeln!(
            self.writer,
            "{},{},{},{:.4},{:.2},{},{}",
            snapshot.label,
            snapshot.episode,
            snapshot.episode_length,
            snapshot.episode_return,
            snapshot.steps_per_second,
            snapshot.total_episodes,
            snapshot.total_steps
        );
    }

    fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl Drop for CSVLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Multi-logger that writes to multiple backends.
pub struct MultiLogger {
    loggers: Vec<Box<dyn TrainingLogger>>,
}

impl MultiLogger {
    /// Create a new multi-logger.
    pub fn new() -> Self {
        Self {
            loggers: Vec::new(),
        }
    }

    /// Add a logger.
    pub fn add<L: TrainingLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }
}

impl Default for MultiLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingLogger for MultiLogger {
    fn log(&mut self, snapshot: &LoopSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}

/// Logger that discards everything. Evaluation loops that should stay quiet
/// use this.
pub struct NullLogger;

impl TrainingLogger for NullLogger {
    fn log(&mut self, _snapshot: &LoopSnapshot) {}

    fn flush(&mut self) {}
}
