//! Training loggers.
//!
//! The trainer emits one [`TrainingSnapshot`] per finished episode; loggers
//! decide what to do with it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::algorithms::pdqn::LearnStats;

/// Training snapshot for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSnapshot {
    /// Finished episode index (1-based).
    pub episode: usize,
    /// Total environment steps.
    pub env_steps: usize,
    /// Total learning steps.
    pub learn_steps: usize,
    /// Undiscounted reward of the episode.
    pub episode_reward: f32,
    /// Steps in the episode.
    pub episode_length: usize,
    /// Latest critic loss (0 before learning starts).
    pub critic_loss: f32,
    /// Latest actor loss.
    pub actor_loss: f32,
    /// Latest mean Q of the taken actions.
    pub mean_q: f32,
    /// Exploration σ per channel.
    pub sigma: Vec<f32>,
}

impl TrainingSnapshot {
    /// Create a new training snapshot.
    pub fn new(episode: usize, env_steps: usize, episode_reward: f32, episode_length: usize) -> Self {
        Self {
            episode,
            env_steps,
            learn_steps: 0,
            episode_reward,
            episode_length,
            critic_loss: 0.0,
            actor_loss: 0.0,
            mean_q: 0.0,
            sigma: Vec::new(),
        }
    }

    /// Attach the most recent learning statistics.
    pub fn with_learn_stats(mut self, learn_steps: usize, stats: Option<&LearnStats>) -> Self {
        self.learn_steps = learn_steps;
        if let Some(stats) = stats {
            self.critic_loss = stats.critic_loss;
            self.actor_loss = stats.actor_loss;
            self.mean_q = stats.mean_q;
        }
        self
    }

    /// Set the exploration σ.
    pub fn with_sigma(mut self, sigma: &[f32]) -> Self {
        self.sigma = sigma.to_vec();
        self
    }

    fn sigma_string(&self, sep: &str) -> String {
        self.sigma
            .iter()
            .map(|s| format!("{:.4}", s))
            .collect::<Vec<_>>()
            .join(sep)
    }
}

/// Logger trait for different logging backends.
pub trait MetricsLogger {
    /// Log a training snapshot.
    fn log(&mut self, snapshot: &TrainingSnapshot);

    /// Flush any buffered output.
    fn flush(&mut self);
}

/// Console logger with pretty formatting.
pub struct ConsoleLogger {
    log_interval: usize,
    last_log_episode: usize,
    start_time: Instant,
    show_header: bool,
}

impl ConsoleLogger {
    /// Create a new console logger.
    ///
    /// # Arguments
    ///
    /// * `log_interval` - Episodes between log entries
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
            last_log_episode: 0,
            start_time: Instant::now(),
            show_header: true,
        }
    }

    /// Reset the start time.
    pub fn reset_timer(&mut self) {
        self.start_time = Instant::now();
    }

    fn print_header(&self) {
        println!(
            "{:>8} {:>10} {:>8} {:>10} {:>10} {:>10} {:>10} {:>14} {:>8}",
            "Episode", "EnvSteps", "Learn", "Reward", "Critic", "Actor", "MeanQ", "Sigma", "SPS"
        );
        println!("{}", "-".repeat(98));
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        if snapshot.episode < self.last_log_episode + self.log_interval {
            return;
        }

        if self.show_header {
            self.print_header();
            self.show_header = false;
        }

        let elapsed = self.start_time.elapsed().as_secs_f32();
        let sps = if elapsed > 0.0 {
            snapshot.env_steps as f32 / elapsed
        } else {
            0.0
        };

        println!(
            "{:>8} {:>10} {:>8} {:>10.2} {:>10.4} {:>10.4} {:>10.4} {:>14} {:>8.0}",
            snapshot.episode,
            snapshot.env_steps,
            snapshot.learn_steps,
            snapshot.episode_reward,
            snapshot.critic_loss,
            snapshot.actor_loss,
            snapshot.mean_q,
            snapshot.sigma_string("/"),
            sps
        );

        self.last_log_episode = snapshot.episode;
    }

    fn flush(&mut self) {
        // stdout is typically line-buffered, so nothing to do
    }
}

/// CSV file logger for analysis.
pub struct CSVLogger {
    writer: BufWriter<File>,
    start_time: Instant,
}

impl CSVLogger {
    /// Create a new CSV logger.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the CSV file
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "episode,env_steps,learn_steps,episode_reward,episode_length,critic_loss,actor_loss,mean_q,sigma,elapsed_secs"
        )?;

        Ok(Self {
            writer,
            start_time: Instant::now(),
        })
    }
}

impl MetricsLogger for CSVLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        let elapsed = self.start_time.elapsed().as_secs_f32();

        if let Err(e) = writeln!(
            self.writer,
            "{},{},{},{:.4},{},{:.6},{:.6},{:.6},{},{:.2}",
            snapshot.episode,
            snapshot.env_steps,
            snapshot.learn_steps,
            snapshot.episode_reward,
            snapshot.episode_length,
            snapshot.critic_loss,
            snapshot.actor_loss,
            snapshot.mean_q,
            snapshot.sigma_string(";"),
            elapsed
        ) {
            log::warn!("failed to write metrics row: {}", e);
        }
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
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    /// Create a new multi-logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a logger.
    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    /// Number of attached loggers.
    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
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

/// Logger that keeps every snapshot in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLogger {
    pub snapshots: Vec<TrainingSnapshot>,
}

impl MetricsLogger for MemoryLogger {
    fn log(&mut self, snapshot: &TrainingSnapshot) {
        self.snapshots.push(snapshot.clone());
    }

    fn flush(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snapshot(episode: usize) -> TrainingSnapshot {
        TrainingSnapshot::new(episode, episode * 100, 12.5, 100)
            .with_learn_stats(
                episode * 10,
                Some(&LearnStats {
                    critic_loss: 0.5,
                    actor_loss: -0.2,
                    mean_q: 1.0,
                    mean_target: 1.1,
                }),
            )
            .with_sigma(&[0.3, 0.5])
    }

    #[test]
    fn test_training_snapshot() {
        let s = snapshot(3);
        assert_eq!(s.episode, 3);
        assert_eq!(s.env_steps, 300);
        assert_eq!(s.learn_steps, 30);
        assert!((s.critic_loss - 0.5).abs() < 1e-6);
        assert_eq!(s.sigma_string("/"), "0.3000/0.5000");
    }

    #[test]
    fn test_snapshot_without_stats_keeps_zero_losses() {
        let s = TrainingSnapshot::new(1, 10, 0.0, 10).with_learn_stats(0, None);
        assert_eq!(s.critic_loss, 0.0);
        assert_eq!(s.actor_loss, 0.0);
    }

    #[test]
    fn test_csv_logger_writes_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        {
            let mut logger = CSVLogger::new(&path).unwrap();
            logger.log(&snapshot(1));
            logger.log(&snapshot(2));
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("episode,env_steps"));
        assert!(lines[2].starts_with("2,200,20,12.5000,100,"));
        assert!(lines[2].contains("0.3000;0.5000"));
    }

    #[test]
    fn test_multi_logger() {
        let mut multi = MultiLogger::new()
            .add(ConsoleLogger::new(10))
            .add(MemoryLogger::default());
        assert_eq!(multi.len(), 2);

        multi.log(&snapshot(10));
        multi.flush();
    }
}
