//! Agent checkpointing.
//!
//! A checkpoint is a directory holding one burn record per network and per
//! optimizer plus a `meta.json` with the training counters:
//!
//! ```text
//! checkpoints/
//!   checkpoint_00010000/
//!     actor.bin  actor_target.bin  critic.bin  critic_target.bin
//!     actor_optim.bin  critic_optim.bin  meta.json
//!   pretrain/
//!     ...
//! ```
//!
//! Numbered checkpoints are rotated (`keep_last_n`); named ones are never
//! removed.

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Record, Recorder};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const CHECKPOINT_PREFIX: &str = "checkpoint_";
const META_FILE: &str = "meta.json";

/// Configuration for the checkpointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointerConfig {
    /// Directory to store checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Environment steps between checkpoint saves.
    pub save_interval: usize,
    /// Number of recent checkpoints to keep (0 = keep all).
    pub keep_last_n: usize,
}

impl Default for CheckpointerConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("./checkpoints"),
            save_interval: 10_000,
            keep_last_n: 5,
        }
    }
}

impl CheckpointerConfig {
    /// Create a new config with specified checkpoint directory.
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            ..Default::default()
        }
    }

    /// Set the save interval.
    pub fn with_save_interval(mut self, interval: usize) -> Self {
        self.save_interval = interval;
        self
    }

    /// Set the number of checkpoints to keep.
    pub fn with_keep_last_n(mut self, n: usize) -> Self {
        self.keep_last_n = n;
        self
    }
}

/// Error type for checkpointing operations.
#[derive(Debug)]
pub enum CheckpointError {
    /// IO error during save/load.
    Io(io::Error),
    /// Burn recorder error.
    Recorder(String),
    /// Metadata could not be encoded or decoded.
    Metadata(String),
    /// No checkpoints found.
    NoCheckpoints,
}

impl std::fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "IO error: {}", e),
            CheckpointError::Recorder(e) => write!(f, "Recorder error: {}", e),
            CheckpointError::Metadata(e) => write!(f, "Metadata error: {}", e),
            CheckpointError::NoCheckpoints => write!(f, "No checkpoints found"),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

/// Training counters stored next to the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Environment step at which the checkpoint was taken.
    pub step: usize,
    /// Completed learning steps.
    pub learn_steps: usize,
    /// Exploration σ per channel.
    pub sigma: Vec<f32>,
    /// Exploration decay requests seen so far.
    pub decay_calls: usize,
    /// Optional metric value (e.g., recent average reward).
    pub metric: Option<f32>,
}

/// A checkpoint on disk.
#[derive(Debug, Clone)]
pub struct CheckpointInfo {
    /// Checkpoint directory.
    pub path: PathBuf,
    /// Step at which checkpoint was saved.
    pub step: usize,
    /// Optional metric value (e.g., reward).
    pub metric: Option<f32>,
}

// ============================================================================
// Record Helpers
// ============================================================================

fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
    BinFileRecorder::<FullPrecisionSettings>::new()
}

/// Save a module's weights to `path` (the recorder adds the extension).
pub fn save_module<B: Backend, M: Module<B>>(module: &M, path: &Path) -> Result<(), CheckpointError> {
    module
        .clone()
        .save_file(path, &recorder())
        .map_err(|e| CheckpointError::Recorder(e.to_string()))
}

/// Load weights from `path` into `template`.
pub fn load_module<B: Backend, M: Module<B>>(
    template: M,
    path: &Path,
    device: &B::Device,
) -> Result<M, CheckpointError> {
    template
        .load_file(path, &recorder(), device)
        .map_err(|e| CheckpointError::Recorder(e.to_string()))
}

/// Save an arbitrary record (optimizer state) to `path`.
pub fn save_record<B: Backend, R: Record<B>>(record: R, path: &Path) -> Result<(), CheckpointError> {
    Recorder::<B>::record(&recorder(), record, path.to_path_buf())
        .map_err(|e| CheckpointError::Recorder(e.to_string()))
}

/// Load a record written by `save_record`.
pub fn load_record<B: Backend, R: Record<B>>(
    path: &Path,
    device: &B::Device,
) -> Result<R, CheckpointError> {
    Recorder::<B>::load(&recorder(), path.to_path_buf(), device)
        .map_err(|e| CheckpointError::Recorder(e.to_string()))
}

/// Write `meta.json` into a checkpoint directory.
pub fn write_meta(dir: &Path, meta: &CheckpointMeta) -> Result<(), CheckpointError> {
    let json =
        serde_json::to_string_pretty(meta).map_err(|e| CheckpointError::Metadata(e.to_string()))?;
    fs::write(dir.join(META_FILE), json)?;
    Ok(())
}

/// Read `meta.json` from a checkpoint directory.
pub fn read_meta(dir: &Path) -> Result<CheckpointMeta, CheckpointError> {
    let json = fs::read_to_string(dir.join(META_FILE))?;
    serde_json::from_str(&json).map_err(|e| CheckpointError::Metadata(e.to_string()))
}

// ============================================================================
// Checkpointer
// ============================================================================

/// Checkpoint directory manager.
///
/// Hands out directories for numbered and named checkpoints and rotates
/// the numbered ones.
pub struct Checkpointer {
    config: CheckpointerConfig,
    checkpoint_history: Vec<CheckpointInfo>,
}

impl Checkpointer {
    /// Create a new checkpointer.
    ///
    /// Creates the checkpoint directory if it doesn't exist.
    pub fn new(config: CheckpointerConfig) -> Result<Self, CheckpointError> {
        fs::create_dir_all(&config.checkpoint_dir)?;

        Ok(Self {
            config,
            checkpoint_history: Vec::new(),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &CheckpointerConfig {
        &self.config
    }

    /// Check if it's time to save a checkpoint.
    pub fn should_save(&self, step: usize) -> bool {
        self.config.save_interval > 0 && step > 0 && step % self.config.save_interval == 0
    }

    /// Directory for the numbered checkpoint at `step`.
    pub fn step_dir(&self, step: usize) -> PathBuf {
        self.config
            .checkpoint_dir
            .join(format!("{}{:08}", CHECKPOINT_PREFIX, step))
    }

    /// Directory for a named checkpoint (e.g. `"pretrain"`).
    pub fn named_dir(&self, name: &str) -> PathBuf {
        self.config.checkpoint_dir.join(name)
    }

    /// Record that a numbered checkpoint was written and rotate old ones.
    pub fn register(&mut self, step: usize, metric: Option<f32>) -> Result<PathBuf, CheckpointError> {
        let path = self.step_dir(step);
        self.checkpoint_history.push(CheckpointInfo {
            path: path.clone(),
            step,
            metric,
        });
        self.cleanup_old_checkpoints()?;
        Ok(path)
    }

    /// Checkpoints registered in this session, oldest first.
    pub fn history(&self) -> &[CheckpointInfo] {
        &self.checkpoint_history
    }

    /// Find the latest numbered checkpoint in the checkpoint directory.
    pub fn find_latest_checkpoint(&self) -> Result<CheckpointInfo, CheckpointError> {
        let mut checkpoints: Vec<(usize, PathBuf)> = fs::read_dir(&self.config.checkpoint_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_str()?.to_string();
                let step = name.strip_prefix(CHECKPOINT_PREFIX)?.parse::<usize>().ok()?;
                Some((step, e.path()))
            })
            .collect();

        checkpoints.sort_by_key(|(step, _)| *step);
        let (step, path) = checkpoints.pop().ok_or(CheckpointError::NoCheckpoints)?;
        let metric = read_meta(&path).ok().and_then(|m| m.metric);

        Ok(CheckpointInfo { path, step, metric })
    }

    /// Remove old checkpoints keeping only the last N.
    fn cleanup_old_checkpoints(&mut self) -> Result<(), CheckpointError> {
        if self.config.keep_last_n == 0 {
            return Ok(());
        }

        while self.checkpoint_history.len() > self.config.keep_last_n {
            let old = self.checkpoint_history.remove(0);
            if old.path.exists() {
                fs::remove_dir_all(&old.path)?;
                log::debug!("removed old checkpoint {}", old.path.display());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::{Linear, LinearConfig};
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    fn meta(step: usize) -> CheckpointMeta {
        CheckpointMeta {
            step,
            learn_steps: step / 2,
            sigma: vec![0.3, 0.5],
            decay_calls: 7,
            metric: Some(1.5),
        }
    }

    #[test]
    fn test_should_save() {
        let dir = tempdir().unwrap();
        let checkpointer =
            Checkpointer::new(CheckpointerConfig::new(dir.path()).with_save_interval(100)).unwrap();

        assert!(!checkpointer.should_save(0));
        assert!(!checkpointer.should_save(50));
        assert!(checkpointer.should_save(100));
        assert!(checkpointer.should_save(300));
    }

    #[test]
    fn test_meta_roundtrip() {
        let dir = tempdir().unwrap();
        write_meta(dir.path(), &meta(42)).unwrap();
        assert_eq!(read_meta(dir.path()).unwrap(), meta(42));
    }

    #[test]
    fn test_module_roundtrip() {
        let dir = tempdir().unwrap();
        let device = Default::default();
        let saved: Linear<TestBackend> = LinearConfig::new(3, 2).init(&device);
        let path = dir.path().join("linear");
        save_module::<TestBackend, _>(&saved, &path).unwrap();

        let template: Linear<TestBackend> = LinearConfig::new(3, 2).init(&device);
        let loaded = load_module::<TestBackend, _>(template, &path, &device).unwrap();

        let a = saved.weight.val().into_data().to_vec::<f32>().unwrap();
        let b = loaded.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rotation_and_latest() {
        let dir = tempdir().unwrap();
        let mut checkpointer =
            Checkpointer::new(CheckpointerConfig::new(dir.path()).with_keep_last_n(2)).unwrap();

        for step in [10, 20, 30] {
            let path = checkpointer.step_dir(step);
            fs::create_dir_all(&path).unwrap();
            write_meta(&path, &meta(step)).unwrap();
            checkpointer.register(step, Some(step as f32)).unwrap();
        }

        assert!(!checkpointer.step_dir(10).exists());
        assert!(checkpointer.step_dir(20).exists());
        assert_eq!(checkpointer.history().len(), 2);

        let latest = checkpointer.find_latest_checkpoint().unwrap();
        assert_eq!(latest.step, 30);
        assert_eq!(latest.metric, Some(1.5));
    }

    #[test]
    fn test_named_dir_not_counted_as_latest() {
        let dir = tempdir().unwrap();
        let checkpointer = Checkpointer::new(CheckpointerConfig::new(dir.path())).unwrap();
        fs::create_dir_all(checkpointer.named_dir("pretrain")).unwrap();

        assert!(matches!(
            checkpointer.find_latest_checkpoint(),
            Err(CheckpointError::NoCheckpoints)
        ));
    }
}
