//! P-DQN configuration and statistics.
//!
//! Defaults follow the lane-change setup: short horizon (γ = 0.9), slow
//! targets (τ = 0.01), a critic learning twice as fast as the actor, and
//! per-action gradient masking enabled.

use serde::{Deserialize, Serialize};

use crate::algorithms::pdqn::exploration::ExplorationConfig;
use crate::algorithms::pdqn::gradient_shaping::GradientShapingMode;
use crate::error::{PdqnError, Result};

// ============================================================================
// P-DQN Configuration
// ============================================================================

/// Configuration for the P-DQN learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PDQNConfig {
    // ========================================================================
    // Replay Buffer Settings
    // ========================================================================
    /// Maximum transitions to store in replay buffer.
    pub buffer_capacity: usize,

    /// Batch size for training.
    pub batch_size: usize,

    /// Minimum buffer size before training starts.
    pub min_buffer_size: usize,

    // ========================================================================
    // Algorithm Hyperparameters
    // ========================================================================
    /// Discount factor for future rewards.
    pub gamma: f32,

    /// Soft update coefficient for both target networks.
    pub tau: f32,

    /// Actor network learning rate.
    pub actor_lr: f64,

    /// Critic network learning rate.
    pub critic_lr: f64,

    /// Maximum gradient norm for clipping. None = no clipping.
    pub max_grad_norm: Option<f32>,

    // ========================================================================
    // Gradient Shaping
    // ========================================================================
    /// Scale parameter gradients by the remaining headroom to the bounds.
    pub invert_gradients: bool,

    /// Zero parameter gradients outside the sampled action's slice.
    pub zero_index_gradients: bool,

    /// Which Q-values the actor objective is built from.
    pub shaping_mode: GradientShapingMode,

    // ========================================================================
    // Exploration & Seeding
    // ========================================================================
    /// Gaussian parameter noise.
    pub exploration: ExplorationConfig,

    /// Seed for replay sampling and exploration noise.
    pub seed: u64,
}

impl Default for PDQNConfig {
    fn default() -> Self {
        Self::lane_change()
    }
}

impl PDQNConfig {
    /// Settings used for the lane-change task.
    pub fn lane_change() -> Self {
        Self {
            // Buffer
            buffer_capacity: 40_000,
            batch_size: 128,
            min_buffer_size: 10_000,

            // Hyperparameters
            gamma: 0.9,
            tau: 0.01,
            actor_lr: 1e-3,
            critic_lr: 2e-3,
            max_grad_norm: Some(10.0),

            // Gradient shaping
            invert_gradients: false,
            zero_index_gradients: true,
            shaping_mode: GradientShapingMode::Summed,

            exploration: ExplorationConfig::default(),
            seed: 0,
        }
    }

    /// Small buffers and batches for tests and quick demos.
    pub fn small() -> Self {
        Self {
            buffer_capacity: 1_000,
            batch_size: 16,
            min_buffer_size: 32,
            ..Self::lane_change()
        }
    }

    /// Validate ranges; returns `InvalidConfig` describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(PdqnError::InvalidConfig(
                "buffer_capacity must be positive".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(PdqnError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.batch_size > self.buffer_capacity {
            return Err(PdqnError::InvalidConfig(format!(
                "batch_size {} exceeds buffer_capacity {}",
                self.batch_size, self.buffer_capacity
            )));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(PdqnError::InvalidConfig(format!(
                "gamma must be in [0, 1], got {}",
                self.gamma
            )));
        }
        if !(self.tau > 0.0 && self.tau <= 1.0) {
            return Err(PdqnError::InvalidConfig(format!(
                "tau must be in (0, 1], got {}",
                self.tau
            )));
        }
        if !(self.actor_lr > 0.0) || !(self.critic_lr > 0.0) {
            return Err(PdqnError::InvalidConfig(
                "learning rates must be positive".into(),
            ));
        }
        if let Some(norm) = self.max_grad_norm {
            if !(norm > 0.0) {
                return Err(PdqnError::InvalidConfig(format!(
                    "max_grad_norm must be positive, got {}",
                    norm
                )));
            }
        }
        self.exploration.validate()
    }

    /// Buffer size required before learning: at least one full batch.
    pub fn learning_starts(&self) -> usize {
        self.min_buffer_size.max(self.batch_size)
    }

    // ========================================================================
    // Builder Methods
    // ========================================================================

    /// Set buffer capacity.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set minimum buffer size before training.
    pub fn with_min_buffer_size(mut self, min_size: usize) -> Self {
        self.min_buffer_size = min_size;
        self
    }

    /// Set discount factor.
    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set soft update coefficient.
    pub fn with_tau(mut self, tau: f32) -> Self {
        self.tau = tau;
        self
    }

    /// Set actor learning rate.
    pub fn with_actor_lr(mut self, lr: f64) -> Self {
        self.actor_lr = lr;
        self
    }

    /// Set critic learning rate.
    pub fn with_critic_lr(mut self, lr: f64) -> Self {
        self.critic_lr = lr;
        self
    }

    /// Set gradient clipping norm.
    pub fn with_max_grad_norm(mut self, norm: Option<f32>) -> Self {
        self.max_grad_norm = norm;
        self
    }

    /// Enable or disable gradient inversion.
    pub fn with_invert_gradients(mut self, enabled: bool) -> Self {
        self.invert_gradients = enabled;
        self
    }

    /// Enable or disable per-action gradient masking.
    pub fn with_zero_index_gradients(mut self, enabled: bool) -> Self {
        self.zero_index_gradients = enabled;
        self
    }

    /// Set the actor objective mode.
    pub fn with_shaping_mode(mut self, mode: GradientShapingMode) -> Self {
        self.shaping_mode = mode;
        self
    }

    /// Set exploration noise.
    pub fn with_exploration(mut self, exploration: ExplorationConfig) -> Self {
        self.exploration = exploration;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PdqnError::InvalidConfig(format!("cannot serialize config: {}", e)))
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PdqnError::InvalidConfig(format!("cannot parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Learning Statistics
// ============================================================================

/// Scalars reported by one learning step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LearnStats {
    /// MSE between gathered Q-values and TD targets.
    pub critic_loss: f32,

    /// Actor surrogate loss `-mean(sum(grad * params))`.
    pub actor_loss: f32,

    /// Mean gathered Q-value of the batch.
    pub mean_q: f32,

    /// Mean TD target of the batch.
    pub mean_target: f32,
}

impl LearnStats {
    /// Format stats for logging.
    pub fn format(&self) -> String {
        format!(
            "critic_loss={:.4} | actor_loss={:.4} | q={:.3} | target={:.3}",
            self.critic_loss, self.actor_loss, self.mean_q, self.mean_target
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
