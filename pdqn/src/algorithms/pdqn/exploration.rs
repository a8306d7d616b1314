//! Gaussian exploration noise on the selected action parameters.
//!
//! Each coordinate of the chosen action's slice gets independent zero-mean
//! Gaussian noise; the standard deviation depends on the control channel the
//! coordinate drives (steer, throttle/brake). After perturbation the value is
//! clipped back into the parameter bounds.
//!
//! σ decays multiplicatively once a warm-up number of decay requests has
//! passed, and never falls below `min_sigma`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::core::action_layout::ParamBounds;
use crate::error::{PdqnError, Result};

// ============================================================================
// Exploration Configuration
// ============================================================================

/// Configuration for Gaussian parameter noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationConfig {
    /// Initial σ per control channel, indexed by position within an action's
    /// parameter slice. Positions past the end reuse the last entry.
    pub sigma: Vec<f32>,

    /// Multiplicative decay applied by every `decay()` call after warm-up.
    pub sigma_decay: f32,

    /// Lower bound on every σ.
    pub min_sigma: f32,

    /// Number of `decay()` calls ignored before σ starts shrinking.
    pub decay_warmup: usize,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            sigma: vec![0.3, 0.5],
            sigma_decay: 0.9999,
            min_sigma: 0.0,
            decay_warmup: 10_000,
        }
    }
}

impl ExplorationConfig {
    /// Same σ on every channel.
    pub fn uniform(sigma: f32) -> Self {
        Self {
            sigma: vec![sigma],
            ..Self::default()
        }
    }

    /// No exploration noise at all.
    pub fn disabled() -> Self {
        Self {
            sigma: vec![0.0],
            sigma_decay: 1.0,
            min_sigma: 0.0,
            decay_warmup: 0,
        }
    }

    /// Set per-channel σ.
    pub fn with_sigma(mut self, sigma: Vec<f32>) -> Self {
        self.sigma = sigma;
        self
    }

    /// Set the decay factor.
    pub fn with_sigma_decay(mut self, decay: f32) -> Self {
        self.sigma_decay = decay;
        self
    }

    /// Set the σ floor.
    pub fn with_min_sigma(mut self, min_sigma: f32) -> Self {
        self.min_sigma = min_sigma;
        self
    }

    /// Set the decay warm-up.
    pub fn with_decay_warmup(mut self, warmup: usize) -> Self {
        self.decay_warmup = warmup;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.sigma.is_empty() {
            return Err(PdqnError::InvalidConfig(
                "exploration needs at least one sigma".into(),
            ));
        }
        if self.sigma.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(PdqnError::InvalidConfig(format!(
                "exploration sigma must be finite and non-negative, got {:?}",
                self.sigma
            )));
        }
        if !(self.sigma_decay > 0.0 && self.sigma_decay <= 1.0) {
            return Err(PdqnError::InvalidConfig(format!(
                "sigma decay must be in (0, 1], got {}",
                self.sigma_decay
            )));
        }
        if !self.min_sigma.is_finite() || self.min_sigma < 0.0 {
            return Err(PdqnError::InvalidConfig(format!(
                "min sigma must be non-negative, got {}",
                self.min_sigma
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Gaussian Exploration
// ============================================================================

/// Seeded Gaussian noise source with a decaying per-channel σ.
#[derive(Debug, Clone)]
pub struct GaussianExploration {
    config: ExplorationConfig,
    sigma: Vec<f32>,
    decay_calls: usize,
    rng: StdRng,
}

impl GaussianExploration {
    /// Create with a fixed seed.
    pub fn new(config: ExplorationConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sigma: config.sigma.clone(),
            config,
            decay_calls: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Current σ per channel.
    pub fn sigma(&self) -> &[f32] {
        &self.sigma
    }

    /// σ for position `i` within an action slice.
    pub fn sigma_for(&self, i: usize) -> f32 {
        self.sigma
            .get(i)
            .or_else(|| self.sigma.last())
            .copied()
            .unwrap_or(0.0)
    }

    /// Overwrite the current σ (e.g. when resuming from a checkpoint).
    pub fn set_sigma(&mut self, sigma: Vec<f32>) -> Result<()> {
        if sigma.is_empty() || sigma.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(PdqnError::InvalidConfig(format!(
                "invalid exploration sigma {:?}",
                sigma
            )));
        }
        self.sigma = sigma;
        Ok(())
    }

    /// Number of `decay()` calls seen so far.
    pub fn decay_calls(&self) -> usize {
        self.decay_calls
    }

    /// Restore the decay counter (checkpoint resume).
    pub fn set_decay_calls(&mut self, calls: usize) {
        self.decay_calls = calls;
    }

    /// Request one decay step. Ignored during warm-up.
    pub fn decay(&mut self) {
        self.decay_calls += 1;
        if self.decay_calls <= self.config.decay_warmup {
            return;
        }
        let decay = self.config.sigma_decay;
        let floor = self.config.min_sigma;
        for s in &mut self.sigma {
            *s = (*s * decay).max(floor);
        }
    }

    /// Perturb `params` in place and clip into `bounds`.
    pub fn apply(&mut self, params: &mut [f32], bounds: ParamBounds) {
        for (i, p) in params.iter_mut().enumerate() {
            let sigma = self.sigma_for(i);
            let noise = if sigma > 0.0 {
                // σ was validated finite and positive here
                Normal::new(0.0, sigma)
                    .map(|n| n.sample(&mut self.rng))
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            *p = (*p + noise).clamp(bounds.min, bounds.max);
        }
    }
}
