//! P-DQN agent: action selection and the training step.
//!
//! The agent owns the live actor and critic (autodiff backend), their frozen
//! targets (inner backend), one Adam optimizer per network, the replay buffer
//! and the exploration noise. All mutation goes through `&mut self`.
//!
//! ## Training step
//!
//! ```text
//! 1. y   = r + γ · max_a Q'(s', π'(s'))_a · (1 - done)       (targets, no grad)
//! 2. L_Q = mean((Q(s, p)_a - y)²)                           → critic Adam step
//! 3. g   = ∂ J(Q(s, p̃)) / ∂p̃,   p̃ = π(s) detached          (dQ/dparams)
//!    g   ← invert(g, π(s)) ; g ← mask(g, a)
//!    L_π = -mean_b(Σ_p g ⊙ π(s))                            → actor Adam step
//! 4. θ'  ← (1 - τ) θ' + τ θ                                 (both targets)
//! ```
//!
//! The updated networks are swapped into the agent only after every stage
//! produced finite values.

use std::path::Path;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;

use crate::algorithms::pdqn::actor::ParamActor;
use crate::algorithms::pdqn::config::{LearnStats, PDQNConfig};
use crate::algorithms::pdqn::critic::{gather_q_values, greedy_action_masked, td_targets, ParamCritic};
use crate::algorithms::pdqn::exploration::GaussianExploration;
use crate::algorithms::pdqn::gradient_shaping::{
    invert_gradients, zero_index_gradients, GradientShapingMode,
};
use crate::checkpoint::{self, CheckpointMeta};
use crate::core::action_layout::{ActionParamLayout, ParamBounds};
use crate::core::replay_buffer::{ReplayBuffer, ReplayBufferConfig};
use crate::core::target_network::soft_update;
use crate::core::transition::{Transition, TransitionBatch};
use crate::error::{PdqnError, Result};

/// Checkpoint file stems.
const ACTOR_FILE: &str = "actor";
const ACTOR_TARGET_FILE: &str = "actor_target";
const CRITIC_FILE: &str = "critic";
const CRITIC_TARGET_FILE: &str = "critic_target";
const ACTOR_OPTIM_FILE: &str = "actor_optim";
const CRITIC_OPTIM_FILE: &str = "critic_optim";

// ============================================================================
// Action Selection Result
// ============================================================================

/// Output of one action selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSelection {
    /// Chosen discrete action.
    pub action: usize,
    /// Parameters executed with `action` (noise applied when exploring).
    pub params: Vec<f32>,
    /// Raw actor output for every action [param_dim].
    pub all_params: Vec<f32>,
    /// Critic scores for every action [num_actions].
    pub q_values: Vec<f32>,
}

// ============================================================================
// Optimizers
// ============================================================================

/// Create the actor and critic Adam optimizers.
///
/// Gradient clipping by norm is attached when `max_grad_norm` is set.
pub fn create_optimizers<B, Actor, Critic>(
    config: &PDQNConfig,
) -> (impl Optimizer<Actor, B>, impl Optimizer<Critic, B>)
where
    B: AutodiffBackend,
    Actor: AutodiffModule<B>,
    Critic: AutodiffModule<B>,
{
    let mut actor_config = AdamConfig::new().with_epsilon(1e-5);
    let mut critic_config = AdamConfig::new().with_epsilon(1e-5);

    if let Some(max_norm) = config.max_grad_norm {
        actor_config =
            actor_config.with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm)));
        critic_config =
            critic_config.with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm)));
    }

    (actor_config.init(), critic_config.init())
}

// ============================================================================
// Agent
// ============================================================================

/// Parametrized-action DQN agent.
pub struct PDQNAgent<B, Actor, Critic, AO, CO>
where
    B: AutodiffBackend,
    Actor: ParamActor<B> + AutodiffModule<B>,
    Actor::InnerModule: ParamActor<B::InnerBackend>,
    Critic: ParamCritic<B> + AutodiffModule<B>,
    Critic::InnerModule: ParamCritic<B::InnerBackend>,
    AO: Optimizer<Actor, B>,
    CO: Optimizer<Critic, B>,
{
    actor: Actor,
    critic: Critic,
    target_actor: Actor::InnerModule,
    target_critic: Critic::InnerModule,
    actor_optimizer: AO,
    critic_optimizer: CO,
    buffer: ReplayBuffer,
    layout: ActionParamLayout,
    config: PDQNConfig,
    exploration: GaussianExploration,
    device: B::Device,
    state_dim: usize,
    learn_steps: usize,
}

impl<B, Actor, Critic, AO, CO> PDQNAgent<B, Actor, Critic, AO, CO>
where
    B: AutodiffBackend,
    Actor: ParamActor<B> + AutodiffModule<B>,
    Actor::InnerModule: ParamActor<B::InnerBackend>,
    Critic: ParamCritic<B> + AutodiffModule<B>,
    Critic::InnerModule: ParamCritic<B::InnerBackend>,
    AO: Optimizer<Actor, B>,
    CO: Optimizer<Critic, B>,
{
    /// Create an agent. Targets start as exact copies of the live networks.
    ///
    /// Fails with `InvalidConfig` for bad hyperparameters or parameter bounds
    /// other than the actor's `[-1, 1]` tanh range, and `ShapeMismatch` when
    /// the networks disagree with each other or with `layout`.
    pub fn new(
        actor: Actor,
        critic: Critic,
        actor_optimizer: AO,
        critic_optimizer: CO,
        layout: ActionParamLayout,
        config: PDQNConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(action) =
            (0..layout.num_actions()).find(|&a| layout.bounds(a) != ParamBounds::unit())
        {
            let b = layout.bounds(action);
            return Err(PdqnError::InvalidConfig(format!(
                "action {} parameter bounds [{}, {}] must match the actor output range [-1, 1]",
                action, b.min, b.max
            )));
        }

        let state_dim = actor.state_dim();
        if critic.state_dim() != state_dim {
            return Err(PdqnError::shape("critic state", state_dim, critic.state_dim()));
        }
        if actor.param_dim() != layout.param_dim() {
            return Err(PdqnError::shape("actor params", layout.param_dim(), actor.param_dim()));
        }
        if critic.param_dim() != layout.param_dim() {
            return Err(PdqnError::shape(
                "critic params",
                layout.param_dim(),
                critic.param_dim(),
            ));
        }
        if critic.num_actions() != layout.num_actions() {
            return Err(PdqnError::shape(
                "critic actions",
                layout.num_actions(),
                critic.num_actions(),
            ));
        }

        let buffer = ReplayBuffer::with_seed(
            ReplayBufferConfig::new(
                config.buffer_capacity,
                state_dim,
                layout.param_dim(),
                layout.num_actions(),
            ),
            config.seed,
        )?;
        let exploration = GaussianExploration::new(
            config.exploration.clone(),
            config.seed.wrapping_add(1),
        )?;

        log::info!(
            "P-DQN agent: state_dim={}, actions={}, param_dim={}, shaping={}",
            state_dim,
            layout.num_actions(),
            layout.param_dim(),
            config.shaping_mode
        );

        Ok(Self {
            target_actor: actor.valid(),
            target_critic: critic.valid(),
            actor,
            critic,
            actor_optimizer,
            critic_optimizer,
            buffer,
            layout,
            config,
            exploration,
            device,
            state_dim,
            learn_steps: 0,
        })
    }

    // ========================================================================
    // Acting
    // ========================================================================

    /// Pick a discrete action and its parameters for `state`.
    pub fn select_action(&mut self, state: &[f32], explore: bool) -> Result<ActionSelection> {
        self.select_action_masked(state, None, explore)
    }

    /// Like `select_action`, restricted to actions whose mask entry is `true`.
    pub fn select_action_masked(
        &mut self,
        state: &[f32],
        mask: Option<&[bool]>,
        explore: bool,
    ) -> Result<ActionSelection> {
        if state.len() != self.state_dim {
            return Err(PdqnError::shape("state", self.state_dim, state.len()));
        }
        if let Some(mask) = mask {
            if mask.len() != self.layout.num_actions() {
                return Err(PdqnError::shape(
                    "action mask",
                    self.layout.num_actions(),
                    mask.len(),
                ));
            }
            if !mask.iter().any(|&allowed| allowed) {
                return Err(PdqnError::InvalidConfig(
                    "action mask forbids every action".into(),
                ));
            }
        }

        let actor = self.actor.valid();
        let critic = self.critic.valid();

        let states = Tensor::<B::InnerBackend, 1>::from_floats(state, &self.device)
            .reshape([1, self.state_dim]);
        let all_params_tensor = actor.forward(states.clone());
        let q_tensor = critic.forward(states, all_params_tensor.clone());

        let all_params = tensor_to_vec(all_params_tensor)?;
        let q_values = tensor_to_vec(q_tensor)?;
        if !all_finite(&q_values) {
            return Err(PdqnError::NonFinite("q values"));
        }

        let action = greedy_action_masked(&q_values, mask)
            .ok_or_else(|| PdqnError::InvalidConfig("no action available".into()))?;
        let mut params = self.layout.slice(&all_params, action)?.to_vec();
        if explore {
            self.exploration.apply(&mut params, self.layout.bounds(action));
        }

        Ok(ActionSelection {
            action,
            params,
            all_params,
            q_values,
        })
    }

    // ========================================================================
    // Experience
    // ========================================================================

    /// Store a transition in the replay buffer.
    pub fn add(&mut self, transition: Transition) -> Result<()> {
        self.buffer.add(transition)
    }

    /// Whether the buffer holds enough transitions to learn.
    pub fn can_learn(&self) -> bool {
        self.buffer.size() >= self.config.learning_starts()
    }

    // ========================================================================
    // Learning
    // ========================================================================

    /// Sample a batch and run one training step.
    pub fn learn(&mut self) -> Result<LearnStats> {
        let batch = self.buffer.sample(self.config.batch_size)?;
        self.learn_batch(&batch)
    }

    /// Run one training step on `batch`.
    ///
    /// On error nothing is swapped in: the live and target networks keep their
    /// previous weights.
    pub fn learn_batch(&mut self, batch: &TransitionBatch) -> Result<LearnStats> {
        if batch.is_empty() {
            return Err(PdqnError::InsufficientData {
                requested: self.config.batch_size,
                available: 0,
            });
        }
        if batch.state_dim != self.state_dim {
            return Err(PdqnError::shape("batch state", self.state_dim, batch.state_dim));
        }
        if batch.param_dim != self.layout.param_dim() {
            return Err(PdqnError::shape(
                "batch params",
                self.layout.param_dim(),
                batch.param_dim,
            ));
        }

        let device = self.device.clone();
        let batch_size = batch.batch_size;
        let param_dim = batch.param_dim;
        let actions = batch.action_indices();

        // ====================================================================
        // TD TARGETS (inner backend, no graph)
        // ====================================================================

        let next_states = Tensor::<B::InnerBackend, 1>::from_floats(
            batch.next_states.as_slice(),
            &device,
        )
        .reshape([batch_size, self.state_dim]);
        let rewards = Tensor::<B::InnerBackend, 1>::from_floats(batch.rewards.as_slice(), &device);
        let done = Tensor::<B::InnerBackend, 1>::from_floats(batch.done_mask().as_slice(), &device);

        let next_params = self.target_actor.forward(next_states.clone());
        let next_q = self.target_critic.forward(next_states, next_params);
        let targets = td_targets(rewards, done, next_q, self.config.gamma);

        let target_values = tensor_to_vec(targets.clone())?;
        if !all_finite(&target_values) {
            return Err(PdqnError::NonFinite("td target"));
        }
        let mean_target = mean(&target_values);
        let targets = Tensor::<B, 1>::from_inner(targets);

        // ====================================================================
        // CRITIC UPDATE
        // ====================================================================

        let states = Tensor::<B, 1>::from_floats(batch.states.as_slice(), &device)
            .reshape([batch_size, self.state_dim]);
        let stored_params = Tensor::<B, 1>::from_floats(batch.action_params.as_slice(), &device)
            .reshape([batch_size, param_dim]);

        let critic = self.critic.clone();
        let q_values = critic.forward(states.clone(), stored_params);
        let q_taken = gather_q_values(q_values, &actions, &device);
        let mean_q = tensor_to_scalar(q_taken.clone().mean())?;

        let critic_loss = (q_taken - targets).powf_scalar(2.0).mean();
        let critic_loss_val = tensor_to_scalar(critic_loss.clone())?;
        if !critic_loss_val.is_finite() {
            return Err(PdqnError::NonFinite("critic loss"));
        }

        let critic_grads = critic_loss.backward();
        let critic_grads = GradientsParams::from_grads(critic_grads, &critic);
        let critic = self
            .critic_optimizer
            .step(self.config.critic_lr, critic, critic_grads);

        // ====================================================================
        // ACTOR UPDATE
        // ====================================================================

        let actor = self.actor.clone();
        let fresh_params = actor.forward(states.clone());

        // dQ/dparams through a detached copy, so only the critic graph is walked
        let probe = fresh_params.clone().detach().require_grad();
        let probe_q = critic.forward(states, probe.clone());
        let objective = match self.config.shaping_mode {
            GradientShapingMode::Summed => probe_q.sum_dim(1).mean(),
            GradientShapingMode::Indexed => gather_q_values(probe_q, &actions, &device).mean(),
        };
        let probe_grads = objective.backward();
        let mut dq_dp = probe.grad(&probe_grads).ok_or(PdqnError::MissingGradient)?;

        if self.config.invert_gradients {
            dq_dp = invert_gradients(dq_dp, fresh_params.clone().inner(), &self.layout)?;
        }
        if self.config.zero_index_gradients {
            dq_dp = zero_index_gradients(dq_dp, &batch.actions, &self.layout)?;
        }
        if !all_finite(&tensor_to_vec(dq_dp.clone())?) {
            return Err(PdqnError::NonFinite("parameter gradient"));
        }

        let shaped = Tensor::<B, 2>::from_inner(dq_dp);
        let actor_loss = (shaped * fresh_params).sum_dim(1).mean().neg();
        let actor_loss_val = tensor_to_scalar(actor_loss.clone())?;
        if !actor_loss_val.is_finite() {
            return Err(PdqnError::NonFinite("actor loss"));
        }

        let actor_grads = actor_loss.backward();
        let actor_grads = GradientsParams::from_grads(actor_grads, &actor);
        let actor = self
            .actor_optimizer
            .step(self.config.actor_lr, actor, actor_grads);

        // ====================================================================
        // COMMIT + TARGET UPDATE
        // ====================================================================

        let tau = self.config.tau;
        let target_actor = soft_update(&actor.valid(), self.target_actor.clone(), tau)?;
        let target_critic = soft_update(&critic.valid(), self.target_critic.clone(), tau)?;
        self.target_actor = target_actor;
        self.target_critic = target_critic;
        self.actor = actor;
        self.critic = critic;
        self.learn_steps += 1;

        let stats = LearnStats {
            critic_loss: critic_loss_val,
            actor_loss: actor_loss_val,
            mean_q,
            mean_target,
        };
        log::debug!("learn step {}: {}", self.learn_steps, stats.format());
        Ok(stats)
    }

    /// Advance the exploration σ schedule by one step.
    pub fn decay_exploration(&mut self) {
        self.exploration.decay();
    }

    // ========================================================================
    // Checkpointing
    // ========================================================================

    /// Save networks, optimizer states and metadata into `dir`.
    pub fn save(&self, dir: &Path, step: usize, metric: Option<f32>) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(checkpoint::CheckpointError::from)?;

        checkpoint::save_module::<B, _>(&self.actor, &dir.join(ACTOR_FILE))?;
        checkpoint::save_module::<B, _>(&self.critic, &dir.join(CRITIC_FILE))?;
        checkpoint::save_module::<B::InnerBackend, _>(
            &self.target_actor,
            &dir.join(ACTOR_TARGET_FILE),
        )?;
        checkpoint::save_module::<B::InnerBackend, _>(
            &self.target_critic,
            &dir.join(CRITIC_TARGET_FILE),
        )?;
        checkpoint::save_record::<B, _>(
            self.actor_optimizer.to_record(),
            &dir.join(ACTOR_OPTIM_FILE),
        )?;
        checkpoint::save_record::<B, _>(
            self.critic_optimizer.to_record(),
            &dir.join(CRITIC_OPTIM_FILE),
        )?;

        let meta = CheckpointMeta {
            step,
            learn_steps: self.learn_steps,
            sigma: self.exploration.sigma().to_vec(),
            decay_calls: self.exploration.decay_calls(),
            metric,
        };
        checkpoint::write_meta(dir, &meta)?;
        log::info!("saved checkpoint at step {} to {}", step, dir.display());
        Ok(())
    }

    /// Restore everything written by `save`.
    ///
    /// Consumes the agent because burn's record loading moves the modules.
    pub fn load(mut self, dir: &Path) -> Result<(Self, CheckpointMeta)> {
        let meta = checkpoint::read_meta(dir)?;
        let device = self.device.clone();

        self.actor = checkpoint::load_module::<B, _>(self.actor, &dir.join(ACTOR_FILE), &device)?;
        self.critic =
            checkpoint::load_module::<B, _>(self.critic, &dir.join(CRITIC_FILE), &device)?;
        self.target_actor = checkpoint::load_module::<B::InnerBackend, _>(
            self.target_actor,
            &dir.join(ACTOR_TARGET_FILE),
            &device,
        )?;
        self.target_critic = checkpoint::load_module::<B::InnerBackend, _>(
            self.target_critic,
            &dir.join(CRITIC_TARGET_FILE),
            &device,
        )?;

        let actor_record =
            checkpoint::load_record::<B, AO::Record>(&dir.join(ACTOR_OPTIM_FILE), &device)?;
        self.actor_optimizer = self.actor_optimizer.load_record(actor_record);
        let critic_record =
            checkpoint::load_record::<B, CO::Record>(&dir.join(CRITIC_OPTIM_FILE), &device)?;
        self.critic_optimizer = self.critic_optimizer.load_record(critic_record);

        self.exploration.set_sigma(meta.sigma.clone())?;
        self.exploration.set_decay_calls(meta.decay_calls);
        self.learn_steps = meta.learn_steps;

        log::info!("loaded checkpoint from {} (step {})", dir.display(), meta.step);
        Ok((self, meta))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Live actor.
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Live critic.
    pub fn critic(&self) -> &Critic {
        &self.critic
    }

    /// Target actor.
    pub fn target_actor(&self) -> &Actor::InnerModule {
        &self.target_actor
    }

    /// Target critic.
    pub fn target_critic(&self) -> &Critic::InnerModule {
        &self.target_critic
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn layout(&self) -> &ActionParamLayout {
        &self.layout
    }

    pub fn config(&self) -> &PDQNConfig {
        &self.config
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    /// Current exploration σ per channel.
    pub fn sigma(&self) -> &[f32] {
        self.exploration.sigma()
    }

    /// Number of completed training steps.
    pub fn learn_steps(&self) -> usize {
        self.learn_steps
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

// ============================================================================
// Host Readback Helpers
// ============================================================================

/// Read a tensor back to the host as `f32`.
fn tensor_to_vec<TB: Backend, const D: usize>(tensor: Tensor<TB, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PdqnError::Tensor(format!("{:?}", e)))
}

/// Extract scalar from 1D tensor.
fn tensor_to_scalar<TB: Backend>(tensor: Tensor<TB, 1>) -> Result<f32> {
    tensor_to_vec(tensor)?
        .first()
        .copied()
        .ok_or_else(|| PdqnError::Tensor("empty tensor".into()))
}

fn all_finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
