//! Single-environment P-DQN training loop.
//!
//! ```text
//! reset ─► compress ─► select_action ─► env.step ─┬─► (effective?) ─► delay buffer ─► replay
//!   ▲                                             ├─► learn (every `learn_every` steps)
//!   │                                             ├─► σ decay (agent-controlled steps)
//!   └──────────── episode end: flush delay ◄──────┴─► checkpoints
//! ```
//!
//! Steps the rule-based controller drove are stored with the controller's
//! maneuver, its parameters written into the actor's full parameter vector.

use std::path::PathBuf;

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::algorithms::pdqn::{LearnStats, PDQNAgent, ParamActor, ParamCritic};
use crate::checkpoint::{Checkpointer, CheckpointerConfig};
use crate::core::delay_buffer::DelayBuffer;
use crate::core::transition::Transition;
use crate::environment::LaneChangeEnv;
use crate::error::{PdqnError, Result};
use crate::metrics::{MetricsLogger, TrainingSnapshot};

/// Name of the checkpoint taken at the end of pre-training.
pub const PRETRAIN_CHECKPOINT: &str = "pretrain";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Episodes to run.
    pub episodes: usize,
    /// Step limit per episode (the environment may end it sooner).
    pub max_steps_per_episode: usize,
    /// Environment steps between learning steps.
    pub learn_every: usize,
    /// Steps a transition waits for its follow-up impact term.
    pub delay: usize,
    /// Factor applied to the environment's impact term.
    pub impact_scale: f32,
    /// Add exploration noise to the executed parameters.
    pub explore: bool,
    /// Save a `pretrain` checkpoint at this environment step.
    pub pretrain_checkpoint_step: Option<usize>,
    /// Periodic checkpointing; `None` disables it.
    pub checkpoint: Option<CheckpointerConfig>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            episodes: 500,
            max_steps_per_episode: 2_000,
            learn_every: 1,
            delay: 1,
            impact_scale: 1.0 / 9.0,
            explore: true,
            pretrain_checkpoint_step: None,
            checkpoint: None,
        }
    }
}

impl TrainerConfig {
    /// Create a config running `episodes` episodes.
    pub fn new(episodes: usize) -> Self {
        Self {
            episodes,
            ..Default::default()
        }
    }

    pub fn with_max_steps_per_episode(mut self, steps: usize) -> Self {
        self.max_steps_per_episode = steps;
        self
    }

    pub fn with_learn_every(mut self, steps: usize) -> Self {
        self.learn_every = steps;
        self
    }

    pub fn with_delay(mut self, delay: usize) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_impact_scale(mut self, scale: f32) -> Self {
        self.impact_scale = scale;
        self
    }

    pub fn with_explore(mut self, explore: bool) -> Self {
        self.explore = explore;
        self
    }

    pub fn with_pretrain_checkpoint_step(mut self, step: Option<usize>) -> Self {
        self.pretrain_checkpoint_step = step;
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointerConfig) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Directory checkpoints are written to, if any.
    pub fn checkpoint_dir(&self) -> Option<&PathBuf> {
        self.checkpoint.as_ref().map(|c| &c.checkpoint_dir)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_steps_per_episode == 0 {
            return Err(PdqnError::InvalidConfig(
                "max_steps_per_episode must be positive".into(),
            ));
        }
        if self.learn_every == 0 {
            return Err(PdqnError::InvalidConfig("learn_every must be positive".into()));
        }
        if !self.impact_scale.is_finite() {
            return Err(PdqnError::InvalidConfig("impact_scale must be finite".into()));
        }
        if self.pretrain_checkpoint_step.is_some() && self.checkpoint_dir().is_none() {
            return Err(PdqnError::InvalidConfig(
                "pretrain checkpoint requires a checkpoint directory".into(),
            ));
        }
        Ok(())
    }
}

/// Totals of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    pub episodes: usize,
    pub env_steps: usize,
    pub learn_steps: usize,
    /// Stored transitions (after the delay buffer).
    pub stored: usize,
    /// Reward of every episode, in order.
    pub episode_rewards: Vec<f32>,
    pub last_stats: Option<LearnStats>,
}

impl TrainingSummary {
    /// Mean reward over the last `n` episodes.
    pub fn recent_mean_reward(&self, n: usize) -> f32 {
        let n = n.min(self.episode_rewards.len());
        if n == 0 {
            return 0.0;
        }
        let tail = &self.episode_rewards[self.episode_rewards.len() - n..];
        tail.iter().sum::<f32>() / n as f32
    }
}

// ============================================================================
// Trainer
// ============================================================================

/// Drives an agent against one environment.
pub struct Trainer {
    config: TrainerConfig,
    checkpointer: Option<Checkpointer>,
    delay: DelayBuffer,
    summary: TrainingSummary,
}

impl Trainer {
    /// Create a trainer; creates the checkpoint directory when configured.
    pub fn new(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        let checkpointer = match &config.checkpoint {
            Some(c) => Some(Checkpointer::new(c.clone())?),
            None => None,
        };
        Ok(Self {
            delay: DelayBuffer::new(config.delay),
            config,
            checkpointer,
            summary: TrainingSummary::default(),
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Totals so far.
    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }

    /// Run `config.episodes` episodes.
    pub fn run<B, Actor, Critic, AO, CO, E>(
        &mut self,
        agent: &mut PDQNAgent<B, Actor, Critic, AO, CO>,
        env: &mut E,
        logger: &mut dyn MetricsLogger,
    ) -> Result<TrainingSummary>
    where
        B: AutodiffBackend,
        Actor: ParamActor<B> + AutodiffModule<B>,
        Actor::InnerModule: ParamActor<B::InnerBackend>,
        Critic: ParamCritic<B> + AutodiffModule<B>,
        Critic::InnerModule: ParamCritic<B::InnerBackend>,
        AO: Optimizer<Actor, B>,
        CO: Optimizer<Critic, B>,
        E: LaneChangeEnv,
    {
        let space = env.observation_space();
        space.validate()?;
        if space.state_dim() != agent.state_dim() {
            return Err(PdqnError::shape("observation space", agent.state_dim(), space.state_dim()));
        }

        println!("=== P-DQN Training ===");
        println!(
            "Episodes: {}, Max steps: {}, Learn every: {}, Delay: {}",
            self.config.episodes,
            self.config.max_steps_per_episode,
            self.config.learn_every,
            self.config.delay
        );
        println!(
            "Buffer: {}, Learning starts: {}, Batch: {}",
            agent.config().buffer_capacity,
            agent.config().learning_starts(),
            agent.config().batch_size
        );

        for _ in 0..self.config.episodes {
            self.run_episode(agent, env, logger)?;
        }
        logger.flush();

        log::info!(
            "training finished: {} episodes, {} env steps, {} learn steps",
            self.summary.episodes,
            self.summary.env_steps,
            self.summary.learn_steps
        );
        Ok(self.summary.clone())
    }

    /// Run one episode and return its reward.
    pub fn run_episode<B, Actor, Critic, AO, CO, E>(
        &mut self,
        agent: &mut PDQNAgent<B, Actor, Critic, AO, CO>,
        env: &mut E,
        logger: &mut dyn MetricsLogger,
    ) -> Result<f32>
    where
        B: AutodiffBackend,
        Actor: ParamActor<B> + AutodiffModule<B>,
        Actor::InnerModule: ParamActor<B::InnerBackend>,
        Critic: ParamCritic<B> + AutodiffModule<B>,
        Critic::InnerModule: ParamCritic<B::InnerBackend>,
        AO: Optimizer<Actor, B>,
        CO: Optimizer<Critic, B>,
        E: LaneChangeEnv,
    {
        let space = env.observation_space();
        let mut state = env.reset()?.compress(&space)?;
        self.delay.clear();

        let mut episode_reward = 0.0;
        let mut episode_length = 0;

        for _ in 0..self.config.max_steps_per_episode {
            let mask = env.action_mask();
            let selection = agent.select_action_masked(&state, mask.as_deref(), self.config.explore)?;
            let step = env.step(selection.action, &selection.params)?;
            let next_state = step.observation.compress(&space)?;

            self.summary.env_steps += 1;
            episode_length += 1;
            episode_reward += step.reward;

            if step.info.effective {
                let (action, all_params) = match step.info.guided {
                    Some(guided) => {
                        let mut all_params = selection.all_params.clone();
                        agent
                            .layout()
                            .fill(&mut all_params, guided.action, &guided.params())?;
                        (guided.action, all_params)
                    }
                    None => (selection.action, selection.all_params.clone()),
                };
                let transition = Transition::new(
                    state,
                    action,
                    all_params,
                    step.reward,
                    next_state.clone(),
                    step.truncated,
                    step.done,
                );
                let impact = step.info.impact.unwrap_or(0.0) * self.config.impact_scale;
                if let Some(ready) = self.delay.push(transition, impact) {
                    agent.add(ready)?;
                    self.summary.stored += 1;
                }

                if step.info.guided.is_none() {
                    agent.decay_exploration();
                }
            }

            if self.summary.env_steps % self.config.learn_every == 0 && agent.can_learn() {
                let stats = agent.learn()?;
                self.summary.learn_steps = agent.learn_steps();
                self.summary.last_stats = Some(stats);
            }

            self.maybe_checkpoint(agent)?;

            state = next_state;
            if step.episode_end() {
                break;
            }
        }

        let pending = self.delay.flush();
        if !pending.is_empty() {
            log::debug!("episode end: storing {} pending transitions without impact", pending.len());
        }
        for transition in pending {
            agent.add(transition)?;
            self.summary.stored += 1;
        }

        self.summary.episodes += 1;
        self.summary.episode_rewards.push(episode_reward);

        let snapshot = TrainingSnapshot::new(
            self.summary.episodes,
            self.summary.env_steps,
            episode_reward,
            episode_length,
        )
        .with_learn_stats(agent.learn_steps(), self.summary.last_stats.as_ref())
        .with_sigma(agent.sigma());
        logger.log(&snapshot);

        log::info!(
            "episode {}: reward {:.3}, length {}, buffer {}",
            self.summary.episodes,
            episode_reward,
            episode_length,
            agent.buffer().size()
        );
        Ok(episode_reward)
    }

    fn maybe_checkpoint<B, Actor, Critic, AO, CO>(
        &mut self,
        agent: &PDQNAgent<B, Actor, Critic, AO, CO>,
    ) -> Result<()>
    where
        B: AutodiffBackend,
        Actor: ParamActor<B> + AutodiffModule<B>,
        Actor::InnerModule: ParamActor<B::InnerBackend>,
        Critic: ParamCritic<B> + AutodiffModule<B>,
        Critic::InnerModule: ParamCritic<B::InnerBackend>,
        AO: Optimizer<Actor, B>,
        CO: Optimizer<Critic, B>,
    {
        let Some(checkpointer) = self.checkpointer.as_mut() else {
            return Ok(());
        };
        let step = self.summary.env_steps;
        let metric = Some(self.summary.recent_mean_reward(100));

        if self.config.pretrain_checkpoint_step == Some(step) {
            agent.save(&checkpointer.named_dir(PRETRAIN_CHECKPOINT), step, metric)?;
        }
        if checkpointer.should_save(step) {
            agent.save(&checkpointer.step_dir(step), step, metric)?;
            checkpointer.register(step, metric)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::pdqn::{create_optimizers, PDQNConfig};
    use crate::core::action_layout::ActionParamLayout;
    use crate::environment::{ActionBound, EnvStep, GuidedAction, StepInfo};
    use crate::metrics::MemoryLogger;
    use crate::nn::{LaneActorNet, LaneCriticNet, LaneNetConfig};
    use crate::observation::{
        EgoState, LaneObservation, LaneView, ObservationSpace, VehicleState, Waypoint,
    };
    use burn::backend::{Autodiff, NdArray};
    use tempfile::tempdir;

    type TestBackend = Autodiff<NdArray<f32>>;
    type Actor = LaneActorNet<TestBackend>;
    type Critic = LaneCriticNet<TestBackend>;

    const EPISODE_LENGTH: usize = 5;

    /// Fixed-length episodes. Step 2 of each episode is guided, step 3 is not
    /// recorded, every step reports an impact of 0.9.
    struct MockEnv {
        space: ObservationSpace,
        t: usize,
    }

    impl MockEnv {
        fn new(space: ObservationSpace) -> Self {
            Self { space, t: 0 }
        }

        fn observation(&self) -> LaneObservation {
            let x = self.t as f32 * 0.1;
            let lane = LaneView::new(
                (0..self.space.waypoints)
                    .map(|i| Waypoint::new(vec![x + i as f32; self.space.waypoint_features]))
                    .collect(),
                VehicleState::new(0.5, x, 0.0),
                VehicleState::absent(),
            );
            LaneObservation {
                left: LaneView::missing(&lane),
                center: lane.clone(),
                right: lane,
                ego: EgoState {
                    speed_long: x,
                    ..Default::default()
                },
            }
        }
    }

    impl LaneChangeEnv for MockEnv {
        fn reset(&mut self) -> Result<LaneObservation> {
            self.t = 0;
            Ok(self.observation())
        }

        fn step(&mut self, _action: usize, params: &[f32]) -> Result<EnvStep> {
            if params.len() != 2 {
                return Err(PdqnError::Environment("expected two parameters".into()));
            }
            self.t += 1;
            let guided = (self.t == 2).then(|| GuidedAction::from_control(1, 0.25, 0.0, 0.5));
            Ok(EnvStep {
                observation: self.observation(),
                reward: 1.0,
                truncated: false,
                done: self.t >= EPISODE_LENGTH,
                info: StepInfo {
                    impact: Some(0.9),
                    guided,
                    effective: self.t != 3,
                },
            })
        }

        fn observation_space(&self) -> ObservationSpace {
            self.space
        }

        fn action_bound(&self) -> ActionBound {
            ActionBound::default()
        }

        fn action_mask(&self) -> Option<Vec<bool>> {
            Some(vec![false, true, true])
        }
    }

    fn space() -> ObservationSpace {
        ObservationSpace::with_waypoints(2)
    }

    fn make_agent() -> PDQNAgent<
        TestBackend,
        Actor,
        Critic,
        impl Optimizer<Actor, TestBackend>,
        impl Optimizer<Critic, TestBackend>,
    > {
        let device = Default::default();
        let config = PDQNConfig::small()
            .with_batch_size(4)
            .with_min_buffer_size(6);
        let layout = ActionParamLayout::lane_change();
        let net = LaneNetConfig::tiny(space());
        let actor = LaneActorNet::new(&net, layout.param_dim(), &device);
        let critic = LaneCriticNet::new(&net, layout.param_dim(), layout.num_actions(), &device);
        let (actor_opt, critic_opt) = create_optimizers::<TestBackend, Actor, Critic>(&config);
        PDQNAgent::new(actor, critic, actor_opt, critic_opt, layout, config, device).unwrap()
    }

    #[test]
    fn test_episode_loop_records_effective_steps() {
        let mut agent = make_agent();
        let mut env = MockEnv::new(space());
        let mut logger = MemoryLogger::default();
        let mut trainer = Trainer::new(TrainerConfig::new(2)).unwrap();

        let summary = trainer.run(&mut agent, &mut env, &mut logger).unwrap();

        assert_eq!(summary.episodes, 2);
        assert_eq!(summary.env_steps, 2 * EPISODE_LENGTH);
        // step 3 of each episode is not effective
        assert_eq!(summary.stored, 2 * (EPISODE_LENGTH - 1));
        assert_eq!(agent.buffer().size(), 8);
        assert_eq!(summary.episode_rewards, vec![5.0, 5.0]);
        assert_eq!(logger.snapshots.len(), 2);
        assert_eq!(logger.snapshots[1].episode, 2);
    }

    #[test]
    fn test_delayed_impact_and_guided_actions() {
        let mut agent = make_agent();
        let mut env = MockEnv::new(space());
        let mut logger = MemoryLogger::default();
        let mut trainer = Trainer::new(TrainerConfig::new(1)).unwrap();
        trainer.run(&mut agent, &mut env, &mut logger).unwrap();

        let stored: Vec<&Transition> = agent.buffer().iter().collect();
        assert_eq!(stored.len(), 4);

        // all but the flushed last transition carry the next step's impact
        for t in &stored[..3] {
            assert!((t.reward - 1.1).abs() < 1e-6);
        }
        assert!((stored[3].reward - 1.0).abs() < 1e-6);
        assert!(stored[3].done);

        // the guided step keeps the controller's maneuver and parameters
        let guided = stored[1];
        assert_eq!(guided.action, 1);
        assert_eq!(&guided.action_params[2..4], &[0.25, -0.5]);

        // masked change-left is never chosen by the agent
        assert!(stored.iter().all(|t| t.action != 0));
    }

    #[test]
    fn test_learning_starts_after_min_buffer() {
        let mut agent = make_agent();
        let mut env = MockEnv::new(space());
        let mut logger = MemoryLogger::default();
        let mut trainer = Trainer::new(TrainerConfig::new(3)).unwrap();

        let summary = trainer.run(&mut agent, &mut env, &mut logger).unwrap();

        assert!(summary.learn_steps > 0);
        assert_eq!(summary.learn_steps, agent.learn_steps());
        assert!(summary.last_stats.is_some());
        assert_eq!(logger.snapshots[0].learn_steps, 0);
    }

    #[test]
    fn test_checkpoints_written() {
        let dir = tempdir().unwrap();
        let mut agent = make_agent();
        let mut env = MockEnv::new(space());
        let mut logger = MemoryLogger::default();
        let config = TrainerConfig::new(2)
            .with_pretrain_checkpoint_step(Some(3))
            .with_checkpoint(
                CheckpointerConfig::new(dir.path())
                    .with_save_interval(EPISODE_LENGTH)
                    .with_keep_last_n(1),
            );
        assert_eq!(config.checkpoint_dir(), Some(&dir.path().to_path_buf()));
        let mut trainer = Trainer::new(config).unwrap();
        trainer.run(&mut agent, &mut env, &mut logger).unwrap();

        assert!(dir.path().join(PRETRAIN_CHECKPOINT).join("meta.json").exists());
        assert!(!dir.path().join("checkpoint_00000005").exists());
        assert!(dir.path().join("checkpoint_00000010").join("meta.json").exists());
    }

    #[test]
    fn test_rejects_mismatched_observation_space() {
        let mut agent = make_agent();
        let mut env = MockEnv::new(ObservationSpace::with_waypoints(3));
        let mut logger = MemoryLogger::default();
        let mut trainer = Trainer::new(TrainerConfig::new(1)).unwrap();

        assert!(matches!(
            trainer.run(&mut agent, &mut env, &mut logger),
            Err(PdqnError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainerConfig::default().validate().is_ok());
        assert!(TrainerConfig::new(1).with_learn_every(0).validate().is_err());
        assert!(TrainerConfig::new(1)
            .with_pretrain_checkpoint_step(Some(10))
            .validate()
            .is_err());
    }

    #[test]
    fn test_recent_mean_reward() {
        let summary = TrainingSummary {
            episode_rewards: vec![1.0, 2.0, 3.0, 4.0],
            ..Default::default()
        };
        assert!((summary.recent_mean_reward(2) - 3.5).abs() < 1e-6);
        assert!((summary.recent_mean_reward(10) - 2.5).abs() < 1e-6);
        assert_eq!(TrainingSummary::default().recent_mean_reward(5), 0.0);
    }
}
