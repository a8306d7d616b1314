//! # P-DQN: Parametrized-Action Deep Q-Learning for Lane Changing
//!
//! Learns a hybrid discrete/continuous driving policy: a discrete maneuver
//! (change-left, lane-follow, change-right) together with the continuous
//! control (steer, throttle/brake) attached to that maneuver.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                           PDQNAgent                               │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  LaneObservation ─► compress ─► state [S]                         │
//! │                                   │                               │
//! │                     ┌─────────────┴────────────┐                  │
//! │                     ▼                          ▼                  │
//! │              ┌────────────┐  all_params  ┌────────────┐           │
//! │              │   Actor    │─────────────►│   Critic   │─► Q [A]   │
//! │              └────────────┘              └────────────┘           │
//! │                     │ Polyak (τ)               │ Polyak (τ)       │
//! │              ┌────────────┐              ┌────────────┐           │
//! │              │Target Actor│              │Target Crit.│           │
//! │              └────────────┘              └────────────┘           │
//! │                                                                   │
//! │  DelayBuffer ─► ReplayBuffer ─► batch ─► learn()                  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdqn::{create_optimizers, ActionParamLayout, PDQNAgent, PDQNConfig};
//! use pdqn::nn::{LaneActorNet, LaneCriticNet, LaneNetConfig};
//!
//! let config = PDQNConfig::lane_change();
//! let layout = ActionParamLayout::lane_change();
//! let net = LaneNetConfig::default();
//! let actor = LaneActorNet::<B>::new(&net, layout.param_dim(), &device);
//! let critic = LaneCriticNet::<B>::new(&net, layout.param_dim(), layout.num_actions(), &device);
//! let (actor_opt, critic_opt) = create_optimizers::<B, _, _>(&config);
//!
//! let mut agent = PDQNAgent::new(actor, critic, actor_opt, critic_opt, layout, config, device)?;
//! let mut trainer = Trainer::new(TrainerConfig::new(500))?;
//! trainer.run(&mut agent, &mut env, &mut ConsoleLogger::new(10))?;
//! ```

pub mod algorithms;
pub mod checkpoint;
pub mod core;
pub mod environment;
pub mod error;
pub mod metrics;
pub mod nn;
pub mod observation;
pub mod runners;

// Re-export commonly used types
pub use core::action_layout::{ActionParamLayout, ParamBounds};
pub use core::delay_buffer::DelayBuffer;
pub use core::replay_buffer::{ReplayBuffer, ReplayBufferConfig};
pub use core::target_network::soft_update;
pub use core::transition::{Transition, TransitionBatch};

pub use error::{PdqnError, Result};

// P-DQN algorithm
pub use algorithms::pdqn::{
    create_optimizers, ActionSelection, ExplorationConfig, GradientShapingMode, LearnStats,
    PDQNAgent, PDQNConfig, ParamActor, ParamCritic,
};

// Observations and environment contract
pub use observation::{
    compress, EgoState, LaneObservation, LaneView, ObservationSpace, VehicleState, Waypoint,
};
pub use environment::{
    ActionBound, EnvStep, GuidedAction, LaneChangeEnv, Maneuver, StepInfo, VehicleControl,
};

pub use runners::{Trainer, TrainerConfig, TrainingSummary};

pub use metrics::logger::{
    CSVLogger, ConsoleLogger, MemoryLogger, MetricsLogger, MultiLogger, TrainingSnapshot,
};

// Model checkpointing
pub use checkpoint::{CheckpointError, CheckpointMeta, Checkpointer, CheckpointerConfig};
