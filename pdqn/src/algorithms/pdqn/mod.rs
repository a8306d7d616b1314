//! P-DQN (Parametrized Deep Q-Network) for hybrid discrete/continuous actions.
//!
//! Every discrete action `a` owns a slice of continuous parameters. A
//! deterministic actor proposes the parameters for all actions at once; a
//! multi-output critic scores every action given those parameters; the agent
//! executes the argmax action with its slice.
//!
//! # Architecture
//!
//! ```text
//! Actor  π(s)        → all_params [P]       (tanh, one slice per action)
//! Critic Q(s, all)   → q_values   [A]
//! Actor target π'    frozen copy, Polyak-averaged
//! Critic target Q'   frozen copy, Polyak-averaged
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use pdqn::algorithms::pdqn::{create_optimizers, PDQNAgent, PDQNConfig};
//! use pdqn::nn::{LaneActorNet, LaneCriticNet, LaneNetConfig};
//!
//! let config = PDQNConfig::lane_change();
//! let layout = ActionParamLayout::lane_change();
//! let net = LaneNetConfig::default();
//! let actor = LaneActorNet::<B>::new(&net, layout.param_dim(), &device);
//! let critic = LaneCriticNet::<B>::new(&net, layout.param_dim(), layout.num_actions(), &device);
//! let (actor_opt, critic_opt) = create_optimizers::<B, _, _>(&config);
//! let mut agent = PDQNAgent::new(actor, critic, actor_opt, critic_opt, layout, config, device)?;
//!
//! let selection = agent.select_action(&state, true)?;
//! ```

pub mod actor;
pub mod agent;
pub mod config;
pub mod critic;
pub mod exploration;
pub mod gradient_shaping;


// Re-exports
pub use actor::ParamActor;
pub use agent::{create_optimizers, ActionSelection, PDQNAgent};
pub use config::{LearnStats, PDQNConfig};
pub use critic::{gather_q_values, greedy_action, greedy_action_masked, td_targets, ParamCritic};
pub use exploration::{ExplorationConfig, GaussianExploration};
pub use gradient_shaping::{
    action_slice_mask, invert_gradients, zero_index_gradients, GradientShapingMode,
};
