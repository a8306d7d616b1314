//! Core types and abstractions for P-DQN.

pub mod action_layout;
pub mod delay_buffer;
pub mod replay_buffer;
pub mod target_network;
pub mod transition;

pub use action_layout::{ActionParamLayout, ParamBounds};
pub use delay_buffer::DelayBuffer;
pub use replay_buffer::{ReplayBuffer, ReplayBufferConfig};
pub use target_network::{hard_copy, param_values, soft_update};
pub use transition::{Transition, TransitionBatch};
