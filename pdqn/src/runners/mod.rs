//! Training loop.
//!
//! [`Trainer`] connects a [`PDQNAgent`](crate::algorithms::pdqn::PDQNAgent)
//! to a [`LaneChangeEnv`](crate::environment::LaneChangeEnv): it compresses
//! observations, routes transitions through the impact delay buffer, triggers
//! learning and σ decay, writes checkpoints and reports per-episode metrics.

pub mod trainer;

pub use trainer::{Trainer, TrainerConfig, TrainingSummary, PRETRAIN_CHECKPOINT};
