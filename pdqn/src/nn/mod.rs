//! Neural network modules for the lane-change agent.
//!
//! - [`orthogonal`]: Orthogonally initialized linear layer
//! - [`networks`]: Default lane-structured actor and critic

pub mod networks;
pub mod orthogonal;

pub use networks::{LaneActorNet, LaneCriticNet, LaneEncoder, LaneNetConfig};
pub use orthogonal::{orthogonal_weights, OrthogonalLinear, OrthogonalLinearConfig};
