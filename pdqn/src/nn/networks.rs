//! Default lane-structured actor and critic networks.
//!
//! Both networks split the compressed state into its three lane blocks and the
//! ego block. Each lane block goes through its own encoder:
//!
//! ```text
//! lane block [waypoints | front, rear]
//!   waypoints ──► Linear ─ReLU─┐
//!   vehicles  ──► Linear ─ReLU─┴─ cat ──► Linear ─ReLU──► lane features
//! ```
//!
//! Actor:  `cat(left, center, right, ego) ─► fc ─ReLU─► head ─tanh─► params`
//!
//! Critic: `cat(left, center, right, ego, params) ─► fc ─ReLU─► head ─► Q`

use burn::module::Module;
use burn::prelude::*;
use burn::tensor::activation::{relu, tanh};

use crate::algorithms::pdqn::actor::ParamActor;
use crate::algorithms::pdqn::critic::ParamCritic;
use crate::nn::orthogonal::{OrthogonalLinear, OrthogonalLinearConfig, RELU_GAIN};
use crate::observation::ObservationSpace;

/// Initial gain of the actor head: near-zero parameters at start.
const POLICY_GAIN: f64 = 0.01;
/// Initial gain of the critic head.
const VALUE_GAIN: f64 = 1.0;

// ============================================================================
// Network Configuration
// ============================================================================

/// Layer widths shared by the lane networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneNetConfig {
    /// Observation layout the networks slice the state by.
    pub space: ObservationSpace,
    /// Width of the waypoint, vehicle, critic-ego and action encoders.
    pub encoder_dim: usize,
    /// Width of each lane's fused features (and the actor's ego encoder).
    pub lane_features: usize,
    /// Width of the fused hidden layer.
    pub hidden_dim: usize,
}

impl Default for LaneNetConfig {
    fn default() -> Self {
        Self::new(ObservationSpace::default())
    }
}

impl LaneNetConfig {
    /// Default widths for `space`.
    pub fn new(space: ObservationSpace) -> Self {
        Self {
            space,
            encoder_dim: 32,
            lane_features: 64,
            hidden_dim: 256,
        }
    }

    /// Narrow layers for tests.
    pub fn tiny(space: ObservationSpace) -> Self {
        Self {
            space,
            encoder_dim: 8,
            lane_features: 8,
            hidden_dim: 16,
        }
    }

    /// Set the fused hidden width.
    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }
}

fn relu_layer<B: Backend>(d_in: usize, d_out: usize, device: &B::Device) -> OrthogonalLinear<B> {
    OrthogonalLinearConfig::new(d_in, d_out)
        .with_gain(RELU_GAIN)
        .init(device)
}

// ============================================================================
// Lane Encoder
// ============================================================================

/// Encoder for one lane block `[waypoints | front vehicle, rear vehicle]`.
#[derive(Module, Debug)]
pub struct LaneEncoder<B: Backend> {
    waypoint_encoder: OrthogonalLinear<B>,
    vehicle_encoder: OrthogonalLinear<B>,
    aggregate: OrthogonalLinear<B>,
    waypoint_dim: usize,
    vehicle_dim: usize,
}

impl<B: Backend> LaneEncoder<B> {
    pub fn new(config: &LaneNetConfig, device: &B::Device) -> Self {
        let waypoint_dim = config.space.waypoint_dim();
        let vehicle_dim = config.space.vehicle_dim();
        Self {
            waypoint_encoder: relu_layer(waypoint_dim, config.encoder_dim, device),
            vehicle_encoder: relu_layer(vehicle_dim, config.encoder_dim, device),
            aggregate: relu_layer(2 * config.encoder_dim, config.lane_features, device),
            waypoint_dim,
            vehicle_dim,
        }
    }

    /// `[batch, lane_dim] → [batch, lane_features]`
    pub fn forward(&self, lane: Tensor<B, 2>) -> Tensor<B, 2> {
        let waypoints = lane.clone().narrow(1, 0, self.waypoint_dim);
        let vehicles = lane.narrow(1, self.waypoint_dim, self.vehicle_dim);

        let waypoints = relu(self.waypoint_encoder.forward(waypoints));
        let vehicles = relu(self.vehicle_encoder.forward(vehicles));
        relu(self.aggregate.forward(Tensor::cat(vec![waypoints, vehicles], 1)))
    }
}

/// The three lane encoders plus the slicing of the state into blocks.
#[derive(Module, Debug)]
pub struct LaneStack<B: Backend> {
    left: LaneEncoder<B>,
    center: LaneEncoder<B>,
    right: LaneEncoder<B>,
    lane_dim: usize,
    ego_dim: usize,
}

impl<B: Backend> LaneStack<B> {
    fn new(config: &LaneNetConfig, device: &B::Device) -> Self {
        Self {
            left: LaneEncoder::new(config, device),
            center: LaneEncoder::new(config, device),
            right: LaneEncoder::new(config, device),
            lane_dim: config.space.lane_dim(),
            ego_dim: config.space.ego_vehicle,
        }
    }

    /// Encoded lanes (concatenated) and the raw ego block.
    fn forward(&self, states: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let d = self.lane_dim;
        let left = self.left.forward(states.clone().narrow(1, 0, d));
        let center = self.center.forward(states.clone().narrow(1, d, d));
        let right = self.right.forward(states.clone().narrow(1, 2 * d, d));
        let ego = states.narrow(1, 3 * d, self.ego_dim);
        (Tensor::cat(vec![left, center, right], 1), ego)
    }

    fn state_dim(&self) -> usize {
        3 * self.lane_dim + self.ego_dim
    }
}

// ============================================================================
// Actor Network
// ============================================================================

/// Lane-structured parameter actor.
#[derive(Module, Debug)]
pub struct LaneActorNet<B: Backend> {
    lanes: LaneStack<B>,
    ego_encoder: OrthogonalLinear<B>,
    fc: OrthogonalLinear<B>,
    head: OrthogonalLinear<B>,
    param_dim: usize,
}

impl<B: Backend> LaneActorNet<B> {
    /// Create an actor producing `param_dim` parameters.
    pub fn new(config: &LaneNetConfig, param_dim: usize, device: &B::Device) -> Self {
        let fused = 3 * config.lane_features + config.lane_features;
        Self {
            lanes: LaneStack::new(config, device),
            // Linear: the ego block is not passed through ReLU
            ego_encoder: OrthogonalLinearConfig::new(config.space.ego_vehicle, config.lane_features)
                .init(device),
            fc: relu_layer(fused, config.hidden_dim, device),
            head: OrthogonalLinearConfig::new(config.hidden_dim, param_dim)
                .with_gain(POLICY_GAIN)
                .init(device),
            param_dim,
        }
    }
}

impl<B: Backend> ParamActor<B> for LaneActorNet<B> {
    fn forward(&self, states: Tensor<B, 2>) -> Tensor<B, 2> {
        let (lanes, ego) = self.lanes.forward(states);
        let ego = self.ego_encoder.forward(ego);
        let hidden = relu(self.fc.forward(Tensor::cat(vec![lanes, ego], 1)));
        tanh(self.head.forward(hidden))
    }

    fn state_dim(&self) -> usize {
        self.lanes.state_dim()
    }

    fn param_dim(&self) -> usize {
        self.param_dim
    }
}

// ============================================================================
// Critic Network
// ============================================================================

/// Lane-structured multi-action critic.
#[derive(Module, Debug)]
pub struct LaneCriticNet<B: Backend> {
    lanes: LaneStack<B>,
    ego_encoder: OrthogonalLinear<B>,
    param_encoder: OrthogonalLinear<B>,
    fc: OrthogonalLinear<B>,
    head: OrthogonalLinear<B>,
    param_dim: usize,
    num_actions: usize,
}

impl<B: Backend> LaneCriticNet<B> {
    /// Create a critic scoring `num_actions` actions from `param_dim` parameters.
    pub fn new(
        config: &LaneNetConfig,
        param_dim: usize,
        num_actions: usize,
        device: &B::Device,
    ) -> Self {
        let fused = 3 * config.lane_features + 2 * config.encoder_dim;
        Self {
            lanes: LaneStack::new(config, device),
            ego_encoder: OrthogonalLinearConfig::new(config.space.ego_vehicle, config.encoder_dim)
                .init(device),
            param_encoder: OrthogonalLinearConfig::new(param_dim, config.encoder_dim).init(device),
            fc: relu_layer(fused, config.hidden_dim, device),
            head: OrthogonalLinearConfig::new(config.hidden_dim, num_actions)
                .with_gain(VALUE_GAIN)
                .init(device),
            param_dim,
            num_actions,
        }
    }
}

impl<B: Backend> ParamCritic<B> for LaneCriticNet<B> {
    fn forward(&self, states: Tensor<B, 2>, params: Tensor<B, 2>) -> Tensor<B, 2> {
        let (lanes, ego) = self.lanes.forward(states);
        let ego = self.ego_encoder.forward(ego);
        let params = self.param_encoder.forward(params);
        let hidden = relu(self.fc.forward(Tensor::cat(vec![lanes, ego, params], 1)));
        self.head.forward(hidden)
    }

    fn state_dim(&self) -> usize {
        self.lanes.state_dim()
    }

    fn param_dim(&self) -> usize {
        self.param_dim
    }

    fn num_actions(&self) -> usize {
        self.num_actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    #[test]
    fn test_actor_output_shape_and_bounds() {
        let device = Default::default();
        let config = LaneNetConfig::default();
        let actor = LaneActorNet::<B>::new(&config, 6, &device);
        assert_eq!(actor.state_dim(), 84);

        let states = Tensor::<B, 2>::random([5, 84], Distribution::Normal(0.0, 3.0), &device);
        let params = actor.forward(states);
        assert_eq!(params.dims(), [5, 6]);

        let values = params.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_hidden_dim_override() {
        let device = Default::default();
        let config = LaneNetConfig::tiny(ObservationSpace::with_waypoints(2)).with_hidden_dim(24);
        assert_eq!(config.hidden_dim, 24);
        assert_eq!(config.encoder_dim, 8);

        let critic = LaneCriticNet::<B>::new(&config, 6, 3, &device);
        let state_dim = config.space.state_dim();
        let states = Tensor::<B, 2>::zeros([2, state_dim], &device);
        let params = Tensor::<B, 2>::zeros([2, 6], &device);
        assert_eq!(critic.forward(states, params).dims(), [2, 3]);
    }

    #[test]
    fn test_critic_output_shape() {
        let device = Default::default();
        let config = LaneNetConfig::tiny(ObservationSpace::with_waypoints(4));
        let critic = LaneCriticNet::<B>::new(&config, 6, 3, &device);
        let state_dim = config.space.state_dim();
        assert_eq!(critic.state_dim(), state_dim);
        assert_eq!(critic.num_actions(), 3);

        let states = Tensor::<B, 2>::random([4, state_dim], Distribution::Normal(0.0, 1.0), &device);
        let params = Tensor::<B, 2>::zeros([4, 6], &device);
        assert_eq!(critic.forward(states, params).dims(), [4, 3]);
    }

    #[test]
    fn test_lane_encoder_shape() {
        let device = Default::default();
        let config = LaneNetConfig::default();
        let encoder = LaneEncoder::<B>::new(&config, &device);

        let lane = Tensor::<B, 2>::ones([2, config.space.lane_dim()], &device);
        assert_eq!(encoder.forward(lane).dims(), [2, 64]);
    }

    #[test]
    fn test_initial_actor_params_near_zero() {
        let device = Default::default();
        let config = LaneNetConfig::tiny(ObservationSpace::default());
        let actor = LaneActorNet::<B>::new(&config, 6, &device);

        let states = Tensor::<B, 2>::zeros([1, 84], &device);
        let values = actor
            .forward(states)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        assert!(values.iter().all(|v| v.abs() < 0.1));
    }
}
