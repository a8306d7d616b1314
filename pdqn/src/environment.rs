//! Environment abstraction for lane-change training.
//!
//! The simulator, route planner and reward shaping live outside this crate.
//! They are reached through [`LaneChangeEnv`], which hands out structured
//! [`LaneObservation`]s and accepts a discrete maneuver plus its parameters.

use serde::{Deserialize, Serialize};

use crate::error::{PdqnError, Result};
use crate::observation::{LaneObservation, ObservationSpace};

/// Discrete maneuvers of the lane-change task, in action-index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Maneuver {
    ChangeLeft,
    LaneFollow,
    ChangeRight,
}

impl Maneuver {
    pub const ALL: [Maneuver; 3] = [Maneuver::ChangeLeft, Maneuver::LaneFollow, Maneuver::ChangeRight];

    /// Action index used by the agent.
    pub fn index(self) -> usize {
        match self {
            Maneuver::ChangeLeft => 0,
            Maneuver::LaneFollow => 1,
            Maneuver::ChangeRight => 2,
        }
    }

    /// Maneuver for an action index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

// ============================================================================
// Step Result
// ============================================================================

/// Action executed by a rule-based controller instead of the agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidedAction {
    /// Maneuver the controller chose.
    pub action: usize,
    /// Applied steering.
    pub steer: f32,
    /// Applied throttle (positive) or brake (negative).
    pub throttle_brake: f32,
}

impl GuidedAction {
    /// Build from separate throttle and brake readings: brake wins when set.
    pub fn from_control(action: usize, steer: f32, throttle: f32, brake: f32) -> Self {
        let throttle_brake = if brake > 0.0 { -brake } else { throttle };
        Self {
            action,
            steer,
            throttle_brake,
        }
    }

    /// Parameters in action-slice order `[steer, throttle_brake]`.
    pub fn params(&self) -> [f32; 2] {
        [self.steer, self.throttle_brake]
    }
}

/// Side information returned with every step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    /// Follow-up reward term credited to the previous transition.
    pub impact: Option<f32>,
    /// Set when the agent was not in control for this step.
    pub guided: Option<GuidedAction>,
    /// Whether this step should be recorded at all.
    pub effective: bool,
}

impl Default for StepInfo {
    fn default() -> Self {
        Self {
            impact: None,
            guided: None,
            effective: true,
        }
    }
}

/// Result of one environment step.
#[derive(Debug, Clone)]
pub struct EnvStep {
    pub observation: LaneObservation,
    pub reward: f32,
    /// Episode cut by a time limit.
    pub truncated: bool,
    /// Episode ended naturally (collision, goal).
    pub done: bool,
    pub info: StepInfo,
}

impl EnvStep {
    /// Episode over for either reason.
    pub fn episode_end(&self) -> bool {
        self.done || self.truncated
    }
}

// ============================================================================
// Control Mapping
// ============================================================================

/// Physical control limits of the ego vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionBound {
    pub steer: f32,
    pub throttle: f32,
    pub brake: f32,
}

impl Default for ActionBound {
    fn default() -> Self {
        Self {
            steer: 1.0,
            throttle: 1.0,
            brake: 1.0,
        }
    }
}

/// Low-level vehicle command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleControl {
    pub steer: f32,
    pub throttle: f32,
    pub brake: f32,
}

impl ActionBound {
    /// Map `[steer, throttle_brake]` to a vehicle command.
    ///
    /// Steering is clipped to `±steer`. A non-negative second parameter is
    /// throttle, a negative one is brake with its magnitude.
    pub fn to_control(&self, params: &[f32]) -> Result<VehicleControl> {
        let [steer, throttle_brake] = params else {
            return Err(PdqnError::shape("control params", 2, params.len()));
        };

        let steer = steer.clamp(-self.steer, self.steer);
        let (throttle, brake) = if *throttle_brake >= 0.0 {
            (throttle_brake.clamp(0.0, self.throttle), 0.0)
        } else {
            (0.0, throttle_brake.abs().clamp(0.0, self.brake))
        };

        Ok(VehicleControl {
            steer,
            throttle,
            brake,
        })
    }
}

// ============================================================================
// Environment Trait
// ============================================================================

/// Single lane-change driving environment.
pub trait LaneChangeEnv {
    /// Start a new episode.
    fn reset(&mut self) -> Result<LaneObservation>;

    /// Execute `action` with its parameter slice.
    fn step(&mut self, action: usize, params: &[f32]) -> Result<EnvStep>;

    /// Observation layout this environment produces.
    fn observation_space(&self) -> ObservationSpace;

    /// Physical control limits.
    fn action_bound(&self) -> ActionBound;

    /// Maneuvers currently allowed (e.g. no change-left from the leftmost
    /// lane). `None` allows every action.
    fn action_mask(&self) -> Option<Vec<bool>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_control_throttle_and_brake() {
        let bound = ActionBound {
            steer: 0.3,
            throttle: 0.8,
            brake: 0.5,
        };

        let c = bound.to_control(&[0.9, 0.6]).unwrap();
        assert_eq!(c, VehicleControl { steer: 0.3, throttle: 0.6, brake: 0.0 });

        let c = bound.to_control(&[-0.1, -0.9]).unwrap();
        assert_eq!(c, VehicleControl { steer: -0.1, throttle: 0.0, brake: 0.5 });

        let c = bound.to_control(&[0.0, 1.0]).unwrap();
        assert_eq!(c.throttle, 0.8);
    }

    #[test]
    fn test_to_control_rejects_wrong_length() {
        let bound = ActionBound::default();
        assert!(matches!(
            bound.to_control(&[0.0]),
            Err(PdqnError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_guided_action_prefers_brake() {
        let braking = GuidedAction::from_control(1, 0.1, 0.4, 0.2);
        assert_eq!(braking.params(), [0.1, -0.2]);

        let accelerating = GuidedAction::from_control(0, -0.2, 0.4, 0.0);
        assert_eq!(accelerating.params(), [-0.2, 0.4]);
    }

    #[test]
    fn test_maneuver_indices() {
        for m in Maneuver::ALL {
            assert_eq!(Maneuver::from_index(m.index()), Some(m));
        }
        assert_eq!(Maneuver::from_index(3), None);
    }
}
