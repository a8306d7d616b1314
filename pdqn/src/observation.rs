//! Structured lane observations and their flattening into a state vector.
//!
//! The environment reports what it sees per lane (left, current, right): a
//! short list of upcoming waypoints plus the nearest vehicle ahead and behind.
//! Networks consume a flat vector laid out in this fixed order:
//!
//! ```text
//! [ left.waypoints   left.front   left.rear   |
//!   center.waypoints center.front center.rear |
//!   right.waypoints  right.front  right.rear  |
//!   ego ]
//! ```
//!
//! With the default [`ObservationSpace`] (10 waypoints × 2 features, 3 features
//! per vehicle, 6 ego features) each lane block is 26 values and the state is 84.

use serde::{Deserialize, Serialize};

use crate::error::{PdqnError, Result};

// ============================================================================
// Observation Space
// ============================================================================

/// Shape of the observations produced by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationSpace {
    /// Waypoints per lane
    pub waypoints: usize,
    /// Features per waypoint
    pub waypoint_features: usize,
    /// Features per surrounding vehicle
    pub conventional_vehicle: usize,
    /// Features of the ego vehicle
    pub ego_vehicle: usize,
}

impl Default for ObservationSpace {
    fn default() -> Self {
        Self {
            waypoints: 10,
            waypoint_features: 2,
            conventional_vehicle: VehicleState::FEATURES,
            ego_vehicle: EgoState::FEATURES,
        }
    }
}

impl ObservationSpace {
    /// Number of lanes in every observation.
    pub const LANES: usize = 3;

    /// Create a space with `waypoints` per lane and default feature sizes.
    pub fn with_waypoints(waypoints: usize) -> Self {
        Self {
            waypoints,
            ..Self::default()
        }
    }

    /// Flattened length of one lane's waypoints.
    pub fn waypoint_dim(&self) -> usize {
        self.waypoints * self.waypoint_features
    }

    /// Flattened length of one lane's front + rear vehicles.
    pub fn vehicle_dim(&self) -> usize {
        self.conventional_vehicle * 2
    }

    /// Flattened length of one lane block.
    pub fn lane_dim(&self) -> usize {
        self.waypoint_dim() + self.vehicle_dim()
    }

    /// Flattened length of the full state.
    pub fn state_dim(&self) -> usize {
        Self::LANES * self.lane_dim() + self.ego_vehicle
    }

    /// Check that the space is non-empty and agrees with the fixed record layouts.
    pub fn validate(&self) -> Result<()> {
        if self.waypoints == 0 || self.waypoint_features == 0 {
            return Err(PdqnError::InvalidConfig(
                "observation space needs at least one waypoint feature".into(),
            ));
        }
        if self.conventional_vehicle != VehicleState::FEATURES {
            return Err(PdqnError::shape(
                "vehicle features",
                VehicleState::FEATURES,
                self.conventional_vehicle,
            ));
        }
        if self.ego_vehicle != EgoState::FEATURES {
            return Err(PdqnError::shape(
                "ego features",
                EgoState::FEATURES,
                self.ego_vehicle,
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Observation Records
// ============================================================================

/// One upcoming waypoint of a lane, as normalized features.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub features: Vec<f32>,
}

impl Waypoint {
    pub fn new(features: Vec<f32>) -> Self {
        Self { features }
    }
}

/// Nearest vehicle ahead of or behind the ego vehicle in one lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    /// Gap to the vehicle, normalized to `[0, 1]` over the sensing range
    pub distance: f32,
    /// Ego speed minus vehicle speed, normalized
    pub relative_speed: f32,
    /// Lateral offset of the ego vehicle from its lane center
    pub lateral_offset: f32,
}

impl VehicleState {
    /// Number of features per vehicle.
    pub const FEATURES: usize = 3;

    pub fn new(distance: f32, relative_speed: f32, lateral_offset: f32) -> Self {
        Self {
            distance,
            relative_speed,
            lateral_offset,
        }
    }

    /// Placeholder for a lane that does not exist (road edge): zero gap.
    pub fn wall() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Placeholder for an empty lane: the vehicle is at the edge of the sensing range.
    pub fn absent() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    pub fn features(&self) -> [f32; Self::FEATURES] {
        [self.distance, self.relative_speed, self.lateral_offset]
    }
}

/// Kinematics of the ego vehicle in the lane frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EgoState {
    /// Longitudinal speed (m/s / 10)
    pub speed_long: f32,
    /// Lateral speed (m/s / 10)
    pub speed_lat: f32,
    /// Longitudinal acceleration (m/s² / 3)
    pub accel_long: f32,
    /// Lateral acceleration (m/s² / 3)
    pub accel_lat: f32,
    /// Lateral offset from the lane center
    pub lateral_offset: f32,
    /// Heading relative to the lane (degrees / 90)
    pub yaw_diff: f32,
}

impl EgoState {
    /// Number of ego features.
    pub const FEATURES: usize = 6;

    pub fn features(&self) -> [f32; Self::FEATURES] {
        [
            self.speed_long,
            self.speed_lat,
            self.accel_long,
            self.accel_lat,
            self.lateral_offset,
            self.yaw_diff,
        ]
    }
}

/// What the ego vehicle sees of one lane.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneView {
    pub waypoints: Vec<Waypoint>,
    pub front: VehicleState,
    pub rear: VehicleState,
}

impl LaneView {
    pub fn new(waypoints: Vec<Waypoint>, front: VehicleState, rear: VehicleState) -> Self {
        Self {
            waypoints,
            front,
            rear,
        }
    }

    /// View of a lane that does not exist.
    ///
    /// The current lane's waypoints stand in for the missing ones and both
    /// vehicles are walls, so the actor sees a closed gap.
    pub fn missing(center: &LaneView) -> Self {
        Self::new(
            center.waypoints.clone(),
            VehicleState::wall(),
            VehicleState::wall(),
        )
    }

    /// True if both neighbours are walls.
    pub fn is_wall(&self) -> bool {
        self.front == VehicleState::wall() && self.rear == VehicleState::wall()
    }
}

/// Full observation for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneObservation {
    pub left: LaneView,
    pub center: LaneView,
    pub right: LaneView,
    pub ego: EgoState,
}

impl LaneObservation {
    /// Flatten into the canonical state vector.
    pub fn compress(&self, space: &ObservationSpace) -> Result<Vec<f32>> {
        compress(self, space)
    }
}

// ============================================================================
// State Compression
// ============================================================================

/// Flatten an observation into the canonical state vector.
///
/// Fails if `space` itself is invalid, or with `ShapeMismatch` if a lane has
/// the wrong number of waypoints or a waypoint has the wrong number of features.
pub fn compress(obs: &LaneObservation, space: &ObservationSpace) -> Result<Vec<f32>> {
    space.validate()?;
    let mut state = Vec::with_capacity(space.state_dim());
    for lane in [&obs.left, &obs.center, &obs.right] {
        push_lane(&mut state, lane, space)?;
    }
    state.extend_from_slice(&obs.ego.features());
    if state.len() != space.state_dim() {
        return Err(PdqnError::shape("compressed state", space.state_dim(), state.len()));
    }
    Ok(state)
}

fn push_lane(state: &mut Vec<f32>, lane: &LaneView, space: &ObservationSpace) -> Result<()> {
    if lane.waypoints.len() != space.waypoints {
        return Err(PdqnError::shape(
            "lane waypoints",
            space.waypoints,
            lane.waypoints.len(),
        ));
    }
    for wp in &lane.waypoints {
        if wp.features.len() != space.waypoint_features {
            return Err(PdqnError::shape(
                "waypoint features",
                space.waypoint_features,
                wp.features.len(),
            ));
        }
        state.extend_from_slice(&wp.features);
    }
    state.extend_from_slice(&lane.front.features());
    state.extend_from_slice(&lane.rear.features());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(tag: f32, space: &ObservationSpace) -> LaneView {
        let waypoints = (0..space.waypoints)
            .map(|_| Waypoint::new(vec![tag; space.waypoint_features]))
            .collect();
        LaneView::new(
            waypoints,
            VehicleState::new(tag + 0.1, tag + 0.2, tag + 0.3),
            VehicleState::new(tag + 0.4, tag + 0.5, tag + 0.6),
        )
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "expected {:?}, got {:?}", expected, actual);
        }
    }

    fn observation(space: &ObservationSpace) -> LaneObservation {
        LaneObservation {
            left: lane(1.0, space),
            center: lane(2.0, space),
            right: lane(3.0, space),
            ego: EgoState {
                speed_long: 9.0,
                speed_lat: 9.1,
                accel_long: 9.2,
                accel_lat: 9.3,
                lateral_offset: 9.4,
                yaw_diff: 9.5,
            },
        }
    }

    #[test]
    fn test_default_dimensions() {
        let space = ObservationSpace::default();
        assert!(space.validate().is_ok());
        assert_eq!(space.lane_dim(), 26);
        assert_eq!(space.state_dim(), 84);
    }

    #[test]
    fn test_compress_canonical_order() {
        let space = ObservationSpace::default();
        let state = compress(&observation(&space), &space).unwrap();
        assert_eq!(state.len(), 84);

        // left block: 20 waypoint values, then front, then rear
        assert!(state[..20].iter().all(|&v| v == 1.0));
        assert_close(&state[20..23], &[1.1, 1.2, 1.3]);
        assert_close(&state[23..26], &[1.4, 1.5, 1.6]);

        // center block
        assert!(state[26..46].iter().all(|&v| v == 2.0));
        assert_close(&state[46..49], &[2.1, 2.2, 2.3]);
        assert_close(&state[49..52], &[2.4, 2.5, 2.6]);

        // right block
        assert!(state[52..72].iter().all(|&v| v == 3.0));
        assert_close(&state[72..75], &[3.1, 3.2, 3.3]);
        assert_close(&state[75..78], &[3.4, 3.5, 3.6]);

        assert_close(&state[78..], &[9.0, 9.1, 9.2, 9.3, 9.4, 9.5]);
    }

    #[test]
    fn test_compress_rejects_wrong_waypoint_count() {
        let space = ObservationSpace::default();
        let mut obs = observation(&space);
        obs.right.waypoints.pop();

        let err = compress(&obs, &space).unwrap_err();
        assert!(matches!(
            err,
            PdqnError::ShapeMismatch {
                what: "lane waypoints",
                expected: 10,
                actual: 9
            }
        ));
    }

    #[test]
    fn test_compress_rejects_wrong_feature_count() {
        let space = ObservationSpace::default();
        let mut obs = observation(&space);
        obs.center.waypoints[3].features.push(0.0);

        assert!(compress(&obs, &space).is_err());
    }

    #[test]
    fn test_missing_lane_copies_center() {
        let space = ObservationSpace::with_waypoints(4);
        let center = lane(2.0, &space);
        let missing = LaneView::missing(&center);

        assert_eq!(missing.waypoints, center.waypoints);
        assert!(missing.is_wall());
        assert!(!center.is_wall());
    }

    #[test]
    fn test_validate_rejects_inconsistent_space() {
        let mut space = ObservationSpace::default();
        space.ego_vehicle = 5;
        assert!(space.validate().is_err());

        let empty = ObservationSpace::with_waypoints(0);
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_compress_rejects_unvalidated_space() {
        let valid = ObservationSpace::with_waypoints(2);
        let obs = observation(&valid);
        let space = ObservationSpace {
            conventional_vehicle: 4,
            ..valid
        };

        assert!(matches!(
            compress(&obs, &space),
            Err(PdqnError::ShapeMismatch { .. })
        ));
    }
}
