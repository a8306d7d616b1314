//! Three-lane toy road implementing `LaneChangeEnv`.
//!
//! Each lane has one lead vehicle driving at a constant speed. The ego car
//! gets rewarded for speed and pays for collisions and harsh steering. The
//! first steps of every episode are driven by a rule-based cruise
//! controller, which reports its control as a guided action.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pdqn::{
    ActionBound, EgoState, EnvStep, GuidedAction, LaneChangeEnv, LaneObservation, LaneView,
    Maneuver, ObservationSpace, PdqnError, Result, StepInfo, VehicleState, Waypoint,
};

const LANES: usize = 3;
const DT: f32 = 0.1;
const MAX_SPEED: f32 = 30.0;
const SENSING_RANGE: f32 = 100.0;
const CRUISE_SPEED: f32 = 15.0;

pub struct ToyRoad {
    space: ObservationSpace,
    bound: ActionBound,
    rng: StdRng,
    guided_steps: usize,
    max_steps: usize,
    t: usize,
    ego_lane: usize,
    ego_speed: f32,
    prev_speed: f32,
    gaps: [f32; LANES],
    lead_speeds: [f32; LANES],
}

impl ToyRoad {
    pub fn new(space: ObservationSpace, seed: u64) -> Self {
        Self {
            space,
            bound: ActionBound {
                steer: 0.5,
                throttle: 1.0,
                brake: 1.0,
            },
            rng: StdRng::seed_from_u64(seed),
            guided_steps: 20,
            max_steps: 300,
            t: 0,
            ego_lane: 1,
            ego_speed: 0.0,
            prev_speed: 0.0,
            gaps: [SENSING_RANGE; LANES],
            lead_speeds: [CRUISE_SPEED; LANES],
        }
    }

    fn lane_view(&self, lane: usize) -> LaneView {
        let offset = (lane as f32 - self.ego_lane as f32) / LANES as f32;
        let waypoints = (0..self.space.waypoints)
            .map(|i| {
                let mut features = vec![0.0; self.space.waypoint_features];
                features[0] = offset;
                if let Some(f) = features.get_mut(1) {
                    *f = i as f32 / self.space.waypoints as f32;
                }
                Waypoint::new(features)
            })
            .collect();
        let front = VehicleState::new(
            (self.gaps[lane] / SENSING_RANGE).min(1.0),
            (self.ego_speed - self.lead_speeds[lane]) / 10.0,
            0.0,
        );
        LaneView::new(waypoints, front, VehicleState::absent())
    }

    fn observation(&self) -> LaneObservation {
        let center = self.lane_view(self.ego_lane);
        let left = match self.ego_lane.checked_sub(1) {
            Some(lane) => self.lane_view(lane),
            None => LaneView::missing(&center),
        };
        let right = if self.ego_lane + 1 < LANES {
            self.lane_view(self.ego_lane + 1)
        } else {
            LaneView::missing(&center)
        };
        LaneObservation {
            left,
            center,
            right,
            ego: EgoState {
                speed_long: self.ego_speed / 10.0,
                accel_long: (self.ego_speed - self.prev_speed) / DT / 3.0,
                ..Default::default()
            },
        }
    }

    /// Cruise controller: hold `CRUISE_SPEED` in the current lane.
    fn cruise(&self) -> GuidedAction {
        let error = CRUISE_SPEED - self.ego_speed;
        let (throttle, brake) = if error >= 0.0 {
            ((error / 5.0).min(1.0), 0.0)
        } else {
            (0.0, (-error / 5.0).min(1.0))
        };
        GuidedAction::from_control(Maneuver::LaneFollow.index(), 0.0, throttle, brake)
    }
}

impl LaneChangeEnv for ToyRoad {
    fn reset(&mut self) -> Result<LaneObservation> {
        self.t = 0;
        self.ego_lane = 1;
        self.ego_speed = CRUISE_SPEED;
        self.prev_speed = CRUISE_SPEED;
        for lane in 0..LANES {
            self.gaps[lane] = self.rng.gen_range(20.0..SENSING_RANGE);
            self.lead_speeds[lane] = self.rng.gen_range(8.0..25.0);
        }
        Ok(self.observation())
    }

    fn step(&mut self, action: usize, params: &[f32]) -> Result<EnvStep> {
        let maneuver = Maneuver::from_index(action)
            .ok_or_else(|| PdqnError::Environment(format!("unknown action {}", action)))?;

        let guided = (self.t < self.guided_steps).then(|| self.cruise());
        let (maneuver, control) = match guided {
            Some(g) => (Maneuver::LaneFollow, self.bound.to_control(&g.params())?),
            None => (maneuver, self.bound.to_control(params)?),
        };

        let mut impact = 0.0;
        match maneuver {
            Maneuver::ChangeLeft if self.ego_lane > 0 => self.ego_lane -= 1,
            Maneuver::ChangeRight if self.ego_lane + 1 < LANES => self.ego_lane += 1,
            _ => {}
        }
        if maneuver != Maneuver::LaneFollow && self.gaps[self.ego_lane] < 15.0 {
            // cutting in close to the lead vehicle
            impact = -1.0;
        }

        self.prev_speed = self.ego_speed;
        let accel = control.throttle * 3.0 - control.brake * 6.0;
        self.ego_speed = (self.ego_speed + accel * DT).clamp(0.0, MAX_SPEED);
        for lane in 0..LANES {
            self.gaps[lane] += (self.lead_speeds[lane] - self.ego_speed) * DT;
            if self.gaps[lane] > SENSING_RANGE {
                self.gaps[lane] = SENSING_RANGE;
            }
        }
        self.t += 1;

        let collision = self.gaps[self.ego_lane] <= 0.0;
        let reward = if collision {
            -10.0
        } else {
            self.ego_speed / MAX_SPEED - 0.1 * control.steer.abs()
        };

        Ok(EnvStep {
            observation: self.observation(),
            reward,
            truncated: self.t >= self.max_steps,
            done: collision,
            info: StepInfo {
                impact: Some(impact),
                guided,
                effective: true,
            },
        })
    }

    fn observation_space(&self) -> ObservationSpace {
        self.space
    }

    fn action_bound(&self) -> ActionBound {
        self.bound
    }

    fn action_mask(&self) -> Option<Vec<bool>> {
        Some(vec![self.ego_lane > 0, true, self.ego_lane + 1 < LANES])
    }
}
