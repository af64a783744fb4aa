use crate::action::Action;
use crate::config::Config;
use crate::math::{Point2d, Vector2d};
use crate::planner::TrajectoryPlanner;
use crate::state::{KinematicState, Trajectory};

/// Speed deltas of the planned speed-change maneuvers, in m/s.
const ACCELERATE_DELTA: f64 = 5.0;
const DECELERATE_DELTA: f64 = -5.0;
const EMERGENCY_BRAKE_DELTA: f64 = -9.0;

/// Open-loop accelerations applied by the direct-control actions, in m/s<sup>2</sup>.
const ACCELERATE_ACC: f64 = 2.0;
const DECELERATE_ACC: f64 = -2.0;
const EMERGENCY_BRAKE_ACC: f64 = -4.0;

/// The effect of a discrete action on the ego vehicle.
///
/// Actions either set an instantaneous acceleration for the current tick or
/// start a planned maneuver; the two are mutually exclusive per tick.
#[derive(Clone, Debug)]
pub enum Decision {
    /// Apply an open-loop longitudinal acceleration.
    Immediate { accel: f64 },
    /// Execute a maneuver by tracking the planned trajectory.
    Maneuver(Trajectory),
}

/// Translates discrete decisions into boundary end states and the
/// trajectories realising them.
#[derive(Clone, Copy, Debug)]
pub struct DecisionTranslator {
    lane_width: f64,
    planner: TrajectoryPlanner,
}

impl DecisionTranslator {
    pub fn new(config: &Config) -> Self {
        Self {
            lane_width: config.lane_width,
            planner: TrajectoryPlanner::new(config.time_step),
        }
    }

    /// The end state of a lane change `lane_offset` lanes over: the vehicle
    /// keeps rolling at its current speed while the lateral position shifts
    /// by whole lanes, ending laterally at rest.
    pub fn lane_change_end_state(
        &self,
        current: &KinematicState,
        lane_offset: f64,
    ) -> KinematicState {
        let horizon = self.planner.horizon();
        KinematicState::new(
            Point2d::new(
                current.pos.x + current.vel.x * horizon,
                current.pos.y + lane_offset * self.lane_width,
            ),
            Vector2d::new(current.vel.x, 0.0),
            Vector2d::new(0.0, 0.0),
        )
    }

    /// The end state of a speed change by `delta_vel`: the vehicle covers
    /// the trapezoidal-average distance and ends at the new speed in its
    /// current lane.
    pub fn speed_change_end_state(
        &self,
        current: &KinematicState,
        delta_vel: f64,
    ) -> KinematicState {
        let horizon = self.planner.horizon();
        let end_vel = current.vel.x + delta_vel;
        KinematicState::new(
            Point2d::new(
                current.pos.x + 0.5 * (current.vel.x + end_vel) * horizon,
                current.pos.y,
            ),
            Vector2d::new(end_vel, 0.0),
            Vector2d::new(0.0, 0.0),
        )
    }

    /// Plans the maneuver trajectory for a discrete action.
    pub fn process_decision(&self, current: &KinematicState, action: Action) -> Trajectory {
        let end = match action {
            Action::ChangeLaneLeft => self.lane_change_end_state(current, -1.0),
            Action::ChangeLaneRight => self.lane_change_end_state(current, 1.0),
            Action::Hold => self.speed_change_end_state(current, 0.0),
            Action::Accelerate => self.speed_change_end_state(current, ACCELERATE_DELTA),
            Action::Decelerate => self.speed_change_end_state(current, DECELERATE_DELTA),
            Action::EmergencyBrake => self.speed_change_end_state(current, EMERGENCY_BRAKE_DELTA),
        };
        self.planner.plan(current, &end)
    }

    /// Plans a lane change from `lane` into `target_lane`. Also used for
    /// the autonomous vehicles' own lane-change decisions.
    pub fn plan_lane_change(
        &self,
        current: &KinematicState,
        lane: usize,
        target_lane: usize,
    ) -> Trajectory {
        let lane_offset = target_lane as f64 - lane as f64;
        let end = self.lane_change_end_state(current, lane_offset);
        self.planner.plan(current, &end)
    }

    /// Translates an ego action under direct control. Lane changes become
    /// planned maneuvers; everything else is an instantaneous acceleration
    /// that bypasses the planner.
    pub fn translate(&self, current: &KinematicState, action: Action) -> Decision {
        match action {
            Action::Hold => Decision::Immediate { accel: 0.0 },
            Action::Accelerate => Decision::Immediate {
                accel: ACCELERATE_ACC,
            },
            Action::Decelerate => Decision::Immediate {
                accel: DECELERATE_ACC,
            },
            Action::EmergencyBrake => Decision::Immediate {
                accel: EMERGENCY_BRAKE_ACC,
            },
            Action::ChangeLaneLeft | Action::ChangeLaneRight => {
                Decision::Maneuver(self.process_decision(current, action))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn translator() -> DecisionTranslator {
        DecisionTranslator::new(&Config::default())
    }

    fn rolling_state(vx: f64) -> KinematicState {
        KinematicState::new(
            Point2d::new(0.0, 0.0),
            Vector2d::new(vx, 0.0),
            Vector2d::new(0.0, 0.0),
        )
    }

    #[test]
    fn lane_change_left_shifts_one_lane() {
        let trajectory = translator().process_decision(&rolling_state(10.0), Action::ChangeLaneLeft);
        let last = trajectory.last_state().unwrap();
        assert_approx_eq!(last.pos.x, 30.0, 1e-6);
        assert_approx_eq!(last.pos.y, -3.5, 1e-6);
        assert_approx_eq!(last.vel.y, 0.0, 1e-6);
        assert_approx_eq!(last.acc.y, 0.0, 1e-6);
    }

    #[test]
    fn accelerate_covers_the_trapezoidal_distance() {
        let trajectory = translator().process_decision(&rolling_state(10.0), Action::Accelerate);
        let last = trajectory.last_state().unwrap();
        assert_approx_eq!(last.pos.x, 37.5, 1e-6);
        assert_approx_eq!(last.vel.x, 15.0, 1e-6);
        assert_approx_eq!(last.acc.x, 0.0, 1e-6);
    }

    #[test]
    fn lane_offsets_reuse_the_same_solve() {
        let translator = translator();
        let current = rolling_state(20.0);
        let trajectory = translator.plan_lane_change(&current, 2, 1);
        let last = trajectory.last_state().unwrap();
        assert_approx_eq!(last.pos.y, -3.5, 1e-6);
        let trajectory = translator.plan_lane_change(&current, 1, 2);
        let last = trajectory.last_state().unwrap();
        assert_approx_eq!(last.pos.y, 3.5, 1e-6);
    }

    #[test]
    fn direct_control_actions_bypass_the_planner() {
        let translator = translator();
        let current = rolling_state(10.0);
        for (action, expected) in [
            (Action::Hold, 0.0),
            (Action::Accelerate, 2.0),
            (Action::Decelerate, -2.0),
            (Action::EmergencyBrake, -4.0),
        ] {
            match translator.translate(&current, action) {
                Decision::Immediate { accel } => assert_approx_eq!(accel, expected),
                Decision::Maneuver(_) => panic!("expected an immediate decision"),
            }
        }
        assert!(matches!(
            translator.translate(&current, Action::ChangeLaneLeft),
            Decision::Maneuver(_)
        ));
    }
}
