use crate::math::{Point2d, QuinticFn, Vector2d};
use crate::state::{KinematicState, Trajectory};

/// The fixed time horizon of a planned maneuver, in s.
const TIME_HORIZON: f64 = 3.0;

/// Plans short-horizon maneuvers by solving independent longitudinal and
/// lateral two-point boundary value problems with quintic polynomials.
///
/// The same solve serves every maneuver type; only the boundary end state
/// differs.
#[derive(Clone, Copy, Debug)]
pub struct TrajectoryPlanner {
    /// The sampling interval, equal to the simulation time step, in s.
    time_step: f64,
}

impl TrajectoryPlanner {
    /// Creates a planner sampling at the given simulation time step.
    pub fn new(time_step: f64) -> Self {
        Self { time_step }
    }

    /// The maneuver time horizon in s.
    pub fn horizon(&self) -> f64 {
        TIME_HORIZON
    }

    /// Plans a trajectory from `start` to `end` over the fixed horizon.
    ///
    /// Both boundary states are honoured exactly: the first sampled state
    /// matches `start` and the last matches `end`, per axis, up to
    /// numerical tolerance.
    pub fn plan(&self, start: &KinematicState, end: &KinematicState) -> Trajectory {
        let horizon = TIME_HORIZON;
        let lon = QuinticFn::fit(
            0.0, start.pos.x, start.vel.x, start.acc.x, horizon, end.pos.x, end.vel.x, end.acc.x,
        );
        let lat = QuinticFn::fit(
            0.0, start.pos.y, start.vel.y, start.acc.y, horizon, end.pos.y, end.vel.y, end.acc.y,
        );

        let steps = (horizon / self.time_step).round() as usize;
        let mut trajectory = Trajectory::new();
        for i in 0..=steps {
            // Evaluate the last sample at exactly the horizon so the end
            // state is hit regardless of time step rounding.
            let time = if i == steps {
                horizon
            } else {
                i as f64 * self.time_step
            };
            trajectory.push(KinematicState {
                pos: Point2d::new(lon.y(time), lat.y(time)),
                vel: Vector2d::new(lon.dy(time), lat.dy(time)),
                acc: Vector2d::new(lon.d2y(time), lat.d2y(time)),
                jerk: Vector2d::new(lon.d3y(time), lat.d3y(time)),
                heading: 0.0,
                steering: 0.0,
            });
        }
        trajectory
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn state(x: f64, y: f64, vx: f64, vy: f64) -> KinematicState {
        KinematicState::new(
            Point2d::new(x, y),
            Vector2d::new(vx, vy),
            Vector2d::new(0.0, 0.0),
        )
    }

    #[test]
    fn boundary_states_are_honoured() {
        let planner = TrajectoryPlanner::new(0.3);
        let start = state(0.0, 0.0, 15.0, 0.0);
        let end = state(50.0, 3.5, 15.0, 0.0);
        let trajectory = planner.plan(&start, &end);

        let first = trajectory.iter().next().unwrap();
        assert_approx_eq!(first.pos.x, start.pos.x, 1e-6);
        assert_approx_eq!(first.pos.y, start.pos.y, 1e-6);
        assert_approx_eq!(first.vel.x, start.vel.x, 1e-6);
        assert_approx_eq!(first.acc.y, start.acc.y, 1e-6);

        let last = trajectory.last_state().unwrap();
        assert_approx_eq!(last.pos.x, end.pos.x, 1e-6);
        assert_approx_eq!(last.pos.y, end.pos.y, 1e-6);
        assert_approx_eq!(last.vel.x, end.vel.x, 1e-6);
        assert_approx_eq!(last.vel.y, end.vel.y, 1e-6);
        assert_approx_eq!(last.acc.x, end.acc.x, 1e-6);
    }

    #[test]
    fn samples_cover_the_horizon_at_the_time_step() {
        let planner = TrajectoryPlanner::new(0.3);
        let trajectory = planner.plan(&state(0.0, 0.0, 10.0, 0.0), &state(30.0, 0.0, 10.0, 0.0));
        assert_eq!(trajectory.len(), 11);
    }

    #[test]
    fn constant_speed_hold_stays_linear() {
        let planner = TrajectoryPlanner::new(0.3);
        let trajectory = planner.plan(&state(0.0, 0.0, 10.0, 0.0), &state(30.0, 0.0, 10.0, 0.0));
        for (i, sample) in trajectory.iter().enumerate().take(10) {
            assert_approx_eq!(sample.pos.x, 3.0 * i as f64, 1e-6);
            assert_approx_eq!(sample.vel.x, 10.0, 1e-6);
            assert_approx_eq!(sample.acc.x, 0.0, 1e-6);
        }
    }
}
