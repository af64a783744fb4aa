use crate::state::{KinematicState, Trajectory};
use cgmath::InnerSpace;

/// A pure pursuit steering controller for trajectory tracking.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PurePursuit {
    /// The look-ahead distance in m.
    look_ahead: f64,
    /// The wheelbase of the vehicle in m.
    wheelbase: f64,
}

impl PurePursuit {
    pub fn new(look_ahead: f64, wheelbase: f64) -> Self {
        Self {
            look_ahead,
            wheelbase,
        }
    }

    /// Computes the steering angle required to track `trajectory` from the
    /// current state. Returns zero when there is nothing left to track.
    pub fn steering_angle(&self, current: &KinematicState, trajectory: &Trajectory) -> f64 {
        if trajectory.is_empty() {
            return 0.0;
        }

        // The first waypoint at least the look-ahead distance away, or the
        // final waypoint if none is that far out.
        let target = trajectory
            .iter()
            .find(|state| (state.pos - current.pos).magnitude() >= self.look_ahead)
            .or_else(|| trajectory.last_state())
            .expect("trajectory is non-empty");

        let to_target = target.pos - current.pos;
        let heading_error = to_target.y.atan2(to_target.x) - current.heading;
        let ld_squared = self.look_ahead * self.look_ahead;
        (2. * self.wheelbase * heading_error.sin()).atan2(ld_squared)
    }
}
