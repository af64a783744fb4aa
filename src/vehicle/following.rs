/// The net gap is floored at this value to keep the interaction term
/// finite when vehicles nearly overlap, in m.
const MIN_NET_GAP: f64 = 0.1;

/// The car-following acceleration model of a vehicle (intelligent driver
/// model).
#[derive(Clone, Copy, Debug)]
pub(crate) struct FollowingModel {
    max_acc: f64,
    min_gap: f64,
    headway: f64,
    comf_dec: f64,
    exponent: f64,
}

/// The parameters of the car-following model.
#[derive(Clone, Copy, Debug)]
pub struct FollowingParams {
    /// The vehicle's maximum acceleration in m/s<sup>2</sup>.
    pub max_acceleration: f64,
    /// The minimum gap to the vehicle ahead in m.
    pub min_gap: f64,
    /// The desired gap between this and the vehicle ahead in seconds.
    pub time_headway: f64,
    /// The comfortable deceleration, a positive number in m/s<sup>2</sup>.
    pub comf_deceleration: f64,
    /// The free-flow acceleration exponent.
    pub exponent: f64,
}

impl Default for FollowingParams {
    fn default() -> Self {
        Self {
            max_acceleration: 0.7,
            min_gap: 2.0,
            time_headway: 1.6,
            comf_deceleration: 1.7,
            exponent: 4.0,
        }
    }
}

/// A snapshot of the vehicle ahead, taken before any vehicle is mutated
/// within a tick. Queries never hold references into the vehicle arena.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Leader {
    /// The net gap from the follower's position to the leader's rear, in m.
    pub gap: f64,
    /// The leader's speed in m/s.
    pub vel: f64,
}

impl FollowingModel {
    /// Creates a new car-following model.
    pub fn new(params: &FollowingParams) -> Self {
        Self {
            max_acc: params.max_acceleration,
            min_gap: params.min_gap,
            headway: params.time_headway,
            comf_dec: params.comf_deceleration,
            exponent: params.exponent,
        }
    }

    /// The comfortable deceleration in m/s<sup>2</sup>.
    pub fn comf_dec(&self) -> f64 {
        self.comf_dec
    }

    /// Computes the longitudinal acceleration toward `desired_vel`,
    /// following `leader` if there is one.
    ///
    /// The result is never more negative than the comfortable deceleration,
    /// no matter how far the gap has collapsed.
    pub fn accel(&self, vel: f64, desired_vel: f64, leader: Option<Leader>) -> f64 {
        let free_term = (vel / desired_vel).powf(self.exponent);
        let accel = match leader {
            None => self.max_acc * (1. - free_term),
            Some(leader) => {
                let gap = f64::max(MIN_NET_GAP, leader.gap);
                let approach = vel - leader.vel;
                let factor = 1. / (2. * (self.max_acc * self.comf_dec).sqrt());
                let desired_gap =
                    self.min_gap + f64::max(0., vel * self.headway + vel * approach * factor);
                let term = desired_gap / gap;
                self.max_acc * (1. - free_term - (term * term))
            }
        };
        f64::max(accel, -self.comf_dec)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn model() -> FollowingModel {
        FollowingModel::new(&FollowingParams::default())
    }

    #[test]
    fn free_flow_settles_at_the_desired_speed() {
        let model = model();
        assert_approx_eq!(model.accel(25.0, 25.0, None), 0.0);
        assert!(model.accel(20.0, 25.0, None) > 0.0);
        assert!(model.accel(30.0, 25.0, None) < 0.0);
    }

    #[test]
    fn a_close_slow_leader_forces_braking() {
        let model = model();
        let leader = Leader { gap: 10.0, vel: 15.0 };
        assert!(model.accel(25.0, 25.0, Some(leader)) < 0.0);
    }

    #[test]
    fn braking_is_floored_at_the_comfortable_deceleration() {
        let model = model();
        for gap in [0.0, 0.05, 0.5, 2.0, 10.0, 100.0] {
            let leader = Leader { gap, vel: 0.0 };
            assert!(model.accel(30.0, 25.0, Some(leader)) >= -1.7);
        }
    }

    #[test]
    fn a_distant_leader_barely_matters() {
        let model = model();
        let leader = Leader {
            gap: 500.0,
            vel: 25.0,
        };
        let free = model.accel(20.0, 25.0, None);
        let following = model.accel(20.0, 25.0, Some(leader));
        assert_approx_eq!(free, following, 0.01);
    }
}
