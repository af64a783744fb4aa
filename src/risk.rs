use crate::config::Config;
use crate::manager::LaneManager;
use crate::util::Interval;
use crate::VehicleId;
use smallvec::SmallVec;

/// The look-ahead horizon over which the gap is projected, in s.
const RISK_HORIZON: f64 = 2.0;

/// The exponent shaping the risk curve between its two distance bounds.
const RISK_EXPONENT: f64 = 0.4;

/// The projected gap below which the risk saturates at 1, in m.
const MIN_SAFE_DISTANCE: f64 = 5.0;
const MIN_SAFE_DISTANCE_AGGRESSIVE: f64 = 2.0;

/// Closing situations slower than this are treated as no collision course, in s.
const TTC_CUTOFF: f64 = 70.0;

/// During a lane change the lateral separation must also shrink below this
/// fraction of the vehicle height for a collision.
const LATERAL_FRACTION: f64 = 0.75;

/// Maps a projected gap through the monotone decreasing risk curve:
/// 1 at or below the minimum distance, 0 at or beyond the maximum,
/// `1 - normalized^0.4` in between.
pub(crate) fn continuous_risk(projected_gap: f64, bounds: Interval<f64>) -> f64 {
    if projected_gap <= bounds.min {
        return 1.0;
    }
    if projected_gap >= bounds.max {
        return 0.0;
    }
    1.0 - bounds.inv_lerp(projected_gap).powf(RISK_EXPONENT)
}

/// Whether the ego is in contact with a neighbor.
///
/// Checks the nearest front/back non-ego vehicles of the ego's lane, and of
/// the target lane too while a lane change is in flight; mid-change the
/// lateral separation must also have collapsed.
pub(crate) fn check_collision(manager: &LaneManager, config: &Config) -> bool {
    let ego = manager.ego();
    let threshold = config.collision_threshold + config.vehicle_length;

    let mut candidates: SmallVec<[VehicleId; 4]> = SmallVec::new();
    let (front, back) = manager.find_front_back(ego.lane());
    candidates.extend(front);
    candidates.extend(back);
    if manager.lane_change_in_progress() {
        let (front, back) = manager.find_front_back(ego.target_lane());
        candidates.extend(front);
        candidates.extend(back);
    }

    candidates.into_iter().any(|id| {
        let vehicle = manager.get_vehicle(id);
        let longitudinal = (vehicle.relative_x() - ego.relative_x()).abs() < threshold;
        if manager.lane_change_in_progress() {
            longitudinal && (vehicle.y() - ego.y()).abs() < LATERAL_FRACTION * config.vehicle_height
        } else {
            longitudinal
        }
    })
}

/// The continuous near-collision risk against the vehicle ahead, in [0, 1].
///
/// The gap to the lane leader is projected forward by the risk horizon at
/// the current closing speed and mapped through the risk curve. Zero while
/// a lane change is in flight.
pub(crate) fn near_collision_risk(manager: &LaneManager, config: &Config) -> f64 {
    if manager.lane_change_in_progress() {
        return 0.0;
    }

    let ego = manager.ego();
    let front = match manager.find_vehicle_ahead(ego.id(), ego.lane()) {
        Some(id) => manager.get_vehicle(id),
        None => return 0.0,
    };

    let distance = front.relative_x() - ego.relative_x() - config.vehicle_length;
    let closing_speed = ego.speed() - front.speed();
    let projected_gap = distance - closing_speed * RISK_HORIZON;

    // The no-risk distance scales with the ego speed in km/h.
    let bounds = if config.aggressive_driver {
        Interval::new(MIN_SAFE_DISTANCE_AGGRESSIVE, ego.speed() * 3.6 / 5.0)
    } else {
        Interval::new(MIN_SAFE_DISTANCE, ego.speed() * 3.6 / 2.0)
    };
    continuous_risk(projected_gap, bounds)
}

/// The time until the ego would reach its lane leader at the current
/// closing speed. Infinite when not closing, or when further out than the
/// cutoff.
pub(crate) fn time_to_collision(manager: &LaneManager) -> f64 {
    let ego = manager.ego();
    let front = match manager.find_vehicle_ahead(ego.id(), ego.lane()) {
        Some(id) => manager.get_vehicle(id),
        None => return f64::INFINITY,
    };

    let distance = front.x() - ego.x();
    let closing_speed = ego.speed() - front.speed();
    if closing_speed <= 0.0 {
        return f64::INFINITY;
    }
    let ttc = distance / closing_speed;
    if ttc > TTC_CUTOFF {
        f64::INFINITY
    } else {
        ttc
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn risk_saturates_at_the_bounds() {
        let bounds = Interval::new(5.0, 50.0);
        assert_approx_eq!(continuous_risk(-10.0, bounds), 1.0);
        assert_approx_eq!(continuous_risk(5.0, bounds), 1.0);
        assert_approx_eq!(continuous_risk(50.0, bounds), 0.0);
        assert_approx_eq!(continuous_risk(80.0, bounds), 0.0);
    }

    #[test]
    fn risk_is_monotone_in_the_projected_gap() {
        let bounds = Interval::new(5.0, 50.0);
        let mut previous = 1.0;
        for i in 0..=100 {
            let gap = -5.0 + i as f64;
            let risk = continuous_risk(gap, bounds);
            assert!((0.0..=1.0).contains(&risk));
            assert!(risk <= previous);
            previous = risk;
        }
    }

    #[test]
    fn risk_follows_the_reference_curve() {
        let bounds = Interval::new(5.0, 50.0);
        // 20 m gap, 4.5 m vehicle length, same speeds: projected gap 15.5 m.
        assert_approx_eq!(continuous_risk(15.5, bounds), 0.44, 0.01);
        // 30 m gap: projected gap 25.5 m.
        assert_approx_eq!(continuous_risk(25.5, bounds), 0.27, 0.01);
    }
}
