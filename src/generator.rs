//! Deterministic generation of the initial vehicle population.

use crate::config::Config;
use crate::vehicle::VehicleAttributes;
use log::warn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The ego's starting longitudinal position in m.
const EGO_POSITION: f64 = 50.0;

/// The minimum same-lane spacing between generated vehicles in m.
const MIN_SPACING: f64 = 20.0;

/// Placement retries before a vehicle is skipped.
const MAX_PLACEMENT_ATTEMPTS: usize = 10;

/// The range of generated non-ego speeds in km/h.
const SPEED_RANGE_KMH: std::ops::RangeInclusive<i32> = 90..=120;

/// The range of generated ego speeds under the aggressive profile, in km/h.
const AGGRESSIVE_SPEED_RANGE_KMH: std::ops::RangeInclusive<i32> = 120..=130;

/// The longitudinal placement window around the ego, in m.
const PLACEMENT_RANGE: std::ops::RangeInclusive<i32> = -3000..=2000;

/// Generates the vehicle population for an episode, deterministically for a
/// fixed seed. The ego vehicle is always first in the returned list.
///
/// Placement is non-overlapping on a best-effort basis: a conflicting draw
/// is retried a bounded number of times, after which the vehicle is skipped
/// with a warning rather than aborting the episode.
pub fn generate(config: &Config, seed: u64, no_vehicles: bool) -> Vec<VehicleAttributes> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut vehicles = Vec::with_capacity(config.num_vehicles + 1);

    let ego_speed = if config.ego_drives_with_mobil && config.aggressive_driver {
        rng.gen_range(AGGRESSIVE_SPEED_RANGE_KMH) as f64
    } else if config.ego_drives_with_mobil {
        config.max_rewardable_vel * 3.6
    } else if config.aggressive_driver {
        rng.gen_range(AGGRESSIVE_SPEED_RANGE_KMH) as f64
    } else {
        rng.gen_range(SPEED_RANGE_KMH) as f64
    };
    // The overtaking lane is kept free of generated vehicles, the ego included.
    let ego_lane = rng.gen_range(1..config.num_lanes);
    vehicles.push(VehicleAttributes {
        x: EGO_POSITION,
        lane: ego_lane,
        speed: ego_speed,
        v_max: ego_speed,
        is_ego: true,
    });

    if no_vehicles {
        return vehicles;
    }

    for _ in 0..config.num_vehicles {
        let lane = rng.gen_range(1..config.num_lanes);
        let speed = rng.gen_range(SPEED_RANGE_KMH) as f64;

        let mut x = EGO_POSITION + rng.gen_range(PLACEMENT_RANGE) as f64;
        let mut attempts = 0;
        let placed = loop {
            if is_position_available(&vehicles, x, lane) {
                break true;
            }
            attempts += 1;
            if attempts == MAX_PLACEMENT_ATTEMPTS {
                warn!("no free slot found for a generated vehicle, skipping it");
                break false;
            }
            x = EGO_POSITION + rng.gen_range(PLACEMENT_RANGE) as f64;
        };
        if placed {
            vehicles.push(VehicleAttributes {
                x,
                lane,
                speed,
                v_max: speed,
                is_ego: false,
            });
        }
    }

    vehicles
}

/// Whether a draw keeps the minimum spacing to every same-lane vehicle
/// placed so far.
fn is_position_available(vehicles: &[VehicleAttributes], x: f64, lane: usize) -> bool {
    vehicles
        .iter()
        .all(|vehicle| vehicle.lane != lane || (vehicle.x - x).abs() >= MIN_SPACING)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let config = Config::default();
        let a = generate(&config, 42, false);
        let b = generate(&config, 42, false);
        assert_eq!(a.len(), b.len());
        for (left, right) in a.iter().zip(&b) {
            assert_eq!(left.x, right.x);
            assert_eq!(left.lane, right.lane);
            assert_eq!(left.speed, right.speed);
        }
        let c = generate(&config, 43, false);
        assert!(a.iter().zip(&c).any(|(left, right)| left.x != right.x
            || left.lane != right.lane
            || left.speed != right.speed));
    }

    #[test]
    fn the_ego_comes_first_and_avoids_the_overtaking_lane() {
        let config = Config::default();
        for seed in 0..20 {
            let vehicles = generate(&config, seed, false);
            assert!(vehicles[0].is_ego);
            assert!(vehicles[0].lane >= 1);
            assert!(vehicles.iter().skip(1).all(|vehicle| !vehicle.is_ego));
            assert!(vehicles.iter().all(|vehicle| vehicle.lane >= 1
                && vehicle.lane < config.num_lanes));
        }
    }

    #[test]
    fn same_lane_placements_keep_their_spacing() {
        let config = Config::default();
        for seed in 0..20 {
            let vehicles = generate(&config, seed, false);
            for (i, a) in vehicles.iter().enumerate() {
                for b in &vehicles[i + 1..] {
                    if a.lane == b.lane {
                        assert!((a.x - b.x).abs() >= MIN_SPACING);
                    }
                }
            }
        }
    }

    #[test]
    fn no_vehicles_yields_only_the_ego() {
        let vehicles = generate(&Config::default(), 7, true);
        assert_eq!(vehicles.len(), 1);
        assert!(vehicles[0].is_ego);
    }
}
