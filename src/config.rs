/// Simulation-wide constants, constructed once and shared read-only by
/// every component. Nothing mutates a `Config` after construction; the
/// aggressive profile's derived adjustments are applied by its constructor.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// The minimum ego speed in m/s; dropping below it ends the episode.
    pub min_vel: f64,
    /// The maximum ego speed in m/s.
    pub max_vel: f64,
    /// Lower bound of the rewardable speed band in m/s.
    pub min_rewardable_vel: f64,
    /// Upper bound of the rewardable speed band in m/s.
    pub max_rewardable_vel: f64,
    /// Gap below which two vehicles count as collided, in m.
    pub collision_threshold: f64,
    /// The number of non-ego vehicles to generate.
    pub num_vehicles: usize,
    /// Total road length in m.
    pub road_length: f64,
    /// Vehicle extent along the direction of travel in m.
    pub vehicle_length: f64,
    /// Vehicle extent across the direction of travel in m.
    pub vehicle_height: f64,
    /// Lane width in m.
    pub lane_width: f64,
    /// The simulation time step in s.
    pub time_step: f64,
    /// The number of lanes.
    pub num_lanes: usize,
    /// Longitudinal distance after which the episode ends, in m.
    pub effective_sim_length: f64,
    /// Episode time budget in s.
    pub effective_sim_time: f64,
    /// When set, the ego drives itself through the car-following and
    /// lane-change heuristics instead of taking external actions.
    pub ego_drives_with_mobil: bool,
    /// The aggressive driving profile.
    pub aggressive_driver: bool,
    /// Measure the episode time budget against wall-clock time, as some
    /// training setups expect, instead of simulated time.
    pub wall_clock_timeout: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_vel: 13.0,
            max_vel: 36.0,
            min_rewardable_vel: 21.0,
            max_rewardable_vel: 29.0,
            collision_threshold: 2.0,
            num_vehicles: 35,
            road_length: 51_000.0,
            vehicle_length: 4.5,
            vehicle_height: 2.0,
            lane_width: 3.5,
            time_step: 0.3,
            num_lanes: 3,
            effective_sim_length: 20_000.0,
            effective_sim_time: 120.0,
            ego_drives_with_mobil: false,
            aggressive_driver: false,
            wall_clock_timeout: false,
        }
    }
}

impl Config {
    /// The aggressive driving profile: the rewardable band is widened and
    /// shifted upwards and the collision threshold is halved.
    pub fn aggressive() -> Self {
        let config = Self {
            aggressive_driver: true,
            ..Self::default()
        };
        config.with_derived_fields()
    }

    /// Applies the adjustments derived from the profile flags. Call once,
    /// after setting flags on a hand-built configuration.
    pub fn with_derived_fields(mut self) -> Self {
        if self.aggressive_driver {
            self.max_rewardable_vel += 5.0;
            self.min_rewardable_vel += 8.0;
            self.collision_threshold /= 2.0;
        }
        self
    }
}
