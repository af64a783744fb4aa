use crate::action::Action;
use crate::config::Config;
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::decision::{Decision, DecisionTranslator};
use crate::generator;
use crate::manager::LaneManager;
use crate::reward::RewardModel;
use crate::vehicle::VehicleAttributes;
use crate::VehicleId;
use arrayvec::ArrayVec;
use rand_distr::Distribution;

/// The number of vehicles in the observation, the ego included.
const OBSERVED_VEHICLES: usize = 5;

/// The number of features per observed vehicle.
const FEATURES_PER_VEHICLE: usize = 3;

/// Relative longitudinal positions are normalized over ±this range, in m.
const OBSERVATION_X_RANGE: f64 = 400.0;

/// The flattened observation vector: the ego first, then the nearest
/// non-ego vehicles by relative longitudinal distance, closest first.
/// Missing neighbor slots are zero-filled.
pub type Observation = [f64; OBSERVED_VEHICLES * FEATURES_PER_VEHICLE];

/// The result of advancing the simulation by one action.
#[derive(Clone, Copy, Debug)]
pub struct Step {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Per-tick metrics exposed alongside the reward for metrics consumers.
#[derive(Clone, Copy, Debug)]
pub struct StepInfo {
    /// Whether the ego registered a collision this tick.
    pub collision: bool,
    /// The continuous near-collision risk in [0, 1].
    pub near_collision_risk: f64,
    /// Time to collision against the lane leader in s; infinite when not
    /// on a collision course.
    pub time_to_collision: f64,
}

/// A highway traffic simulation.
///
/// One vehicle, the ego, is driven by discrete external actions through
/// [Simulation::step]; every other vehicle follows its own car-following
/// and lane-change heuristics.
pub struct Simulation {
    config: Config,
    manager: LaneManager,
    translator: DecisionTranslator,
    reward: RewardModel,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation {
    /// Creates a new simulation. Call [Simulation::reset] to populate it.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            manager: LaneManager::new(&config),
            translator: DecisionTranslator::new(&config),
            reward: RewardModel::new(&config),
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// The simulation configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The lane manager, for read access to lanes, vehicles and statistics.
    pub fn manager(&self) -> &LaneManager {
        &self.manager
    }

    /// Adds a vehicle to the simulation. Useful for building exact
    /// scenarios; [Simulation::reset] populates the highway for normal runs.
    pub fn add_vehicle(&mut self, attributes: &VehicleAttributes) -> VehicleId {
        self.manager.add_vehicle(attributes)
    }

    /// Clears and re-seeds the vehicle population and returns the initial
    /// observation. With `no_vehicles`, only the ego is placed.
    pub fn reset(&mut self, seed: u64, no_vehicles: bool) -> Observation {
        self.manager.remove_all();
        for attributes in generator::generate(&self.config, seed, no_vehicles) {
            self.manager.add_vehicle(&attributes);
        }
        self.reward.reset();
        self.observation()
    }

    /// Advances the simulation by one tick under the given action.
    ///
    /// # Panics
    /// Panics if `action` lies outside the `[0, 6)` action space; an
    /// out-of-range action is a caller error, not a recoverable condition.
    pub fn step(&mut self, action: usize) -> Step {
        let action = Action::from_index(action).expect("action index outside the action space");
        self.take_action(action);
        self.manager.update();
        let outcome = self.reward.evaluate(&self.manager);

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }

        Step {
            observation: self.observation(),
            reward: outcome.reward,
            done: outcome.done,
            info: StepInfo {
                collision: outcome.collision,
                near_collision_risk: outcome.near_collision_risk,
                time_to_collision: outcome.time_to_collision,
            },
        }
    }

    /// Applies the ego action for this tick. Lane changes are demoted to
    /// hold while one is already in flight or from an extreme lane; the
    /// remaining actions set the ego's open-loop acceleration.
    fn take_action(&mut self, action: Action) {
        if self.config.ego_drives_with_mobil {
            return;
        }

        let mut action = action;
        if self.manager.lane_change_in_progress() && action.is_lane_change() {
            action = Action::Hold;
        }
        if (action == Action::ChangeLaneLeft && self.manager.is_ego_in_leftmost_lane())
            || (action == Action::ChangeLaneRight && self.manager.is_ego_in_rightmost_lane())
        {
            action = Action::Hold;
        }

        let state = self.manager.ego().state();
        match self.translator.translate(&state, action) {
            Decision::Immediate { accel } => self.manager.ego_mut().set_command_accel(accel),
            Decision::Maneuver(trajectory) => {
                if self.manager.ego().has_active_trajectory() {
                    return;
                }
                let lane = self.manager.ego().lane();
                let target_lane = match action {
                    Action::ChangeLaneLeft => lane - 1,
                    Action::ChangeLaneRight => lane + 1,
                    _ => unreachable!("only lane changes plan maneuvers"),
                };
                self.manager.ego_mut().assign_maneuver(trajectory, target_lane);
                self.manager.set_lane_change_in_progress(true);
            }
        }
    }

    /// The flattened observation of the ego and its nearest neighbors.
    pub fn observation(&self) -> Observation {
        let mut features: ArrayVec<f64, { OBSERVED_VEHICLES * FEATURES_PER_VEHICLE }> =
            ArrayVec::new();

        let ego = self.manager.ego();
        let (x, y, v) = self.normalize(ego.relative_x(), ego.y(), ego.speed());
        features.extend([x, y, v]);

        for id in self.manager.get_nearby_vehicles(OBSERVED_VEHICLES - 1) {
            let vehicle = self.manager.get_vehicle(id);
            let (x, y, v) = self.normalize(vehicle.relative_x(), vehicle.y(), vehicle.speed());
            features.extend([x, y, v]);
        }
        while !features.is_full() {
            features.push(0.0);
        }
        features
            .into_inner()
            .expect("observation is exactly 5 vehicles x 3 features")
    }

    /// Normalizes a position/speed triple into [0, 1] feature space.
    fn normalize(&self, x: f64, y: f64, v: f64) -> (f64, f64, f64) {
        let y_mean = (self.config.num_lanes - 1) as f64 * self.config.lane_width / 2.0;
        (
            ((x + OBSERVATION_X_RANGE) / (2.0 * OBSERVATION_X_RANGE)).clamp(0.0, 1.0),
            (y / (2.0 * y_mean)).clamp(0.0, 1.0),
            (v / self.config.max_vel).clamp(0.0, 1.0),
        )
    }

    /// Randomly assigns a desired velocity adjustment factor to each
    /// non-ego vehicle, sampled from a normal distribution with a mean of 1
    /// (no adjustment) and standard deviation of `stddev`.
    pub fn randomise_velocity_adjusts(&mut self, stddev: f64) {
        let mut rand = rand::thread_rng();
        let distr = rand_distr::Normal::new(1.0, stddev).expect("Invalid standard deviation");
        for vehicle in self.manager.iter_vehicles_mut() {
            if vehicle.is_ego() {
                continue;
            }
            let factor = distr.sample(&mut rand).clamp(0.75, 1.25);
            vehicle.scale_v_max(factor);
        }
    }

    /// Gets the debugging information for the previously simulated frame as
    /// a JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }
}
