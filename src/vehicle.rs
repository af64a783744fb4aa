use self::following::{FollowingModel, FollowingParams};
use self::pursuit::PurePursuit;
use crate::config::Config;
use crate::math::{Point2d, Vector2d};
use crate::state::{KinematicState, Trajectory};
use crate::VehicleId;

pub(crate) use self::following::Leader;

mod following;
mod pursuit;

/// Conversion factor from km/h to m/s.
const KMH_TO_MS: f64 = 10.0 / 36.0;

/// The floor for vehicle speed in m/s. Speeds never reach zero, which keeps
/// the per-lane time-gap statistics finite.
const MIN_SPEED: f64 = 0.1;

/// Distances from the centre of gravity to the front and rear axles, in m.
const AXLE_FRONT: f64 = 2.5;
const AXLE_REAR: f64 = 2.5;

/// A follower closer than this behind a prospective lane changer blocks the
/// change outright, in m.
const CUT_IN_GUARD: f64 = 20.0;

/// The pure pursuit look-ahead distance in m.
const LOOK_AHEAD: f64 = 1.9;

/// The discrete acceleration buckets the self-driven ego snaps to, matching
/// the action effects available to an external agent.
const ACC_BUCKETS: [f64; 10] = [-4.0, -2.0, -1.0, -0.5, 0.0, 0.1, 0.25, 0.5, 1.0, 2.0];

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID.
    pub(crate) id: VehicleId,
    /// Whether this is the agent-controlled ego vehicle.
    is_ego: bool,
    /// The longitudinal position in m.
    x: f64,
    /// The lateral position in m. Tied to the lane during straight travel,
    /// diverging from it only while a maneuver is in flight.
    y: f64,
    /// The current lane index.
    lane: usize,
    /// The target lane index. Differs from `lane` only mid-change.
    target_lane: usize,
    /// The longitudinal speed in m/s.
    speed: f64,
    /// The lateral speed in m/s.
    lateral_speed: f64,
    /// The heading angle in radians.
    heading: f64,
    /// The steering angle in radians.
    steering: f64,
    /// The most recent longitudinal acceleration in m/s<sup>2</sup>. For the
    /// directly-controlled ego this is the open-loop command.
    acc: f64,
    /// The most recent lateral acceleration in m/s<sup>2</sup>.
    lateral_acc: f64,
    /// The longitudinal position re-anchored to the ego frame every tick.
    relative_x: f64,
    /// The vehicle's extent along the direction of travel in m.
    length: f64,
    /// The car-following model.
    following: FollowingModel,
    /// The desired speed in m/s.
    v_max: f64,
    /// The desired speed the vehicle returns to after an overtake, in m/s.
    initial_v_max: f64,
    /// MOBIL politeness factor.
    politeness: f64,
    /// MOBIL acceleration-gain threshold in m/s<sup>2</sup>.
    a_thr: f64,
    /// The in-flight maneuver trajectory, drained one state per tick.
    trajectory: Trajectory,
    /// Whether a maneuver trajectory has been assigned and not yet finished.
    ongoing_trajectory: bool,
    /// Set for exactly the one tick on which the maneuver drains.
    trajectory_completed: bool,
    /// The number of completed lane changes.
    lane_changes: usize,
    /// The same-lane vehicle immediately ahead. Recomputed every tick,
    /// never carried across ticks.
    ahead: Option<VehicleId>,
    /// The steering controller tracking the active trajectory.
    pursuit: PurePursuit,
    /// Past states of the ego vehicle, appended once per tick.
    history: Vec<KinematicState>,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug)]
pub struct VehicleAttributes {
    /// The longitudinal position in m.
    pub x: f64,
    /// The lane index.
    pub lane: usize,
    /// The initial speed in km/h.
    pub speed: f64,
    /// The desired speed in km/h.
    pub v_max: f64,
    /// Whether this is the agent-controlled ego vehicle.
    pub is_ego: bool,
}

impl Vehicle {
    /// Creates a new vehicle.
    pub(crate) fn new(id: VehicleId, attributes: &VehicleAttributes, config: &Config) -> Self {
        Self {
            id,
            is_ego: attributes.is_ego,
            x: attributes.x,
            y: attributes.lane as f64 * config.lane_width,
            lane: attributes.lane,
            target_lane: attributes.lane,
            speed: attributes.speed * KMH_TO_MS,
            lateral_speed: 0.0,
            heading: 0.0,
            steering: 0.0,
            acc: 0.0,
            lateral_acc: 0.0,
            relative_x: attributes.x,
            length: config.vehicle_length,
            following: FollowingModel::new(&FollowingParams::default()),
            v_max: attributes.v_max * KMH_TO_MS,
            initial_v_max: attributes.v_max * KMH_TO_MS,
            politeness: 0.5,
            a_thr: 0.2,
            trajectory: Trajectory::new(),
            ongoing_trajectory: false,
            trajectory_completed: false,
            lane_changes: 0,
            ahead: None,
            pursuit: PurePursuit::new(LOOK_AHEAD, AXLE_FRONT + AXLE_REAR),
            history: Vec::new(),
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// Whether this is the agent-controlled ego vehicle.
    pub fn is_ego(&self) -> bool {
        self.is_ego
    }

    /// The longitudinal position in m.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// The lateral position in m.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// The current lane index.
    pub fn lane(&self) -> usize {
        self.lane
    }

    /// The target lane index; equals [Self::lane] unless a change is in flight.
    pub fn target_lane(&self) -> usize {
        self.target_lane
    }

    /// The longitudinal speed in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// The desired speed in m/s.
    pub fn v_max(&self) -> f64 {
        self.v_max
    }

    /// The heading angle in radians.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// The vehicle's extent along the direction of travel in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The longitudinal position in the ego frame, in m.
    pub fn relative_x(&self) -> f64 {
        self.relative_x
    }

    pub(crate) fn set_relative_x(&mut self, relative_x: f64) {
        self.relative_x = relative_x;
    }

    /// The number of lane changes the vehicle has completed.
    pub fn lane_changes(&self) -> usize {
        self.lane_changes
    }

    /// Whether a maneuver trajectory is currently being executed.
    pub fn has_active_trajectory(&self) -> bool {
        !self.trajectory.is_empty()
    }

    /// The same-lane vehicle immediately ahead, as of the current tick.
    pub fn ahead(&self) -> Option<VehicleId> {
        self.ahead
    }

    pub(crate) fn set_ahead(&mut self, ahead: Option<VehicleId>) {
        self.ahead = ahead;
    }

    /// The ego vehicle's recorded past states.
    pub fn history(&self) -> &[KinematicState] {
        &self.history
    }

    /// The vehicle's current kinematic state.
    pub fn state(&self) -> KinematicState {
        KinematicState {
            pos: Point2d::new(self.x, self.y),
            vel: Vector2d::new(self.speed, self.lateral_speed),
            acc: Vector2d::new(self.acc, self.lateral_acc),
            jerk: Vector2d::new(0.0, 0.0),
            heading: self.heading,
            steering: self.steering,
        }
    }

    /// This vehicle seen as the leader of a follower at `follower_x`.
    pub(crate) fn as_leader_for(&self, follower_x: f64) -> Leader {
        Leader {
            gap: self.x - follower_x - self.length,
            vel: self.speed,
        }
    }

    /// Computes the car-following acceleration against the vehicle ahead.
    pub(crate) fn idm_accel(&self, leader: Option<Leader>) -> f64 {
        self.following.accel(self.speed, self.v_max, leader)
    }

    /// Decides whether changing into the target lane is worthwhile, per the
    /// MOBIL incentive/safety trade-off.
    ///
    /// A vehicle mid-maneuver never re-decides, and a target-lane follower
    /// within the cut-in guard distance blocks the change regardless of the
    /// incentive.
    pub(crate) fn should_change_lane(
        &self,
        ahead_current: Option<&Vehicle>,
        behind_current: Option<&Vehicle>,
        ahead_target: Option<&Vehicle>,
        behind_target: Option<&Vehicle>,
    ) -> bool {
        if !self.trajectory.is_empty() {
            return false;
        }

        let current_acc = self.idm_accel(ahead_current.map(|v| v.as_leader_for(self.x)));
        let new_acc = self.idm_accel(ahead_target.map(|v| v.as_leader_for(self.x)));
        let acc_gain = new_acc - current_acc;
        if acc_gain < self.a_thr {
            return false;
        }

        let mut acc_loss = 0.0;
        if let Some(behind) = behind_current {
            acc_loss += self.politeness
                * (behind.idm_accel(None)
                    - behind.idm_accel(ahead_current.map(|v| v.as_leader_for(behind.x))));
        }
        if let Some(behind) = behind_target {
            acc_loss += self.politeness
                * (behind.idm_accel(None) - behind.idm_accel(Some(self.as_leader_for(behind.x))));
        }

        if let Some(behind) = behind_target {
            if self.x - behind.x < CUT_IN_GUARD {
                return false;
            }
        }

        acc_gain - acc_loss > 0.0
    }

    /// Assigns a maneuver trajectory toward `target_lane`.
    pub(crate) fn assign_maneuver(&mut self, trajectory: Trajectory, target_lane: usize) {
        self.target_lane = target_lane;
        self.trajectory = trajectory;
        self.ongoing_trajectory = true;
    }

    /// Sets the ego vehicle's open-loop longitudinal acceleration.
    pub(crate) fn set_command_accel(&mut self, accel: f64) {
        self.acc = accel;
    }

    /// Whether the maneuver trajectory drained on this tick.
    pub(crate) fn trajectory_completed(&self) -> bool {
        self.trajectory_completed
    }

    /// Finalises a completed lane change: the vehicle now belongs to its
    /// target lane. Roster membership is moved by the lane manager, which is
    /// the only place membership changes.
    pub(crate) fn complete_lane_change(&mut self) {
        self.lane = self.target_lane;
        self.trajectory_completed = false;
    }

    /// Nudges the desired speed up while stuck behind traffic.
    pub(crate) fn boost_v_max(&mut self, delta: f64) {
        self.v_max += delta;
    }

    /// Restores the desired speed after an overtake.
    pub(crate) fn reset_v_max(&mut self) {
        self.v_max = self.initial_v_max;
    }

    /// Scales the desired speed by the given adjustment factor.
    pub(crate) fn scale_v_max(&mut self, factor: f64) {
        self.v_max = self.initial_v_max * factor;
        self.initial_v_max = self.v_max;
    }

    /// Integrates the ego vehicle one tick under direct open-loop control,
    /// tracking the active trajectory if one is in flight.
    pub(crate) fn integrate_ego(&mut self, dt: f64) {
        self.trajectory.next_state();
        self.speed = f64::max(MIN_SPEED, self.speed + self.acc * dt);
        self.history.push(self.state());
        let steering = self.pursuit.steering_angle(&self.state(), &self.trajectory);
        self.bicycle_step(steering, dt);
    }

    /// Integrates a vehicle one tick under car following.
    pub(crate) fn integrate_following(&mut self, leader: Option<Leader>, dt: f64) {
        self.trajectory.next_state();
        let accel = self.idm_accel(leader);
        self.acc = accel;
        self.speed = f64::max(MIN_SPEED, self.speed + accel * dt);
        let steering = self.pursuit.steering_angle(&self.state(), &self.trajectory);
        self.bicycle_step(steering, dt);
    }

    /// Integrates a vehicle one tick under car following with the ego's
    /// acceleration snapped to the discrete action-space buckets, keeping
    /// the self-driven ego comparable to an externally controlled one.
    pub(crate) fn integrate_discretized(&mut self, leader: Option<Leader>, dt: f64) {
        self.trajectory.next_state();
        let mut accel = self.idm_accel(leader);
        if self.is_ego {
            accel = nearest_bucket(accel);
        }
        self.acc = accel;
        self.speed = f64::max(MIN_SPEED, self.speed + accel * dt);
        let steering = self.pursuit.steering_angle(&self.state(), &self.trajectory);
        self.bicycle_step(steering, dt);
        if self.is_ego {
            self.history.push(self.state());
        }
    }

    /// Advances the pose through the kinematic bicycle model and detects
    /// the instant the active maneuver completes.
    fn bicycle_step(&mut self, steering: f64, dt: f64) {
        let wheelbase = AXLE_FRONT + AXLE_REAR;
        let slip = ((AXLE_REAR / wheelbase) * steering.tan()).atan();

        self.x += self.speed * (self.heading + slip).cos() * dt;
        self.y += self.speed * (self.heading + slip).sin() * dt;
        self.heading += (self.speed / wheelbase) * steering.sin() * dt;
        self.steering = steering;

        if self.trajectory.is_empty() && self.ongoing_trajectory && !self.trajectory_completed {
            // The one tick on which the maneuver drains.
            self.heading = 0.0;
            self.trajectory_completed = true;
            self.ongoing_trajectory = false;
            self.lane_changes += 1;
        }
    }
}

/// Snaps an acceleration to the nearest discrete bucket.
fn nearest_bucket(accel: f64) -> f64 {
    ACC_BUCKETS
        .into_iter()
        .min_by(|a, b| (a - accel).abs().total_cmp(&(b - accel).abs()))
        .expect("bucket list is non-empty")
}
