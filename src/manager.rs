use crate::config::Config;
use crate::debug::{debug_desync, debug_lane_change};
use crate::decision::DecisionTranslator;
use crate::lane::Lane;
use crate::vehicle::{Leader, Vehicle, VehicleAttributes};
use crate::{VehicleId, VehicleSet};
use log::warn;
use slotmap::Key;

/// Same-lane neighbor queries ignore vehicles farther away than this, in m.
const NEIGHBOR_WINDOW: f64 = 150.0;

/// A clear run of at least this length in the exit lane lets an overtaking
/// vehicle merge back, in m.
const TAKEOVER_GAP: f64 = 100.0;

/// The desired-speed nudge applied while boxed in behind traffic, in m/s.
const KEEP_UP_BOOST: f64 = 0.05;

/// Vehicles farther than this from the ego are dropped from the
/// simulation, in m.
const PRUNE_DISTANCE: f64 = 20_000.0;

/// Owns the lanes and the vehicle arena, and runs the per-tick update
/// pipeline: neighbor discovery, integration, relative-position
/// bookkeeping, lane-change completion, autonomous decision-making,
/// statistics and pruning, in that order.
pub struct LaneManager {
    config: Config,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The lanes, ordered left to right.
    lanes: Vec<Lane>,
    /// The distinguished agent-controlled vehicle.
    ego: VehicleId,
    /// Plans the autonomous vehicles' lane changes.
    translator: DecisionTranslator,
    /// Whether an ego lane change is in flight under direct control.
    lane_change_in_progress: bool,
    /// Completed ego lane changes this episode.
    ego_lane_changes: usize,
    /// Average speed across occupied lanes, in m/s.
    avg_speed: f64,
    /// Average time gap across lanes with a computable gap, in s.
    avg_time_gap: f64,
    /// Ticks the ego has spent in each lane this episode.
    time_in_lanes: Vec<usize>,
    /// Relative-position desyncs healed this episode.
    desync_events: usize,
}

impl LaneManager {
    /// Creates a lane manager with empty lanes.
    pub fn new(config: &Config) -> Self {
        Self {
            config: *config,
            vehicles: VehicleSet::default(),
            lanes: (0..config.num_lanes).map(Lane::new).collect(),
            ego: VehicleId::null(),
            translator: DecisionTranslator::new(config),
            lane_change_in_progress: false,
            ego_lane_changes: 0,
            avg_speed: 0.0,
            avg_time_gap: 0.0,
            time_in_lanes: vec![0; config.num_lanes],
            desync_events: 0,
        }
    }

    /// Adds a vehicle to the simulation and registers it in its lane.
    pub fn add_vehicle(&mut self, attributes: &VehicleAttributes) -> VehicleId {
        assert!(
            attributes.lane < self.config.num_lanes,
            "vehicle lane index out of range"
        );
        let config = self.config;
        let id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, attributes, &config));
        self.lanes[attributes.lane].push(id);
        if attributes.is_ego {
            self.ego = id;
        }
        id
    }

    /// Removes every vehicle and resets the per-episode statistics.
    pub fn remove_all(&mut self) {
        self.vehicles.clear();
        for lane in &mut self.lanes {
            lane.clear();
        }
        self.ego = VehicleId::null();
        self.lane_change_in_progress = false;
        self.ego_lane_changes = 0;
        self.avg_speed = 0.0;
        self.avg_time_gap = 0.0;
        self.time_in_lanes = vec![0; self.config.num_lanes];
        self.desync_events = 0;
    }

    /// The agent-controlled ego vehicle.
    pub fn ego(&self) -> &Vehicle {
        self.vehicles
            .get(self.ego)
            .expect("no ego vehicle registered")
    }

    pub(crate) fn ego_mut(&mut self) -> &mut Vehicle {
        self.vehicles
            .get_mut(self.ego)
            .expect("no ego vehicle registered")
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, id: VehicleId) -> &Vehicle {
        &self.vehicles[id]
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub(crate) fn iter_vehicles_mut(&mut self) -> impl Iterator<Item = &mut Vehicle> {
        self.vehicles.values_mut()
    }

    /// The lanes, ordered left to right.
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// Whether an ego lane change is in flight under direct control.
    pub fn lane_change_in_progress(&self) -> bool {
        self.lane_change_in_progress
    }

    pub(crate) fn set_lane_change_in_progress(&mut self, in_progress: bool) {
        self.lane_change_in_progress = in_progress;
    }

    /// Completed ego lane changes this episode.
    pub fn ego_lane_changes(&self) -> usize {
        self.ego_lane_changes
    }

    /// Average speed across occupied lanes, in m/s.
    pub fn avg_speed(&self) -> f64 {
        self.avg_speed
    }

    /// Average time gap across lanes with a computable gap, in s.
    pub fn avg_time_gap(&self) -> f64 {
        self.avg_time_gap
    }

    /// Ticks the ego has spent in each lane this episode.
    pub fn time_in_lanes(&self) -> &[usize] {
        &self.time_in_lanes
    }

    /// Relative-position desyncs healed this episode. A regression gate:
    /// a healthy run reports zero.
    pub fn desync_events(&self) -> usize {
        self.desync_events
    }

    /// Whether the ego occupies the leftmost (overtaking) lane.
    pub fn is_ego_in_leftmost_lane(&self) -> bool {
        self.ego().lane() == 0
    }

    /// Whether the ego occupies the rightmost lane.
    pub fn is_ego_in_rightmost_lane(&self) -> bool {
        self.ego().lane() == self.config.num_lanes - 1
    }

    /// Advances the simulation by one tick.
    pub fn update(&mut self) {
        self.find_ahead_vehicles();
        if self.config.ego_drives_with_mobil {
            self.integrate_discretized();
        } else {
            self.integrate();
        }
        self.reset_positions_wrt_ego();
        self.check_relative_x();
        self.update_lane_attributes();
        self.update_non_ego_lane_changes();
        self.update_statistics();
        self.prune_distant_vehicles();
    }

    /// Sorts each lane's roster by position and assigns every vehicle its
    /// immediately-ahead neighbor, `None` for the lane leader. The
    /// assignment is transient and recomputed from scratch each tick.
    fn find_ahead_vehicles(&mut self) {
        for lane in &mut self.lanes {
            lane.sort_by_position(&self.vehicles);
        }
        for lane in &self.lanes {
            let ids = lane.vehicle_ids();
            for (idx, id) in ids.iter().enumerate() {
                self.vehicles[*id].set_ahead(ids.get(idx + 1).copied());
            }
        }
    }

    /// The vehicle ahead as a car-following snapshot.
    fn leader_of(&self, id: VehicleId) -> Option<Leader> {
        let vehicle = &self.vehicles[id];
        vehicle
            .ahead()
            .and_then(|ahead| self.vehicles.get(ahead))
            .map(|ahead| ahead.as_leader_for(vehicle.x()))
    }

    /// A snapshot of every vehicle ID, in lane order.
    fn roster(&self) -> Vec<VehicleId> {
        let mut ids = Vec::with_capacity(self.vehicles.len());
        for lane in &self.lanes {
            ids.extend_from_slice(lane.vehicle_ids());
        }
        ids
    }

    /// Integrates all vehicles under direct ego control: the ego follows
    /// its open-loop command and any active trajectory, everyone else the
    /// car-following model.
    fn integrate(&mut self) {
        let dt = self.config.time_step;
        let ego = self.ego;
        self.vehicles
            .get_mut(ego)
            .expect("no ego vehicle registered")
            .integrate_ego(dt);
        if self.vehicles[ego].trajectory_completed() {
            self.finish_lane_change(ego);
        }

        for id in self.roster() {
            if self.vehicles[id].is_ego() {
                continue;
            }
            let leader = self.leader_of(id);
            self.vehicles[id].integrate_following(leader, dt);
            if self.vehicles[id].trajectory_completed() {
                self.finish_lane_change(id);
            }
        }
    }

    /// Integrates all vehicles through the car-following model, the ego's
    /// acceleration snapped to the discrete action buckets (alternate
    /// control mode).
    fn integrate_discretized(&mut self) {
        let dt = self.config.time_step;
        for id in self.roster() {
            let leader = self.leader_of(id);
            self.vehicles[id].integrate_discretized(leader, dt);
            if self.vehicles[id].trajectory_completed() {
                self.finish_lane_change(id);
            }
        }
    }

    /// Moves a vehicle that finished its maneuver onto its target lane's
    /// roster. This is the sole place lane membership changes.
    fn finish_lane_change(&mut self, id: VehicleId) {
        let (from, to, x, is_ego) = {
            let vehicle = &self.vehicles[id];
            (
                vehicle.lane(),
                vehicle.target_lane(),
                vehicle.x(),
                vehicle.is_ego(),
            )
        };
        self.lanes[from].remove(id);
        self.lanes[to].push(id);
        self.vehicles[id].complete_lane_change();
        debug_lane_change(x, from, to, is_ego);
        if is_ego {
            self.lane_change_in_progress = false;
            self.ego_lane_changes += 1;
        }
    }

    /// Re-anchors every non-ego vehicle's relative position to the ego frame.
    fn reset_positions_wrt_ego(&mut self) {
        let (ego_x, ego_relative_x) = {
            let ego = self.ego();
            (ego.x(), ego.relative_x())
        };
        for vehicle in self.vehicles.values_mut() {
            if !vehicle.is_ego() {
                vehicle.set_relative_x(ego_relative_x + (vehicle.x() - ego_x));
            }
        }
    }

    /// Verifies the relative-position invariant and heals it by forcing a
    /// full resync when violated. Self-healing, never fatal; the event
    /// counter lets callers treat any occurrence as a regression.
    fn check_relative_x(&mut self) {
        let (ego_x, ego_relative_x) = {
            let ego = self.ego();
            (ego.x(), ego.relative_x())
        };
        let desynced = self.vehicles.values().find_map(|vehicle| {
            let mismatch = !vehicle.is_ego()
                && (vehicle.relative_x() - ego_relative_x).round()
                    != (vehicle.x() - ego_x).round();
            mismatch.then(|| (vehicle.x(), vehicle.relative_x()))
        });
        if let Some((x, relative_x)) = desynced {
            let expected = ego_relative_x + (x - ego_x);
            warn!("relative position desynced (expected {expected:.1}, was {relative_x:.1}); resyncing");
            debug_desync(expected, relative_x);
            self.desync_events += 1;
            self.reset_positions_wrt_ego();
        }
    }

    /// Updates each lane's signed distance to the ego's lane.
    fn update_lane_attributes(&mut self) {
        let ego_lane = self.ego().lane() as i32;
        for lane in &mut self.lanes {
            let distance = lane.id() as i32 - ego_lane;
            lane.set_distance_to_ego(distance);
        }
    }

    /// Finds the nearest vehicle ahead of `id` in the given lane, ignoring
    /// anything beyond the neighbor window.
    pub fn find_vehicle_ahead(&self, id: VehicleId, lane: usize) -> Option<VehicleId> {
        let x = self.vehicles[id].x();
        self.lanes[lane]
            .vehicle_ids()
            .iter()
            .copied()
            .filter(|other| *other != id && self.vehicles[*other].x() > x)
            .min_by(|a, b| self.vehicles[*a].x().total_cmp(&self.vehicles[*b].x()))
            .filter(|ahead| self.vehicles[*ahead].x() - x <= NEIGHBOR_WINDOW)
    }

    /// Finds the nearest vehicle behind `id` in the given lane, ignoring
    /// anything beyond the neighbor window.
    pub fn find_vehicle_behind(&self, id: VehicleId, lane: usize) -> Option<VehicleId> {
        let x = self.vehicles[id].x();
        self.lanes[lane]
            .vehicle_ids()
            .iter()
            .copied()
            .filter(|other| *other != id && self.vehicles[*other].x() < x)
            .max_by(|a, b| self.vehicles[*a].x().total_cmp(&self.vehicles[*b].x()))
            .filter(|behind| x - self.vehicles[*behind].x() <= NEIGHBOR_WINDOW)
    }

    /// The nearest in-range non-ego vehicles ahead of and behind the ego in
    /// the given lane.
    pub fn find_front_back(&self, lane: usize) -> (Option<VehicleId>, Option<VehicleId>) {
        let ego = self.ego();
        let mut front: Option<(VehicleId, f64)> = None;
        let mut back: Option<(VehicleId, f64)> = None;
        for id in self.lanes[lane].vehicle_ids() {
            let vehicle = &self.vehicles[*id];
            if vehicle.is_ego() {
                continue;
            }
            let dx = vehicle.x() - ego.x();
            if dx.abs() >= PRUNE_DISTANCE {
                continue;
            }
            let slot = if dx > 0.0 { &mut front } else { &mut back };
            if slot.map_or(true, |(_, best)| dx.abs() < best) {
                *slot = Some((*id, dx.abs()));
            }
        }
        (front.map(|(id, _)| id), back.map(|(id, _)| id))
    }

    /// The `count` non-ego vehicles nearest to the ego by relative
    /// longitudinal distance, closest first.
    pub fn get_nearby_vehicles(&self, count: usize) -> Vec<VehicleId> {
        let ego_relative_x = self.ego().relative_x();
        let mut ids: Vec<VehicleId> = self
            .vehicles
            .iter()
            .filter(|(_, vehicle)| !vehicle.is_ego())
            .map(|(id, _)| id)
            .collect();
        ids.sort_by(|a, b| {
            let da = (self.vehicles[*a].relative_x() - ego_relative_x).abs();
            let db = (self.vehicles[*b].relative_x() - ego_relative_x).abs();
            da.total_cmp(&db)
        });
        ids.truncate(count);
        ids
    }

    /// Runs the autonomous lane-change decisions: the one-directional
    /// takeover stage first, then the symmetric MOBIL evaluation against
    /// the left and right lanes, first passing lane wins.
    fn update_non_ego_lane_changes(&mut self) {
        for id in self.roster() {
            let (lane, left, right) = {
                let vehicle = &self.vehicles[id];
                if vehicle.is_ego() && !self.config.ego_drives_with_mobil {
                    continue;
                }
                if vehicle.has_active_trajectory() {
                    continue;
                }
                let lane = vehicle.lane();
                (
                    lane,
                    lane.checked_sub(1),
                    (lane + 1 < self.config.num_lanes).then(|| lane + 1),
                )
            };

            // Takeover stage: a vehicle that used the overtaking lane merges
            // back right once that lane is clear ahead, and otherwise nudges
            // its desired speed up to keep up with the traffic around it.
            let mut change: Option<(usize, bool)> = None;
            let is_aggressive_ego = self.vehicles[id].is_ego() && self.config.aggressive_driver;
            if !is_aggressive_ego && lane == 0 {
                if let Some(right) = right {
                    let clear = match self.find_vehicle_ahead(id, right) {
                        Some(ahead) => {
                            (self.vehicles[ahead].x() - self.vehicles[id].x()).abs() > TAKEOVER_GAP
                        }
                        None => true,
                    };
                    if clear {
                        change = Some((right, true));
                    } else {
                        self.vehicles[id].boost_v_max(KEEP_UP_BOOST);
                    }
                }
            }

            // Symmetric MOBIL evaluation, first passing lane wins.
            if change.is_none() {
                let vehicle = &self.vehicles[id];
                let ahead_current = self.find_vehicle_ahead(id, lane);
                let behind_current = self.find_vehicle_behind(id, lane);
                for target in [left, right].into_iter().flatten() {
                    let ahead_target = self.find_vehicle_ahead(id, target);
                    let behind_target = self.find_vehicle_behind(id, target);
                    if vehicle.should_change_lane(
                        ahead_current.map(|vid| &self.vehicles[vid]),
                        behind_current.map(|vid| &self.vehicles[vid]),
                        ahead_target.map(|vid| &self.vehicles[vid]),
                        behind_target.map(|vid| &self.vehicles[vid]),
                    ) {
                        change = Some((target, false));
                        break;
                    }
                }
            }

            if let Some((target, restore_v_max)) = change {
                let state = self.vehicles[id].state();
                let trajectory = self.translator.plan_lane_change(&state, lane, target);
                let vehicle = &mut self.vehicles[id];
                vehicle.assign_maneuver(trajectory, target);
                if restore_v_max {
                    vehicle.reset_v_max();
                }
            }
        }
    }

    /// Recomputes the per-lane aggregates and the ego's time-in-lane
    /// histogram.
    fn update_statistics(&mut self) {
        let speeds: Vec<f64> = self
            .lanes
            .iter()
            .map(|lane| lane.avg_speed(&self.vehicles))
            .filter(|speed| *speed != 0.0)
            .collect();
        self.avg_speed = if speeds.is_empty() {
            0.0
        } else {
            speeds.iter().sum::<f64>() / speeds.len() as f64
        };

        let gaps: Vec<f64> = self
            .lanes
            .iter()
            .map(|lane| lane.avg_time_gap(&self.vehicles))
            .filter(|gap| *gap != 0.0)
            .collect();
        self.avg_time_gap = if gaps.is_empty() {
            0.0
        } else {
            gaps.iter().sum::<f64>() / gaps.len() as f64
        };

        let ego_lane = self.ego().lane();
        self.time_in_lanes[ego_lane] += 1;
    }

    /// Drops vehicles that have fallen too far behind or ahead of the ego.
    fn prune_distant_vehicles(&mut self) {
        let ego_x = self.ego().x();
        let mut removed = vec![];
        for lane in &mut self.lanes {
            lane.retain(
                &self.vehicles,
                |vehicle| (vehicle.x() - ego_x).abs() < PRUNE_DISTANCE,
                &mut removed,
            );
        }
        for id in removed {
            self.vehicles.remove(id);
        }
    }
}
