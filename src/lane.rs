use crate::{VehicleId, VehicleSet};
use itertools::Itertools;

/// A single lane of the highway.
///
/// A lane owns no vehicles, only their IDs; the vehicle arena lives in the
/// lane manager. The roster is kept sorted by longitudinal position during
/// neighbor discovery at the start of every tick.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The lane index.
    id: usize,
    /// The vehicles in the lane, front of the roster being furthest back.
    vehicles: Vec<VehicleId>,
    /// Signed lane-index distance to the ego's lane.
    distance_to_ego: i32,
}

impl Lane {
    /// Creates an empty lane.
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            vehicles: vec![],
            distance_to_ego: 0,
        }
    }

    /// The lane index.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The IDs of the vehicles in the lane.
    pub fn vehicle_ids(&self) -> &[VehicleId] {
        &self.vehicles
    }

    /// The number of vehicles in the lane.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// Whether the lane holds no vehicles.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Signed lane-index distance from this lane to the ego's lane.
    pub fn distance_to_ego(&self) -> i32 {
        self.distance_to_ego
    }

    pub(crate) fn set_distance_to_ego(&mut self, distance: i32) {
        self.distance_to_ego = distance;
    }

    pub(crate) fn push(&mut self, id: VehicleId) {
        self.vehicles.push(id);
    }

    pub(crate) fn remove(&mut self, id: VehicleId) {
        if let Some(idx) = self.vehicles.iter().rposition(|v| *v == id) {
            self.vehicles.remove(idx);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.vehicles.clear();
    }

    /// Sorts the roster by longitudinal position, back to front.
    pub(crate) fn sort_by_position(&mut self, vehicles: &VehicleSet) {
        self.vehicles
            .sort_by(|a, b| vehicles[*a].x().total_cmp(&vehicles[*b].x()));
    }

    /// Drops the vehicles for which `keep` is false, returning the dropped IDs.
    pub(crate) fn retain(
        &mut self,
        vehicles: &VehicleSet,
        keep: impl Fn(&crate::Vehicle) -> bool,
        removed: &mut Vec<VehicleId>,
    ) {
        self.vehicles.retain(|id| {
            let kept = keep(&vehicles[*id]);
            if !kept {
                removed.push(*id);
            }
            kept
        });
    }

    /// The average speed of the vehicles in the lane, in m/s. Zero for an
    /// empty lane.
    pub fn avg_speed(&self, vehicles: &VehicleSet) -> f64 {
        if self.vehicles.is_empty() {
            return 0.0;
        }
        let total: f64 = self.vehicles.iter().map(|id| vehicles[*id].speed()).sum();
        total / self.vehicles.len() as f64
    }

    /// The average time gap between longitudinally adjacent vehicles, in s.
    /// Zero when the lane holds fewer than two vehicles.
    pub fn avg_time_gap(&self, vehicles: &VehicleSet) -> f64 {
        if self.vehicles.len() < 2 {
            return 0.0;
        }
        let gaps: Vec<f64> = self
            .vehicles
            .iter()
            .map(|id| &vehicles[*id])
            .sorted_by(|a, b| a.x().total_cmp(&b.x()))
            .tuple_windows()
            .map(|(behind, ahead)| (ahead.x() - behind.x()) / behind.speed())
            .collect();
        gaps.iter().sum::<f64>() / gaps.len() as f64
    }
}
