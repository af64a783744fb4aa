pub use action::Action;
pub use cgmath;
pub use config::Config;
pub use decision::{Decision, DecisionTranslator};
pub use lane::Lane;
pub use manager::LaneManager;
pub use planner::TrajectoryPlanner;
pub use simulation::{Observation, Simulation, Step, StepInfo};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use state::{KinematicState, Trajectory};
pub use util::Interval;
pub use vehicle::{Vehicle, VehicleAttributes};

mod action;
mod config;
mod debug;
mod decision;
pub mod generator;
mod lane;
mod manager;
pub mod math;
mod planner;
mod reward;
mod risk;
mod simulation;
mod state;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
