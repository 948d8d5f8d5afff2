pub use avoidance::{AvoidanceParams, CollisionAvoidance, Probe, Verdict};
pub use cgmath;
pub use error::{Error, Result, TopologyError};
pub use network::{RoadDescriptor, RoadNetwork, TopologyDescription, DEFAULT_LANE_OFFSET};
pub use road::{Lane, Road, RoadKind};
pub use route::{RoutePlanner, RouteStrategy, RouteWeights};
pub use selector::{LaneRule, LaneSelector};
pub use simulation::{Simulation, SimulationConfig};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::Interval;
pub use vehicle::{Vehicle, VehicleAttributes, VehicleState, VehicleTransform};

pub mod avoidance;
mod debug;
mod error;
pub mod math;
mod network;
mod road;
pub mod route;
pub mod selector;
mod simulation;
mod util;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Road].
    pub struct RoadId;
    /// Unique ID of a [Lane].
    pub struct LaneId;
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
}

type RoadSet = SlotMap<RoadId, Road>;
type LaneSet = SlotMap<LaneId, Lane>;
type VehicleSet = SlotMap<VehicleId, Vehicle>;
