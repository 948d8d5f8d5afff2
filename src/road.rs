use crate::math::{heading, Point2d, Vector2d};
use crate::{LaneId, RoadId};
use arrayvec::ArrayVec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub(crate) mod geometry;

/// The maximum number of neighbours a road can have.
pub const MAX_NEIGHBOURS: usize = 4;

/// The shape of a placed road segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RoadKind {
    /// A dead end, connected to a single neighbour.
    Terminal,
    /// A straight section joining two opposite neighbours.
    Straight,
    /// A corner joining two neighbours at an angle.
    Bend,
    /// A three-way intersection.
    Junction,
    /// A roundabout, on which traffic circulates counter-clockwise.
    Roundabout,
    /// A four-way intersection.
    Crossroad,
}

impl RoadKind {
    /// Every road kind, in declaration order.
    pub const ALL: [RoadKind; 6] = [
        RoadKind::Terminal,
        RoadKind::Straight,
        RoadKind::Bend,
        RoadKind::Junction,
        RoadKind::Roundabout,
        RoadKind::Crossroad,
    ];

    /// A dense index for per-kind lookup tables.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A single placed road segment: a node in the road graph.
#[derive(Clone, Debug)]
pub struct Road {
    /// The road ID.
    id: RoadId,
    /// The shape of the road.
    kind: RoadKind,
    /// The world space position of the road's centre.
    position: Point2d,
    /// The road's heading in radians, counter-clockwise from the x-axis.
    yaw: f64,
    /// The speed limit used to weigh routes through this road.
    speed_limit: f64,
    /// The neighbouring roads, in the order they were declared.
    neighbours: ArrayVec<RoadId, MAX_NEIGHBOURS>,
    /// The lanes across this road.
    lanes: SmallVec<[LaneId; 4]>,
}

/// An ordered path of waypoints across a road for one direction of travel.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The lane ID.
    id: LaneId,
    /// The road the lane crosses.
    road: RoadId,
    /// Index into the road's neighbour list of the road this lane comes from.
    from_road_idx: usize,
    /// Index into the road's neighbour list of the road this lane leads to.
    to_road_idx: usize,
    /// The waypoints in world space, from entry to exit.
    waypoints: Vec<Point2d>,
    /// The length of the path through the waypoints in m.
    length: f64,
}

impl Road {
    pub(crate) fn new(
        id: RoadId,
        kind: RoadKind,
        position: Point2d,
        yaw: f64,
        speed_limit: f64,
    ) -> Self {
        Self {
            id,
            kind,
            position,
            yaw,
            speed_limit,
            neighbours: ArrayVec::new(),
            lanes: SmallVec::new(),
        }
    }

    /// Gets the road's ID.
    pub fn id(&self) -> RoadId {
        self.id
    }

    /// Gets the road's shape.
    pub fn kind(&self) -> RoadKind {
        self.kind
    }

    /// The world space position of the road's centre.
    pub fn position(&self) -> Point2d {
        self.position
    }

    /// The road's heading in radians.
    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    /// A unit vector along the road's heading; the with-flow direction of travel.
    pub fn forward(&self) -> Vector2d {
        heading(self.yaw)
    }

    /// The speed limit of the road.
    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    /// The neighbouring roads.
    pub fn neighbours(&self) -> &[RoadId] {
        &self.neighbours
    }

    /// The position of `road` within this road's neighbour list.
    pub fn neighbour_index(&self, road: RoadId) -> Option<usize> {
        self.neighbours.iter().position(|id| *id == road)
    }

    /// The lanes across this road.
    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }

    pub(crate) fn push_neighbour(&mut self, road: RoadId) {
        self.neighbours.push(road);
    }

    pub(crate) fn push_lane(&mut self, lane: LaneId) {
        self.lanes.push(lane);
    }
}

impl Lane {
    pub(crate) fn new(
        id: LaneId,
        road: RoadId,
        from_road_idx: usize,
        to_road_idx: usize,
        waypoints: Vec<Point2d>,
        length: f64,
    ) -> Self {
        Self {
            id,
            road,
            from_road_idx,
            to_road_idx,
            waypoints,
            length,
        }
    }

    /// Gets the lane's ID.
    pub fn id(&self) -> LaneId {
        self.id
    }

    /// The road this lane crosses.
    pub fn road(&self) -> RoadId {
        self.road
    }

    /// Index into the parent road's neighbour list of the road this lane comes from.
    pub fn from_road_idx(&self) -> usize {
        self.from_road_idx
    }

    /// Index into the parent road's neighbour list of the road this lane leads to.
    pub fn to_road_idx(&self) -> usize {
        self.to_road_idx
    }

    /// The waypoints, from entry to exit.
    pub fn waypoints(&self) -> &[Point2d] {
        &self.waypoints
    }

    /// The length of the lane in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The overall direction of travel along the lane: the unit vector from
    /// its first to its last waypoint, or zero for a lane that returns to its start.
    pub fn flow(&self) -> Vector2d {
        use cgmath::InnerSpace;
        match (self.waypoints.first(), self.waypoints.last()) {
            (Some(first), Some(last)) => {
                let chord = last - first;
                if chord.magnitude2() > 1e-12 {
                    chord.normalize()
                } else {
                    Vector2d::new(0.0, 0.0)
                }
            }
            _ => Vector2d::new(0.0, 0.0),
        }
    }
}
