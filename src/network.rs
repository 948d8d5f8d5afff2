use crate::error::Result;
use crate::road::geometry::{lane_waypoints, LaneEnds};
use crate::road::{Lane, Road};
use crate::{LaneId, LaneSet, RoadId, RoadSet};
use itertools::iproduct;
use slotmap::SlotMap;

pub use topology::{RoadDescriptor, TopologyDescription, DEFAULT_LANE_OFFSET};

mod topology;

/// The static road graph: every road, the lanes across it, and how the roads connect.
///
/// A network is built once from a [TopologyDescription] and never changes afterwards,
/// so it can be shared freely between readers.
#[derive(Clone, Debug)]
pub struct RoadNetwork {
    /// The roads in the network.
    roads: RoadSet,
    /// The lanes across all of the roads.
    lanes: LaneSet,
    /// The road ID of each road in the description, by description index.
    order: Vec<RoadId>,
}

impl RoadNetwork {
    /// Builds a road network, generating lanes for every road.
    ///
    /// Fails with [Error::InvalidTopology](crate::Error::InvalidTopology) if a road
    /// lists a neighbour that does not exist, or adjacency is not symmetric.
    pub fn build(desc: &TopologyDescription) -> Result<Self> {
        desc.validate()?;

        let mut roads = RoadSet::with_key();
        let order = desc
            .roads
            .iter()
            .map(|r| {
                roads.insert_with_key(|id| Road::new(id, r.kind, r.position, r.yaw, r.speed_limit))
            })
            .collect::<Vec<_>>();
        for (road_id, r) in order.iter().zip(&desc.roads) {
            for neighbour in &r.neighbours {
                roads[*road_id].push_neighbour(order[*neighbour]);
            }
        }

        let mut lanes = SlotMap::with_key();
        for road_id in &order {
            let road = &roads[*road_id];
            let neighbours = road.neighbours();
            let count = neighbours.len();
            let pairs = if count == 1 {
                vec![(0, 0)]
            } else {
                iproduct!(0..count, 0..count)
                    .filter(|(from, to)| from != to)
                    .collect()
            };

            let lane_ids = pairs
                .into_iter()
                .map(|(from, to)| {
                    let (waypoints, length) = lane_waypoints(&LaneEnds {
                        kind: road.kind(),
                        centre: road.position(),
                        forward: road.forward(),
                        from: roads[neighbours[from]].position(),
                        to: roads[neighbours[to]].position(),
                        u_turn: from == to,
                        lane_offset: desc.lane_offset,
                    });
                    lanes.insert_with_key(|id| Lane::new(id, *road_id, from, to, waypoints, length))
                })
                .collect::<Vec<_>>();

            for lane_id in lane_ids {
                roads[*road_id].push_lane(lane_id);
            }
        }

        log::debug!(
            "Built road network with {} roads and {} lanes",
            roads.len(),
            lanes.len()
        );

        Ok(Self {
            roads,
            lanes,
            order,
        })
    }

    /// Parses a [TopologyDescription] from JSON and builds it.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        Self::build(&TopologyDescription::from_json(json)?)
    }

    /// The number of roads in the network.
    pub fn len(&self) -> usize {
        self.roads.len()
    }

    /// Whether the network has no roads.
    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }

    /// The ID of the road at the given index of the description it was built from.
    pub fn road_id(&self, index: usize) -> Option<RoadId> {
        self.order.get(index).copied()
    }

    /// Gets a reference to the road with the given ID.
    ///
    /// Panics if the ID belongs to another network.
    pub fn road(&self, road_id: RoadId) -> &Road {
        &self.roads[road_id]
    }

    /// Gets a reference to the road with the given ID, if it exists.
    pub fn get_road(&self, road_id: RoadId) -> Option<&Road> {
        self.roads.get(road_id)
    }

    /// Gets a reference to the lane with the given ID.
    ///
    /// Panics if the ID belongs to another network.
    pub fn lane(&self, lane_id: LaneId) -> &Lane {
        &self.lanes[lane_id]
    }

    /// Returns an iterator over all the roads, in description order.
    pub fn all_roads(&self) -> impl Iterator<Item = &Road> {
        self.order.iter().map(|id| &self.roads[*id])
    }

    /// Returns an iterator over the neighbours of a road, in declaration order.
    pub fn neighbors_of(&self, road_id: RoadId) -> impl Iterator<Item = &Road> {
        self.roads[road_id]
            .neighbours()
            .iter()
            .map(|id| &self.roads[*id])
    }

    /// Whether the two roads are directly connected.
    pub fn are_neighbours(&self, a: RoadId, b: RoadId) -> bool {
        self.roads
            .get(a)
            .map_or(false, |road| road.neighbour_index(b).is_some())
    }

    /// Returns an iterator over the lanes across a road.
    pub fn lanes_of(&self, road_id: RoadId) -> impl Iterator<Item = &Lane> {
        self.roads[road_id]
            .lanes()
            .iter()
            .map(|id| &self.lanes[*id])
    }

    /// The first lane across `road_id` that leads towards `neighbour`.
    pub fn lane_towards(&self, road_id: RoadId, neighbour: RoadId) -> Option<&Lane> {
        let to = self.roads.get(road_id)?.neighbour_index(neighbour)?;
        self.lanes_of(road_id).find(|lane| lane.to_road_idx() == to)
    }

    /// The first lane across `road_id` that is entered from `neighbour`.
    pub fn lane_entering(&self, road_id: RoadId, neighbour: RoadId) -> Option<&Lane> {
        let from = self.roads.get(road_id)?.neighbour_index(neighbour)?;
        self.lanes_of(road_id).find(|lane| lane.from_road_idx() == from)
    }

    /// The lane across `road_id` that is entered from `from` and leads towards `to`.
    pub fn lane_between(&self, road_id: RoadId, from: RoadId, to: RoadId) -> Option<&Lane> {
        let road = self.roads.get(road_id)?;
        let (from, to) = (road.neighbour_index(from)?, road.neighbour_index(to)?);
        self.lanes_of(road_id)
            .find(|lane| lane.from_road_idx() == from && lane.to_road_idx() == to)
    }

    /// The road a lane comes from.
    pub fn lane_source(&self, lane_id: LaneId) -> RoadId {
        let lane = &self.lanes[lane_id];
        self.roads[lane.road()].neighbours()[lane.from_road_idx()]
    }

    /// The road a lane leads to.
    pub fn lane_target(&self, lane_id: LaneId) -> RoadId {
        let lane = &self.lanes[lane_id];
        self.roads[lane.road()].neighbours()[lane.to_road_idx()]
    }

    /// Every road that can be reached from `road_id`, including itself, in breadth-first order.
    pub fn reachable_from(&self, road_id: RoadId) -> Vec<RoadId> {
        if !self.roads.contains_key(road_id) {
            return vec![];
        }
        pathfinding::directed::bfs::bfs_reach(road_id, |id| {
            self.roads[*id].neighbours().iter().copied()
        })
        .collect()
    }

    /// Whether any route connects the two roads.
    pub fn is_reachable(&self, from: RoadId, to: RoadId) -> bool {
        self.reachable_from(from).contains(&to)
    }
}
