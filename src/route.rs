//! Route planning over the road graph.
//!
//! The default [RouteStrategy::Greedy] search is a weighted best-first search.
//! Each search node's weight accumulates the road's type weight, a penalty for
//! slow roads, *and* the straight-line distance from the road to the goal, on
//! top of its parent's weight. Because the distance term is summed along the
//! path rather than used once as a heuristic, the search favours routes that
//! approach the goal quickly and is not guaranteed to find the cheapest route.
//! That behaviour is intended; use [RouteStrategy::Shortest] where a
//! cost-optimal route is required.

use crate::road::{Road, RoadKind};
use crate::{RoadId, RoadNetwork};
use cgmath::MetricSpace;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

/// The speed limit above which a road carries no speed penalty.
pub const SPEED_PENALTY_BASE: f64 = 100.0;

/// The fixed-point scale used to turn route costs into integers for Dijkstra's algorithm.
const COST_SCALE: f64 = 100.0;

/// The weights that make some roads less desirable to route through.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteWeights {
    /// The weight of each kind of road, indexed by [RoadKind::index].
    pub type_weights: [f64; RoadKind::ALL.len()],
    /// A road's speed penalty is this value minus its speed limit.
    pub speed_penalty_base: f64,
}

/// Which search to use when planning a route.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RouteStrategy {
    /// Weighted best-first search with a cumulative distance-to-goal term.
    #[default]
    Greedy,
    /// Dijkstra's algorithm over the same road weights plus the length of each hop.
    Shortest,
}

/// Plans routes across a road network.
pub struct RoutePlanner<'a> {
    network: &'a RoadNetwork,
    weights: &'a RouteWeights,
}

/// A road under consideration by the greedy search.
#[derive(Clone, Copy, Debug)]
struct SearchNode {
    road: RoadId,
    total_weight: f64,
    /// Index of the node this one was reached from.
    parent: Option<usize>,
}

impl Default for RouteWeights {
    fn default() -> Self {
        Self {
            type_weights: RoadKind::ALL.map(|kind| match kind {
                RoadKind::Terminal | RoadKind::Straight => 1.0,
                RoadKind::Bend => 2.0,
                RoadKind::Junction | RoadKind::Crossroad => 3.0,
                RoadKind::Roundabout => 4.0,
            }),
            speed_penalty_base: SPEED_PENALTY_BASE,
        }
    }
}

impl RouteWeights {
    /// The constant weight of passing through a kind of road.
    pub fn type_weight(&self, kind: RoadKind) -> f64 {
        self.type_weights[kind.index()]
    }

    /// The penalty for passing through a road with the given speed limit.
    pub fn speed_penalty(&self, speed_limit: f64) -> f64 {
        self.speed_penalty_base - speed_limit
    }

    /// The weight of a road independent of where the route is going.
    pub fn road_weight(&self, road: &Road) -> f64 {
        self.type_weight(road.kind()) + self.speed_penalty(road.speed_limit())
    }
}

impl<'a> RoutePlanner<'a> {
    /// Creates a route planner.
    pub fn new(network: &'a RoadNetwork, weights: &'a RouteWeights) -> Self {
        Self { network, weights }
    }

    /// Plans a route using the given strategy.
    pub fn plan(&self, strategy: RouteStrategy, start: RoadId, goal: RoadId) -> Vec<RoadId> {
        match strategy {
            RouteStrategy::Greedy => self.find_route(start, goal),
            RouteStrategy::Shortest => self.find_shortest_route(start, goal),
        }
    }

    /// Plans a route for a vehicle crossing from `prev` onto `start`.
    ///
    /// Returns `[prev, start, .., goal]`, or an empty vector if `goal` cannot be reached.
    /// The route from `strategy` is used when every road on it has a lane joining the
    /// roads either side. Otherwise, such as when it turns straight back onto `prev`
    /// across a road with no U-turn lane, the route comes from [Self::find_drivable_route].
    pub fn plan_onward(
        &self,
        strategy: RouteStrategy,
        prev: RoadId,
        start: RoadId,
        goal: RoadId,
    ) -> Vec<RoadId> {
        let path = self.plan(strategy, start, goal);
        if path.is_empty() {
            return vec![];
        }
        let route = std::iter::once(prev).chain(path).collect::<Vec<_>>();
        if self.is_drivable(&route) {
            return route;
        }
        log::trace!("Route {:?} needs a missing lane, searching lanes instead", route);
        self.find_drivable_route(prev, start, goal)
    }

    /// Whether every road on a route has a lane from the road before it to the road after it.
    pub fn is_drivable(&self, route: &[RoadId]) -> bool {
        route
            .windows(3)
            .all(|w| self.network.lane_between(w[1], w[0], w[2]).is_some())
    }

    /// Finds the cheapest route for a vehicle crossing from `prev` onto `start`
    /// that only turns where a road has a lane for the turn.
    ///
    /// Costs are those of [Self::find_shortest_route]. Returns `[prev, start, .., goal]`,
    /// or an empty vector if no such route exists.
    pub fn find_drivable_route(&self, prev: RoadId, start: RoadId, goal: RoadId) -> Vec<RoadId> {
        if self.network.get_road(start).is_none() || self.network.get_road(goal).is_none() {
            return vec![];
        }
        // Each state is the road being crossed and the road it was entered from
        let result = pathfinding::directed::dijkstra::dijkstra(
            &(prev, start),
            |&(from, id)| {
                let position = self.network.road(id).position();
                self.network
                    .neighbors_of(id)
                    .filter(move |road| self.network.lane_between(id, from, road.id()).is_some())
                    .map(move |road| {
                        let cost = self.weights.road_weight(road).max(0.0)
                            + position.distance(road.position());
                        ((id, road.id()), (COST_SCALE * cost) as u64)
                    })
            },
            |&(_, id)| id == goal,
        );
        match result {
            Some((states, _)) => std::iter::once(prev)
                .chain(states.into_iter().map(|(_, id)| id))
                .collect(),
            None => {
                log::debug!("No drivable route from {:?} to {:?}", start, goal);
                vec![]
            }
        }
    }

    /// Finds a route from `start` to `goal` with the weighted best-first search.
    ///
    /// Returns the roads along the route, from `start` to `goal` inclusive,
    /// or an empty vector if `goal` cannot be reached.
    pub fn find_route(&self, start: RoadId, goal: RoadId) -> Vec<RoadId> {
        let (Some(start_road), Some(goal_road)) =
            (self.network.get_road(start), self.network.get_road(goal))
        else {
            return vec![];
        };
        let goal_pos = goal_road.position();
        let node_weight = |road: &Road, parent_weight: f64| {
            self.weights.road_weight(road) + road.position().distance(goal_pos) + parent_weight
        };

        let mut nodes = vec![SearchNode {
            road: start,
            total_weight: node_weight(start_road, 0.0),
            parent: None,
        }];
        let mut open = vec![0];
        let mut open_nodes = SecondaryMap::new();
        let mut closed = SecondaryMap::new();
        open_nodes.insert(start, 0);

        while !open.is_empty() {
            // Lowest weight first, earliest inserted on a tie
            let mut best = 0;
            for (pos, idx) in open.iter().enumerate().skip(1) {
                if nodes[*idx].total_weight < nodes[open[best]].total_weight {
                    best = pos;
                }
            }
            let current = open.remove(best);
            let SearchNode {
                road, total_weight, ..
            } = nodes[current];
            open_nodes.remove(road);
            closed.insert(road, ());
            log::trace!("Expanding {:?} with weight {}", road, total_weight);

            if road == goal {
                return Self::backtrack(&nodes, current);
            }

            for neighbour in self.network.neighbors_of(road) {
                let id = neighbour.id();
                if closed.contains_key(id) {
                    continue;
                }
                let weight = node_weight(neighbour, total_weight);
                match open_nodes.get(id).copied() {
                    Some(idx) if nodes[idx].total_weight <= weight => {}
                    Some(idx) => {
                        let node: &mut SearchNode = &mut nodes[idx];
                        node.total_weight = weight;
                        node.parent = Some(current);
                    }
                    None => {
                        nodes.push(SearchNode {
                            road: id,
                            total_weight: weight,
                            parent: Some(current),
                        });
                        open.push(nodes.len() - 1);
                        open_nodes.insert(id, nodes.len() - 1);
                    }
                }
            }
        }

        log::debug!("No route from {:?} to {:?}", start, goal);
        vec![]
    }

    /// Finds the cheapest route from `start` to `goal`, where entering a road costs
    /// its type weight, its speed penalty and the distance from the previous road.
    ///
    /// Returns an empty vector if `goal` cannot be reached.
    pub fn find_shortest_route(&self, start: RoadId, goal: RoadId) -> Vec<RoadId> {
        if self.network.get_road(start).is_none() || self.network.get_road(goal).is_none() {
            return vec![];
        }
        let result = pathfinding::directed::dijkstra::dijkstra(
            &start,
            |id| {
                let from = self.network.road(*id).position();
                self.network.neighbors_of(*id).map(move |road| {
                    let cost = self.weights.road_weight(road).max(0.0)
                        + from.distance(road.position());
                    (road.id(), (COST_SCALE * cost) as u64)
                })
            },
            |id| *id == goal,
        );
        match result {
            Some((route, _)) => route,
            None => {
                log::debug!("No route from {:?} to {:?}", start, goal);
                vec![]
            }
        }
    }

    /// Follows parent links back to the start, returning the route in travel order.
    fn backtrack(nodes: &[SearchNode], last: usize) -> Vec<RoadId> {
        let mut route = std::iter::successors(Some(last), |idx| nodes[*idx].parent)
            .map(|idx| nodes[idx].road)
            .collect::<Vec<_>>();
        route.reverse();
        route
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Point2d;
    use crate::TopologyDescription;

    fn build(desc: &TopologyDescription) -> RoadNetwork {
        RoadNetwork::build(desc).unwrap()
    }

    #[test]
    fn chain_route() {
        let network = build(&TopologyDescription::grid(3, 1, 20.0, 60.0));
        let weights = RouteWeights::default();
        let planner = RoutePlanner::new(&network, &weights);
        let [a, b, c] = [0, 1, 2].map(|i| network.road_id(i).unwrap());

        assert_eq!(planner.find_route(a, c), vec![a, b, c]);
        assert_eq!(planner.find_route(c, a), vec![c, b, a]);
        assert_eq!(planner.find_shortest_route(a, c), vec![a, b, c]);
    }

    #[test]
    fn route_to_self() {
        let network = build(&TopologyDescription::grid(3, 1, 20.0, 60.0));
        let weights = RouteWeights::default();
        let planner = RoutePlanner::new(&network, &weights);
        let a = network.road_id(0).unwrap();
        assert_eq!(planner.find_route(a, a), vec![a]);
        assert_eq!(planner.find_shortest_route(a, a), vec![a]);
    }

    #[test]
    fn disconnected_roads_have_no_route() {
        let mut desc = TopologyDescription::grid(3, 1, 20.0, 60.0);
        let island = desc.add_road(RoadKind::Straight, Point2d::new(0.0, 100.0), 0.0, 60.0);
        let network = build(&desc);
        let weights = RouteWeights::default();
        let planner = RoutePlanner::new(&network, &weights);
        let a = network.road_id(0).unwrap();
        let island = network.road_id(island).unwrap();

        assert!(planner.find_route(a, island).is_empty());
        assert!(planner.find_route(island, a).is_empty());
        assert!(planner.find_shortest_route(a, island).is_empty());
    }

    #[test]
    fn slow_roads_are_avoided() {
        // A square loop: 0 - 1 - 2 and 0 - 3 - 2, where road 1 is slow
        let mut desc = TopologyDescription::new();
        let corners = [(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)];
        for (x, y) in corners {
            desc.add_road(RoadKind::Bend, Point2d::new(x, y), 0.0, 60.0);
        }
        for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 0)] {
            desc.connect(a, b);
        }
        desc.roads[1].speed_limit = 10.0;
        let network = build(&desc);
        let weights = RouteWeights::default();
        let planner = RoutePlanner::new(&network, &weights);
        let ids = [0, 1, 2, 3].map(|i| network.road_id(i).unwrap());

        assert_eq!(planner.find_route(ids[0], ids[2]), vec![ids[0], ids[3], ids[2]]);
        assert_eq!(
            planner.find_shortest_route(ids[0], ids[2]),
            vec![ids[0], ids[3], ids[2]]
        );
    }

    #[test]
    fn consecutive_roads_are_neighbours() {
        let network = build(&TopologyDescription::grid(5, 4, 20.0, 50.0));
        let weights = RouteWeights::default();
        let planner = RoutePlanner::new(&network, &weights);
        let roads = network.all_roads().map(|r| r.id()).collect::<Vec<_>>();

        for &start in &roads {
            for &goal in &roads {
                for strategy in [RouteStrategy::Greedy, RouteStrategy::Shortest] {
                    let route = planner.plan(strategy, start, goal);
                    assert_eq!(route.first(), Some(&start));
                    assert_eq!(route.last(), Some(&goal));
                    for pair in route.windows(2) {
                        assert!(network.are_neighbours(pair[0], pair[1]));
                        assert!(network.are_neighbours(pair[1], pair[0]));
                    }
                }
            }
        }
    }

    #[test]
    fn onward_route_avoids_missing_u_turn() {
        let network = build(&TopologyDescription::grid(5, 1, 20.0, 50.0));
        let weights = RouteWeights::default();
        let planner = RoutePlanner::new(&network, &weights);
        let ids = [0, 1, 2, 3, 4].map(|i| network.road_id(i).unwrap());

        // Heading away from the goal, the vehicle must turn around at the dead end
        let expected = vec![ids[2], ids[3], ids[4], ids[3], ids[2], ids[1], ids[0]];
        for strategy in [RouteStrategy::Greedy, RouteStrategy::Shortest] {
            let route = planner.plan_onward(strategy, ids[2], ids[3], ids[0]);
            assert_eq!(route, expected);
            assert!(planner.is_drivable(&route));
        }

        // Heading towards the goal, the planned route is kept
        assert_eq!(
            planner.plan_onward(RouteStrategy::Greedy, ids[2], ids[1], ids[0]),
            vec![ids[2], ids[1], ids[0]]
        );
        assert!(!planner.is_drivable(&[ids[2], ids[3], ids[2]]));
    }

    #[test]
    fn onward_route_leaves_bend_forwards() {
        let network = build(&TopologyDescription::grid(3, 2, 20.0, 50.0));
        let weights = RouteWeights::default();
        let planner = RoutePlanner::new(&network, &weights);
        let ids = [0, 1, 2, 5].map(|i| network.road_id(i).unwrap());

        let route = planner.plan_onward(RouteStrategy::Greedy, ids[1], ids[2], ids[0]);
        assert_eq!(&route[..3], &[ids[1], ids[2], ids[3]]);
        assert_eq!(route.last(), Some(&ids[0]));
        assert!(planner.is_drivable(&route));
        for pair in route.windows(2) {
            assert!(network.are_neighbours(pair[0], pair[1]));
        }
    }

    #[test]
    fn onward_route_to_unreachable_road_is_empty() {
        let mut desc = TopologyDescription::grid(3, 1, 20.0, 60.0);
        let island = desc.add_road(RoadKind::Straight, Point2d::new(0.0, 100.0), 0.0, 60.0);
        let network = build(&desc);
        let weights = RouteWeights::default();
        let planner = RoutePlanner::new(&network, &weights);
        let [a, b] = [0, 1].map(|i| network.road_id(i).unwrap());
        let island = network.road_id(island).unwrap();

        assert!(planner.plan_onward(RouteStrategy::Greedy, a, b, island).is_empty());
        assert!(planner.find_drivable_route(a, b, island).is_empty());
    }
}
