use self::dynamics::steer_towards;
use crate::math::{try_normalize, OrientedBox, Point2d, Ray2d, Vector2d};
use crate::road::Lane;
use crate::{LaneId, LaneSelector, RoadId, RoadNetwork, VehicleId};
use cgmath::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

mod dynamics;

/// The most lanes a vehicle may pass through in a single step.
const MAX_LANE_HOPS: usize = 8;

/// A simulated vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID
    pub(crate) id: VehicleId,
    /// Half the vehicle's width in m.
    half_wid: f64,
    /// Half the vehicle's length in m.
    half_len: f64,
    /// Distance from vehicle's centre to centre of the rear axle.
    wheel_base: f64,
    /// The maximum speed given by the vehicle's attributes, in m/s.
    base_speed: f64,
    /// The speed the vehicle travels at when unobstructed, in m/s.
    max_speed: f64,
    /// The maximum acceleration in m/s^2.
    max_acc: f64,
    /// The maximum deceleration, a negative number in m/s^2.
    max_dec: f64,
    /// The length of the forward sensor ray in m.
    sensor_range: f64,
    /// The speed the vehicle is easing towards, in m/s.
    target_speed: f64,
    /// The current speed in m/s.
    actual_speed: f64,
    /// Set during collision avoidance when another vehicle has already
    /// resolved its encounter with this one. Cleared every step.
    ignore_collisions: bool,
    /// The road the vehicle is on.
    road: RoadId,
    /// The lane the vehicle is following.
    lane: LaneId,
    /// The index of the waypoint at the start of the current lane segment.
    waypoint: usize,
    /// The fraction of the current lane segment already travelled.
    progress: f64,
    /// Whether the vehicle is roaming, following a route or has arrived.
    state: VehicleState,
    /// Set once a vehicle in the terminal state reaches the end of its lane.
    arrived: bool,
    /// Set while the vehicle is waiting at the end of a lane with no lane to continue onto.
    halted: bool,
    /// The destination of a route the vehicle had to leave, until it is planned again.
    detour_goal: Option<RoadId>,
    /// The world space coordinates of the centre of the vehicle.
    world_pos: Point2d,
    /// A world space unit vector aligned with the vehicle's heading.
    world_dir: Vector2d,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VehicleAttributes {
    /// The vehicle width in m.
    pub width: f64,
    /// The vehicle length in m.
    pub length: f64,
    /// Distance from vehicle's centre to centre of the rear axle.
    pub wheel_base: f64,
    /// The speed the vehicle travels at when unobstructed, in m/s.
    pub max_speed: f64,
    /// The maximum acceleration of the vehicle, in m/s^2.
    pub max_acc: f64,
    /// The maximum deceleration of the vehicle, a negative number in m/s^2.
    pub max_dec: f64,
    /// The length of the forward sensor ray used to detect other vehicles, in m.
    pub sensor_range: f64,
}

/// What a vehicle does when it reaches the end of its lane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VehicleState {
    /// Pick a random onward road, avoiding turning back where possible.
    Roaming,
    /// Follow a planned route.
    Routing {
        /// The roads on the route, starting with the one the route was planned from.
        route: Vec<RoadId>,
        /// The index of the current road in `route`.
        index: usize,
    },
    /// The destination has been reached; the vehicle stops at the end of its lane.
    Terminal,
}

/// A vehicle's pose in world space, for rendering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleTransform {
    /// The centre of the vehicle.
    pub position: Point2d,
    /// A unit vector along the vehicle's heading.
    pub direction: Vector2d,
}

/// The outcome of trying to move a vehicle onto its next lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LaneAdvance {
    Advanced,
    Arrived,
    Blocked,
}

/// How the vehicle's state changes when it takes its next lane.
enum Transition {
    Keep,
    NextOnRoute,
    Arrive,
    /// Leave the route, remembering where it was going.
    Detour(Option<RoadId>),
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            width: 1.8,
            length: 4.5,
            wheel_base: 1.4,
            max_speed: 12.0,
            max_acc: 3.0,
            max_dec: -6.0,
            sensor_range: 12.0,
        }
    }
}

impl Vehicle {
    /// Creates a new vehicle at the start of the given lane.
    pub(crate) fn new(
        id: VehicleId,
        attributes: &VehicleAttributes,
        lane: &Lane,
        network: &RoadNetwork,
    ) -> Self {
        let mut vehicle = Self {
            id,
            half_wid: 0.5 * attributes.width,
            half_len: 0.5 * attributes.length,
            wheel_base: attributes.wheel_base,
            base_speed: attributes.max_speed.max(0.0),
            max_speed: attributes.max_speed.max(0.0),
            max_acc: attributes.max_acc.abs(),
            max_dec: -attributes.max_dec.abs(),
            sensor_range: attributes.sensor_range.max(0.0),
            target_speed: 0.0,
            actual_speed: 0.0,
            ignore_collisions: false,
            road: lane.road(),
            lane: lane.id(),
            waypoint: 0,
            progress: 0.0,
            state: VehicleState::Roaming,
            arrived: false,
            halted: false,
            detour_goal: None,
            world_pos: Point2d::new(0.0, 0.0),
            world_dir: Vector2d::new(0.0, 0.0),
        };
        vehicle.target_speed = vehicle.max_speed;
        vehicle.update_coords(network);
        vehicle
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's width in m.
    pub fn width(&self) -> f64 {
        2.0 * self.half_wid
    }

    /// The vehicle's length in m.
    pub fn length(&self) -> f64 {
        2.0 * self.half_len
    }

    /// Half the vehicle's length in m.
    pub fn half_length(&self) -> f64 {
        self.half_len
    }

    /// The speed the vehicle travels at when unobstructed, in m/s.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// The speed the vehicle is easing towards, in m/s.
    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    /// The vehicle's current speed in m/s.
    pub fn actual_speed(&self) -> f64 {
        self.actual_speed
    }

    /// The length of the vehicle's forward sensor ray in m.
    pub fn sensor_range(&self) -> f64 {
        self.sensor_range
    }

    /// Whether another vehicle resolved its encounter with this one during the last step.
    pub fn ignores_collisions(&self) -> bool {
        self.ignore_collisions
    }

    /// Whether the vehicle is stopped.
    pub fn has_stopped(&self) -> bool {
        self.actual_speed < 0.1
    }

    /// The road the vehicle is on.
    pub fn road_id(&self) -> RoadId {
        self.road
    }

    /// The lane the vehicle is following.
    pub fn lane_id(&self) -> LaneId {
        self.lane
    }

    /// The index of the waypoint at the start of the lane segment the vehicle is on.
    pub fn waypoint_index(&self) -> usize {
        self.waypoint
    }

    /// The fraction of the current lane segment already travelled.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Whether the vehicle is roaming, following a route or has arrived.
    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    /// The vehicle's planned route, or an empty slice if it has none.
    pub fn route(&self) -> &[RoadId] {
        match &self.state {
            VehicleState::Routing { route, .. } => route,
            _ => &[],
        }
    }

    /// Whether the vehicle has reached its destination and come to the end of its lane.
    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    /// Whether the vehicle is waiting at the end of its lane because no lane continues from it.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The coordinates in world space of the centre of the vehicle.
    pub fn position(&self) -> Point2d {
        self.world_pos
    }

    /// A unit vector in world space aligned with the vehicle's heading.
    pub fn direction(&self) -> Vector2d {
        self.world_dir
    }

    /// The vehicle's pose in world space.
    pub fn transform(&self) -> VehicleTransform {
        VehicleTransform {
            position: self.world_pos,
            direction: self.world_dir,
        }
    }

    /// The forward sensor ray, cast from the vehicle's centre along its heading.
    pub fn sensor_ray(&self) -> Ray2d {
        Ray2d::new(self.world_pos, self.world_dir, self.sensor_range)
    }

    /// The vehicle's bounding box in world space.
    pub fn bounds(&self) -> OrientedBox {
        OrientedBox {
            centre: self.world_pos,
            axis: self.world_dir,
            half_length: self.half_len,
            half_width: self.half_wid,
        }
    }

    /// The road the vehicle's current lane leads to.
    pub(crate) fn next_road(&self, network: &RoadNetwork) -> RoadId {
        network.lane_target(self.lane)
    }

    /// Scales the speed the vehicle travels at when unobstructed
    /// relative to the one it was created with.
    pub(crate) fn set_speed_factor(&mut self, factor: f64) {
        self.max_speed = (self.base_speed * factor).max(0.0);
        self.target_speed = self.target_speed.min(self.max_speed);
    }

    /// Replaces the vehicle's state.
    pub(crate) fn set_state(&mut self, state: VehicleState) {
        self.arrived = false;
        self.detour_goal = None;
        self.state = state;
    }

    /// Takes the destination of a route the vehicle has left since it was last called.
    pub(crate) fn take_detour_goal(&mut self) -> Option<RoadId> {
        self.detour_goal.take()
    }

    /// Resets the per-step collision avoidance annotations.
    pub(crate) fn reset(&mut self) {
        self.ignore_collisions = false;
        self.target_speed = self.max_speed;
    }

    /// Records the outcome of collision avoidance for this step.
    pub(crate) fn apply_avoidance(&mut self, target_speed: f64, ignore_collisions: bool) {
        self.target_speed = target_speed.clamp(0.0, self.max_speed);
        self.ignore_collisions = ignore_collisions;
    }

    /// Eases the vehicle's speed towards its target and moves it along its lanes.
    ///
    /// A vehicle passes through at most [MAX_LANE_HOPS] lane ends in one call.
    /// Any distance left over after that is dropped and logged at trace level.
    ///
    /// # Parameters
    /// * `dt` - The time step in seconds
    /// * `network` - The road network
    /// * `selector` - Chooses lanes while roaming
    /// * `rng` - Chooses onward roads while roaming
    pub(crate) fn integrate(
        &mut self,
        dt: f64,
        network: &RoadNetwork,
        selector: &LaneSelector,
        rng: &mut impl Rng,
    ) {
        if self.has_arrived() {
            self.actual_speed = 0.0;
            return;
        }

        let delta = (self.target_speed - self.actual_speed)
            .clamp(self.max_dec * dt, self.max_acc * dt);
        self.actual_speed = (self.actual_speed + delta).max(0.0);

        let mut dist = self.actual_speed * dt;
        let mut hops = 0;
        while dist > 0.0 {
            let waypoints = network.lane(self.lane).waypoints();
            if self.at_lane_end_of(waypoints.len()) {
                if hops == MAX_LANE_HOPS {
                    log::trace!(
                        "Vehicle {:?} passed {} lane ends in one step, dropping {} m",
                        self.id,
                        MAX_LANE_HOPS,
                        dist
                    );
                    break;
                }
                hops += 1;
                match self.advance_lane(network, selector, rng) {
                    LaneAdvance::Advanced => continue,
                    LaneAdvance::Arrived => {
                        self.arrived = true;
                        self.actual_speed = 0.0;
                        break;
                    }
                    LaneAdvance::Blocked => {
                        self.actual_speed = 0.0;
                        break;
                    }
                }
            }

            let (a, b) = (waypoints[self.waypoint], waypoints[self.waypoint + 1]);
            let segment = a.distance(b);
            let remaining = segment * (1.0 - self.progress);
            if dist < remaining {
                self.progress += dist / segment;
                dist = 0.0;
            } else {
                dist -= remaining;
                self.waypoint += 1;
                self.progress = 0.0;
            }
        }

        self.update_coords(network);
    }

    /// Whether the vehicle is at the last of `count` waypoints.
    fn at_lane_end_of(&self, count: usize) -> bool {
        self.waypoint + 1 >= count
    }

    /// Moves the vehicle onto the next lane once it has reached the end of its current one.
    fn advance_lane(
        &mut self,
        network: &RoadNetwork,
        selector: &LaneSelector,
        rng: &mut impl Rng,
    ) -> LaneAdvance {
        let next = self.next_road(network);
        let (lane, transition) = match &self.state {
            VehicleState::Terminal => return LaneAdvance::Arrived,
            VehicleState::Roaming => (
                self.roaming_lane(next, network, selector, rng),
                Transition::Keep,
            ),
            VehicleState::Routing { route, index } => {
                let index = index + 1;
                let on_route = if route.get(index) != Some(&next) {
                    log::warn!("Vehicle {:?} left its route at {:?}", self.id, next);
                    None
                } else if index + 1 >= route.len() {
                    network
                        .lane_entering(next, self.road)
                        .map(|l| (l.id(), Transition::Arrive))
                } else {
                    let lane = network.lane_between(next, self.road, route[index + 1]);
                    if lane.is_none() {
                        log::debug!(
                            "Vehicle {:?} has no lane along its route across {:?}",
                            self.id,
                            next
                        );
                    }
                    lane.map(|l| (l.id(), Transition::NextOnRoute))
                };
                match on_route {
                    Some((lane, transition)) => (Some(lane), transition),
                    None => (
                        self.roaming_lane(next, network, selector, rng),
                        Transition::Detour(route.last().copied()),
                    ),
                }
            }
        };

        let Some(lane) = lane else {
            if self.halted {
                log::trace!("Vehicle {:?} is still halted before {:?}", self.id, next);
            } else {
                log::warn!(
                    "Vehicle {:?} has no lane onto {:?} from {:?}, halting",
                    self.id,
                    next,
                    self.road
                );
                self.halted = true;
            }
            return LaneAdvance::Blocked;
        };
        self.halted = false;

        match transition {
            Transition::Keep => {}
            Transition::NextOnRoute => {
                if let VehicleState::Routing { index, .. } = &mut self.state {
                    *index += 1;
                }
            }
            Transition::Arrive => {
                log::debug!("Vehicle {:?} reached its destination {:?}", self.id, next);
                self.state = VehicleState::Terminal;
            }
            Transition::Detour(goal) => {
                self.state = VehicleState::Roaming;
                self.detour_goal = goal;
            }
        }

        self.road = next;
        self.lane = lane;
        self.waypoint = 0;
        self.progress = 0.0;
        LaneAdvance::Advanced
    }

    /// Chooses a lane across `next` towards a random onward road,
    /// avoiding the road being left unless it is the only way on.
    fn roaming_lane(
        &self,
        next: RoadId,
        network: &RoadNetwork,
        selector: &LaneSelector,
        rng: &mut impl Rng,
    ) -> Option<LaneId> {
        let options = network
            .road(next)
            .neighbours()
            .iter()
            .copied()
            .filter(|id| *id != self.road)
            .collect::<SmallVec<[RoadId; 4]>>();
        let onward = options.choose(rng).copied().unwrap_or(self.road);

        let travel_dir = network.road(onward).position() - network.road(self.road).position();
        selector
            .select_from(network, next, Some(self.road), travel_dir)
            .or_else(|| network.lane_between(next, self.road, onward))
            .map(|lane| lane.id())
    }

    /// Updates the vehicle's world coordinates from its place along its lane.
    fn update_coords(&mut self, network: &RoadNetwork) {
        let waypoints = network.lane(self.lane).waypoints();
        let last = waypoints.len().saturating_sub(1);
        let idx = self.waypoint.min(last);

        // Position along the current segment, and the segment's direction
        let (pos, tangent) = match (waypoints.get(idx), waypoints.get(idx + 1)) {
            (Some(&a), Some(&b)) => (a + (b - a) * self.progress, b - a),
            (Some(&a), None) if idx > 0 => (a, a - waypoints[idx - 1]),
            (Some(&a), None) => (a, self.world_dir),
            _ => (self.world_pos, self.world_dir),
        };
        let tangent = try_normalize(tangent, 1e-9).unwrap_or(self.world_dir);

        if self.world_dir.magnitude2() < 1e-12 {
            self.world_pos = pos;
            self.world_dir = tangent;
            return;
        }

        self.world_dir = steer_towards(self.world_pos, self.world_dir, pos, self.wheel_base, tangent);
        self.world_pos = pos;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::TopologyDescription;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use slotmap::KeyData;

    fn chain() -> (RoadNetwork, [RoadId; 3]) {
        let network = RoadNetwork::build(&TopologyDescription::grid(3, 1, 20.0, 50.0)).unwrap();
        let ids = [0, 1, 2].map(|i| network.road_id(i).unwrap());
        (network, ids)
    }

    fn vehicle_on(network: &RoadNetwork, lane: &Lane) -> Vehicle {
        let id = VehicleId::from(KeyData::from_ffi(1));
        Vehicle::new(id, &VehicleAttributes::default(), lane, network)
    }

    #[test]
    fn speed_eases_towards_target() {
        let (network, [a, b, c]) = chain();
        let mut vehicle = vehicle_on(&network, network.lane_between(b, a, c).unwrap());
        let mut rng = StdRng::seed_from_u64(0);
        let selector = LaneSelector::new();

        vehicle.integrate(0.1, &network, &selector, &mut rng);
        assert_approx_eq!(vehicle.actual_speed(), 0.3);

        vehicle.apply_avoidance(0.0, false);
        vehicle.integrate(0.1, &network, &selector, &mut rng);
        assert_approx_eq!(vehicle.actual_speed(), 0.0);
    }

    #[test]
    fn vehicle_moves_along_lane() {
        let (network, [a, b, c]) = chain();
        let lane = network.lane_between(b, a, c).unwrap();
        let mut vehicle = vehicle_on(&network, lane);
        let mut rng = StdRng::seed_from_u64(0);
        let selector = LaneSelector::new();
        assert_eq!(vehicle.position(), lane.waypoints()[0]);

        let start = vehicle.position();
        for _ in 0..10 {
            vehicle.integrate(0.1, &network, &selector, &mut rng);
        }
        // v = 0.3, 0.6, ... 3.0, so the distance is 0.1 * 0.3 * (1 + 2 + ... + 10)
        assert_approx_eq!(vehicle.position().distance(start), 1.65, 1e-6);
        assert_eq!(vehicle.road_id(), b);
        assert_approx_eq!(vehicle.direction().x, 1.0);
    }

    #[test]
    fn roaming_vehicle_turns_at_dead_end() {
        let (network, [a, b, c]) = chain();
        let mut vehicle = vehicle_on(&network, network.lane_between(b, a, c).unwrap());
        let mut rng = StdRng::seed_from_u64(7);
        let selector = LaneSelector::new();

        let mut visited = vec![vehicle.road_id()];
        for _ in 0..600 {
            vehicle.integrate(0.1, &network, &selector, &mut rng);
            if visited.last() != Some(&vehicle.road_id()) {
                visited.push(vehicle.road_id());
            }
        }
        assert!(visited.len() >= 4);
        assert_eq!(&visited[..4], &[b, c, b, a]);
    }

    #[test]
    fn routed_vehicle_stops_at_destination() {
        let (network, [a, b, c]) = chain();
        let mut vehicle = vehicle_on(&network, network.lane_towards(a, b).unwrap());
        vehicle.set_state(VehicleState::Routing {
            route: vec![a, b, c],
            index: 0,
        });
        let mut rng = StdRng::seed_from_u64(0);
        let selector = LaneSelector::new();

        for _ in 0..600 {
            vehicle.integrate(0.1, &network, &selector, &mut rng);
        }
        assert_eq!(vehicle.road_id(), c);
        assert_eq!(vehicle.state(), &VehicleState::Terminal);
        assert!(vehicle.has_arrived());
        assert_eq!(vehicle.actual_speed(), 0.0);
        let end = *network.lane(vehicle.lane_id()).waypoints().last().unwrap();
        assert!(vehicle.position().distance(end) < 1e-9);
    }

    #[test]
    fn vehicle_without_lane_for_its_route_roams_on() {
        let (network, [a, b, c]) = chain();
        let mut vehicle = vehicle_on(&network, network.lane_towards(a, b).unwrap());
        // Turning back at the middle road needs a U-turn it does not have
        vehicle.set_state(VehicleState::Routing {
            route: vec![a, b, a],
            index: 0,
        });
        let mut rng = StdRng::seed_from_u64(0);
        let selector = LaneSelector::new();

        for _ in 0..600 {
            vehicle.integrate(0.1, &network, &selector, &mut rng);
            if vehicle.road_id() == b {
                break;
            }
        }
        assert_eq!(vehicle.road_id(), b);
        assert_eq!(vehicle.state(), &VehicleState::Roaming);
        assert_eq!(network.lane_target(vehicle.lane_id()), c);
        assert!(!vehicle.is_halted());
        assert_eq!(vehicle.take_detour_goal(), Some(a));
        assert_eq!(vehicle.take_detour_goal(), None);
    }

    #[test]
    fn vehicle_leaving_its_route_keeps_destination() {
        let (network, [a, b, c]) = chain();
        let mut vehicle = vehicle_on(&network, network.lane_towards(a, b).unwrap());
        vehicle.set_state(VehicleState::Routing {
            route: vec![a, c],
            index: 0,
        });
        let mut rng = StdRng::seed_from_u64(0);
        let selector = LaneSelector::new();

        for _ in 0..600 {
            vehicle.integrate(0.1, &network, &selector, &mut rng);
            if vehicle.road_id() == b {
                break;
            }
        }
        assert_eq!(vehicle.state(), &VehicleState::Roaming);
        assert_eq!(vehicle.take_detour_goal(), Some(c));

        // A new state drops any pending detour
        vehicle.detour_goal = Some(c);
        vehicle.set_state(VehicleState::Roaming);
        assert_eq!(vehicle.take_detour_goal(), None);
    }

    #[test]
    fn vehicle_with_no_onward_lane_halts_once() {
        let (network, [a, b, c]) = chain();
        let mut vehicle = vehicle_on(&network, network.lane_between(b, a, c).unwrap());
        // Claiming to come from the road the lane leads to leaves no lane to continue on
        vehicle.road = c;
        let mut rng = StdRng::seed_from_u64(0);
        let selector = LaneSelector::new();

        for _ in 0..600 {
            vehicle.integrate(0.1, &network, &selector, &mut rng);
        }
        assert!(vehicle.is_halted());
        assert_eq!(vehicle.actual_speed(), 0.0);
        assert_eq!(vehicle.lane_id(), network.lane_between(b, a, c).unwrap().id());
        let end = *network.lane(vehicle.lane_id()).waypoints().last().unwrap();
        assert!(vehicle.position().distance(end) < 1e-9);
        assert!(!vehicle.has_arrived());
    }

    #[test]
    fn long_step_stops_at_lane_end_after_hop_limit() {
        let (network, [a, b, c]) = chain();
        let mut vehicle = vehicle_on(&network, network.lane_between(b, a, c).unwrap());
        let mut rng = StdRng::seed_from_u64(3);
        let selector = LaneSelector::new();

        // Far more distance than eight lanes cover
        vehicle.integrate(1000.0, &network, &selector, &mut rng);
        let count = network.lane(vehicle.lane_id()).waypoints().len();
        assert!(vehicle.at_lane_end_of(count));
        assert_eq!(vehicle.progress(), 0.0);
        assert_eq!(network.lane(vehicle.lane_id()).road(), vehicle.road_id());
        assert!(!vehicle.is_halted());
    }
}
