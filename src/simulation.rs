use crate::avoidance::{AvoidanceParams, CollisionAvoidance, Probe};
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::math::Point2d;
use crate::route::{RoutePlanner, RouteStrategy, RouteWeights};
use crate::vehicle::{Vehicle, VehicleAttributes, VehicleState, VehicleTransform};
use crate::{LaneSelector, RoadId, RoadNetwork, VehicleId, VehicleSet};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::Distribution;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::sync::Arc;

/// Speed factors drawn by [Simulation::randomise_max_speeds] are clamped to this range.
const SPEED_FACTOR_RANGE: (f64, f64) = (0.75, 1.25);

/// The settings a simulation is created with.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Seeds every random choice the simulation makes.
    pub seed: u64,
    /// Tuning for collision avoidance.
    pub avoidance: AvoidanceParams,
    /// Chooses lanes for roaming vehicles.
    pub selector: LaneSelector,
    /// Weights used when planning routes.
    pub weights: RouteWeights,
    /// The search used when planning routes.
    pub strategy: RouteStrategy,
}

/// A simulation of vehicles driving around a road network.
pub struct Simulation {
    /// The road network, shared with any renderer.
    network: Arc<RoadNetwork>,
    /// The settings the simulation was created with.
    config: SimulationConfig,
    /// The collision avoidance engine.
    avoidance: CollisionAvoidance,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The source of every random choice.
    rng: StdRng,
    /// The current frame of simulation.
    frame: usize,
    /// Debugging information from the previously simulated frame.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation {
    /// Creates a new simulation with no vehicles.
    pub fn new(network: impl Into<Arc<RoadNetwork>>, config: SimulationConfig) -> Self {
        Self {
            network: network.into(),
            avoidance: CollisionAvoidance::new(config.avoidance),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            vehicles: VehicleSet::with_key(),
            frame: 0,
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// Gets the road network.
    pub fn network(&self) -> &Arc<RoadNetwork> {
        &self.network
    }

    /// Gets the settings the simulation was created with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Adds a roaming vehicle on a random road that no other vehicle is on.
    ///
    /// Returns `None` if every road with lanes is occupied.
    pub fn spawn_vehicle(&mut self, attributes: &VehicleAttributes) -> Option<VehicleId> {
        let mut occupied = SecondaryMap::new();
        for vehicle in self.vehicles.values() {
            occupied.insert(vehicle.road_id(), ());
        }
        let free = self
            .network
            .all_roads()
            .filter(|road| !road.lanes().is_empty() && !occupied.contains_key(road.id()))
            .map(|road| road.id())
            .collect::<Vec<_>>();

        let Some(road) = free.choose(&mut self.rng).copied() else {
            log::debug!("No free road to spawn a vehicle on");
            return None;
        };
        self.spawn_vehicle_at(attributes, road)
    }

    /// Adds a roaming vehicle at the start of a random lane across `road`.
    ///
    /// Returns `None` if the road does not exist or has no lanes.
    pub fn spawn_vehicle_at(
        &mut self,
        attributes: &VehicleAttributes,
        road: RoadId,
    ) -> Option<VehicleId> {
        let lane = *self.network.get_road(road)?.lanes().choose(&mut self.rng)?;
        let network = &self.network;
        let id = self.vehicles.insert_with_key(|id| {
            Vehicle::new(id, attributes, network.lane(lane), network)
        });
        log::debug!("Spawned vehicle {:?} on {:?}", id, road);
        Some(id)
    }

    /// Removes a vehicle from the simulation.
    pub fn remove_vehicle(&mut self, vehicle_id: VehicleId) {
        self.vehicles.remove(vehicle_id);
    }

    /// Sends a vehicle towards `goal`, planning a route from the road its lane leads to.
    ///
    /// The route never asks the vehicle to turn where a road has no lane for the turn,
    /// so a vehicle heading away from `goal` carries on until it can turn around.
    /// Returns `false` and leaves the vehicle roaming if no route exists.
    pub fn set_vehicle_destination(&mut self, vehicle_id: VehicleId, goal: RoadId) -> bool {
        let Some(vehicle) = self.vehicles.get_mut(vehicle_id) else {
            return false;
        };
        let planner = RoutePlanner::new(&self.network, &self.config.weights);
        let route = planner.plan_onward(
            self.config.strategy,
            vehicle.road_id(),
            vehicle.next_road(&self.network),
            goal,
        );
        if route.is_empty() {
            log::debug!(
                "No route for vehicle {:?} to {:?}, roaming instead",
                vehicle_id,
                goal
            );
            vehicle.set_state(VehicleState::Roaming);
            return false;
        }

        log::debug!("Vehicle {:?} routed via {:?}", vehicle_id, route);
        vehicle.set_state(VehicleState::Routing { route, index: 0 });
        true
    }

    /// Drops a vehicle's destination so it goes back to roaming.
    pub fn clear_vehicle_destination(&mut self, vehicle_id: VehicleId) {
        if let Some(vehicle) = self.vehicles.get_mut(vehicle_id) {
            vehicle.set_state(VehicleState::Roaming);
        }
    }

    /// Randomly scales each vehicle's maximum speed by a factor sampled from a
    /// normal distribution with a mean of 1 (no adjustment) and standard deviation of `stddev`.
    pub fn randomise_max_speeds(&mut self, stddev: f64) {
        let distr = match rand_distr::Normal::new(1.0, stddev) {
            Ok(distr) => distr,
            Err(err) => {
                log::warn!("Cannot randomise speeds with deviation {}: {}", stddev, err);
                return;
            }
        };
        let (min, max) = SPEED_FACTOR_RANGE;
        for vehicle in self.vehicles.values_mut() {
            let factor = distr.sample(&mut self.rng).clamp(min, max);
            vehicle.set_speed_factor(factor);
        }
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Collision avoidance runs over every vehicle before any of them moves.
    /// Vehicles that had to leave their route are then routed to their destination again.
    /// A negative or non-finite `dt` is treated as zero.
    pub fn step(&mut self, dt: f64) {
        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            log::warn!("Invalid time step {}, treating as zero", dt);
            0.0
        };

        self.apply_avoidance();
        self.integrate(dt);
        self.replan_detours();
        self.frame += 1;

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
    }

    /// Gets the current simulation frame index.
    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Gets a reference to the vehicle with the given ID.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(vehicle_id)
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Returns the world transform of every vehicle, for rendering.
    pub fn transforms(&self) -> impl Iterator<Item = (VehicleId, VehicleTransform)> + '_ {
        self.vehicles
            .iter()
            .map(|(id, vehicle)| (id, vehicle.transform()))
    }

    /// The waypoints a vehicle will drive through on the rest of its route,
    /// starting from its current position. Empty if the vehicle has no route.
    pub fn route_waypoints(&self, vehicle_id: VehicleId) -> Vec<Point2d> {
        let Some(vehicle) = self.vehicles.get(vehicle_id) else {
            return vec![];
        };
        let VehicleState::Routing { route, index } = vehicle.state() else {
            return vec![];
        };

        let lane = self.network.lane(vehicle.lane_id());
        let mut points = vec![vehicle.position()];
        points.extend_from_slice(&lane.waypoints()[(vehicle.waypoint_index() + 1)..]);

        for (pos, window) in route.windows(2).enumerate().skip(*index) {
            let (prev, road) = (window[0], window[1]);
            let lane = match route.get(pos + 2) {
                Some(next) => self.network.lane_between(road, prev, *next),
                None => self.network.lane_entering(road, prev),
            };
            match lane {
                Some(lane) => points.extend_from_slice(lane.waypoints()),
                None => break,
            }
        }
        points
    }

    /// Gets the debugging information for the previously simulated frame as JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }

    /// Computes every vehicle's target speed from a snapshot of all of them.
    fn apply_avoidance(&mut self) {
        for vehicle in self.vehicles.values_mut() {
            vehicle.reset();
        }
        let probes = self.vehicles.values().map(Probe::of).collect::<Vec<_>>();
        let verdicts = self.avoidance.evaluate(&probes);
        for (vehicle, verdict) in self.vehicles.values_mut().zip(verdicts) {
            vehicle.apply_avoidance(verdict.target_speed, verdict.ignore_collisions);
        }
    }

    /// Moves every vehicle along its lanes.
    fn integrate(&mut self, dt: f64) {
        for vehicle in self.vehicles.values_mut() {
            vehicle.integrate(dt, &self.network, &self.config.selector, &mut self.rng);
        }
    }

    /// Plans new routes for vehicles that left their route during the last integration.
    fn replan_detours(&mut self) {
        let detours = self
            .vehicles
            .iter_mut()
            .filter_map(|(id, vehicle)| vehicle.take_detour_goal().map(|goal| (id, goal)))
            .collect::<Vec<_>>();
        for (vehicle_id, goal) in detours {
            log::debug!("Rerouting vehicle {:?} to {:?}", vehicle_id, goal);
            self.set_vehicle_destination(vehicle_id, goal);
        }
    }
}
