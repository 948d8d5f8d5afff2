//! Tests that involve a single vehicle driving along a chain of roads.

use road_agents::{
    cgmath::MetricSpace, RoadNetwork, Simulation, SimulationConfig, TopologyDescription,
    VehicleAttributes, VehicleState,
};

fn chain(len: usize) -> RoadNetwork {
    RoadNetwork::build(&TopologyDescription::grid(len, 1, 20.0, 50.0)).unwrap()
}

/// Test that a lone vehicle keeps moving and never exceeds its maximum speed.
#[test]
fn vehicle_drives_forward() {
    let network = chain(6);
    let start = network.road_id(2).unwrap();
    let mut sim = Simulation::new(network, SimulationConfig::default());
    let veh = sim
        .spawn_vehicle_at(&VehicleAttributes::default(), start)
        .unwrap();

    let mut pos = sim.get_vehicle(veh).unwrap().position();
    for _ in 0..100 {
        sim.step(0.1);
        let vehicle = sim.get_vehicle(veh).unwrap();
        assert!(vehicle.position().distance(pos) > 0.0);
        assert!(vehicle.actual_speed() <= vehicle.max_speed());
        pos = vehicle.position();
    }
    assert_eq!(sim.frame(), 100);
}

/// Test that a routed vehicle reaches its destination and stays there.
#[test]
fn vehicle_reaches_destination() {
    let network = chain(5);
    let start = network.road_id(1).unwrap();
    let goal = network.road_id(4).unwrap();
    let mut sim = Simulation::new(network, SimulationConfig::default());
    let veh = sim
        .spawn_vehicle_at(&VehicleAttributes::default(), start)
        .unwrap();
    assert!(sim.set_vehicle_destination(veh, goal));
    assert!(!sim.route_waypoints(veh).is_empty());

    for _ in 0..600 {
        sim.step(0.1);
    }
    let vehicle = sim.get_vehicle(veh).unwrap();
    assert!(vehicle.has_arrived());
    assert_eq!(vehicle.road_id(), goal);
    assert_eq!(vehicle.state(), &VehicleState::Terminal);
    assert!(vehicle.route().is_empty());

    let pos = vehicle.position();
    sim.step(0.1);
    assert_eq!(sim.get_vehicle(veh).unwrap().position(), pos);
}

/// Runs a lone routed vehicle from `start` to `goal` with the given seed and reports
/// whether it arrived, with its route at the end.
fn drive_to(
    network: &RoadNetwork,
    seed: u64,
    start: usize,
    goal: usize,
) -> (bool, Vec<road_agents::RoadId>) {
    let start = network.road_id(start).unwrap();
    let goal = network.road_id(goal).unwrap();
    let config = SimulationConfig {
        seed,
        ..Default::default()
    };
    let mut sim = Simulation::new(network.clone(), config);
    let veh = sim
        .spawn_vehicle_at(&VehicleAttributes::default(), start)
        .unwrap();
    assert!(sim.set_vehicle_destination(veh, goal));
    let route = sim.get_vehicle(veh).unwrap().route().to_vec();

    for _ in 0..2000 {
        sim.step(0.1);
        if sim.get_vehicle(veh).unwrap().has_arrived() {
            break;
        }
    }
    let vehicle = sim.get_vehicle(veh).unwrap();
    assert!(!vehicle.is_halted());
    (vehicle.has_arrived() && vehicle.road_id() == goal, route)
}

/// Test that a vehicle facing away from its destination turns around at the
/// end of the road instead of stopping where it cannot turn.
#[test]
fn vehicle_turns_around_to_reach_destination() {
    let network = chain(5);
    for seed in 0..20 {
        let (arrived, route) = drive_to(&network, seed, 2, 0);
        assert!(arrived, "seed {} did not arrive via {:?}", seed, route);
    }
}

/// Test that a vehicle facing away from its destination across a grid
/// carries on around the block.
#[test]
fn vehicle_goes_around_the_block() {
    let network = RoadNetwork::build(&TopologyDescription::grid(3, 2, 20.0, 50.0)).unwrap();
    for seed in 0..20 {
        for (start, goal) in [(1, 0), (4, 0), (2, 3)] {
            let (arrived, route) = drive_to(&network, seed, start, goal);
            assert!(
                arrived,
                "seed {} from {} to {} did not arrive via {:?}",
                seed, start, goal, route
            );
        }
    }
}

/// Test that an unreachable destination leaves the vehicle roaming.
#[test]
fn unreachable_destination_keeps_roaming() {
    let mut desc = TopologyDescription::grid(3, 1, 20.0, 50.0);
    let a = desc.add_road(
        road_agents::RoadKind::Straight,
        road_agents::math::Point2d::new(0.0, 100.0),
        0.0,
        50.0,
    );
    let b = desc.add_road(
        road_agents::RoadKind::Straight,
        road_agents::math::Point2d::new(20.0, 100.0),
        0.0,
        50.0,
    );
    desc.connect(a, b);
    desc.infer_shapes();
    let network = RoadNetwork::build(&desc).unwrap();
    let start = network.road_id(1).unwrap();
    let island = network.road_id(a).unwrap();

    let mut sim = Simulation::new(network, SimulationConfig::default());
    let veh = sim
        .spawn_vehicle_at(&VehicleAttributes::default(), start)
        .unwrap();
    assert!(!sim.set_vehicle_destination(veh, island));
    assert_eq!(sim.get_vehicle(veh).unwrap().state(), &VehicleState::Roaming);
    assert!(sim.route_waypoints(veh).is_empty());
}

/// Test that invalid time steps do not move anything.
#[test]
fn invalid_time_step_is_ignored() {
    let network = chain(3);
    let start = network.road_id(1).unwrap();
    let mut sim = Simulation::new(network, SimulationConfig::default());
    let veh = sim
        .spawn_vehicle_at(&VehicleAttributes::default(), start)
        .unwrap();

    let pos = sim.get_vehicle(veh).unwrap().position();
    sim.step(-1.0);
    sim.step(f64::NAN);
    sim.step(f64::INFINITY);
    assert_eq!(sim.get_vehicle(veh).unwrap().position(), pos);
    assert_eq!(sim.frame(), 3);
}

/// Test that vehicles only spawn on free roads.
#[test]
fn spawning_fills_free_roads() {
    let network = chain(4);
    let mut sim = Simulation::new(network, SimulationConfig::default());
    let attributes = VehicleAttributes::default();

    let ids = (0..4)
        .map(|_| sim.spawn_vehicle(&attributes).unwrap())
        .collect::<Vec<_>>();
    assert!(sim.spawn_vehicle(&attributes).is_none());

    let mut roads = ids
        .iter()
        .map(|id| sim.get_vehicle(*id).unwrap().road_id())
        .collect::<Vec<_>>();
    roads.sort();
    roads.dedup();
    assert_eq!(roads.len(), 4);

    sim.remove_vehicle(ids[0]);
    assert!(sim.get_vehicle(ids[0]).is_none());
    assert!(sim.spawn_vehicle(&attributes).is_some());
}
