//! Tests that simulations are reproducible.

use road_agents::math::Point2d;
use road_agents::{
    RoadNetwork, Simulation, SimulationConfig, TopologyDescription, VehicleAttributes,
};
use std::sync::Arc;

fn run(network: Arc<RoadNetwork>, seed: u64, frames: usize) -> Vec<(Point2d, f64)> {
    let mut sim = Simulation::new(
        network,
        SimulationConfig {
            seed,
            ..Default::default()
        },
    );
    let attributes = VehicleAttributes::default();
    let ids = (0..12)
        .filter_map(|_| sim.spawn_vehicle(&attributes))
        .collect::<Vec<_>>();
    sim.randomise_max_speeds(0.1);
    let goal = sim.network().road_id(0).unwrap();
    for id in ids.iter().step_by(3) {
        sim.set_vehicle_destination(*id, goal);
    }

    for _ in 0..frames {
        sim.step(1.0 / 30.0);
    }
    sim.iter_vehicles()
        .map(|v| (v.position(), v.actual_speed()))
        .collect()
}

#[test]
fn identical_seeds_give_identical_runs() {
    let network = Arc::new(RoadNetwork::build(&TopologyDescription::grid(5, 5, 20.0, 50.0)).unwrap());
    let first = run(network.clone(), 11, 400);
    let second = run(network, 11, 400);
    assert_eq!(first.len(), 12);
    assert_eq!(first, second);
}

#[test]
fn transforms_match_vehicles() {
    let network = RoadNetwork::build(&TopologyDescription::grid(3, 3, 20.0, 50.0)).unwrap();
    let mut sim = Simulation::new(network, SimulationConfig::default());
    let attributes = VehicleAttributes::default();
    for _ in 0..4 {
        sim.spawn_vehicle(&attributes);
    }
    for _ in 0..50 {
        sim.step(0.1);
    }
    for (id, transform) in sim.transforms() {
        let vehicle = sim.get_vehicle(id).unwrap();
        assert_eq!(transform.position, vehicle.position());
        assert_eq!(transform.direction, vehicle.direction());
        assert!((transform.direction.x.hypot(transform.direction.y) - 1.0).abs() < 1e-9);
    }
}
