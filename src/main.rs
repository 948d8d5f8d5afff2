use std::time::Instant;

use road_agents::{RoadNetwork, Simulation, SimulationConfig, TopologyDescription, VehicleAttributes};

const GRID_SIZE: usize = 8;
const GRID_SPACING: f64 = 20.0;
const NUM_VEHICLES: usize = 40;
const NUM_FRAMES: u32 = 1000;
const NUM_ROUNDS: usize = 5;

fn main() -> road_agents::Result<()> {
    env_logger::init();

    let desc = TopologyDescription::grid(GRID_SIZE, GRID_SIZE, GRID_SPACING, 50.0);
    let network = RoadNetwork::build(&desc)?;
    let mut sim = Simulation::new(network, SimulationConfig::default());

    let attributes = VehicleAttributes::default();
    let vehicles = (0..NUM_VEHICLES)
        .filter_map(|_| sim.spawn_vehicle(&attributes))
        .collect::<Vec<_>>();
    sim.randomise_max_speeds(0.1);

    // Send every other vehicle to the far corner
    if let Some(goal) = sim.network().road_id(GRID_SIZE * GRID_SIZE - 1) {
        for id in vehicles.iter().step_by(2) {
            sim.set_vehicle_destination(*id, goal);
        }
    }

    println!("Simulating {} vehicles...", vehicles.len());
    for _ in 0..NUM_ROUNDS {
        let start = Instant::now();
        for _ in 0..NUM_FRAMES {
            sim.step(0.05);
        }
        let frame = start.elapsed() / NUM_FRAMES;
        let arrived = sim.iter_vehicles().filter(|v| v.has_arrived()).count();
        println!(
            "Avg. frame: {:?} --> {:.0}x speedup ({} arrived, frame {})",
            frame,
            0.05 / frame.as_secs_f64(),
            arrived,
            sim.frame(),
        );
    }
    Ok(())
}
