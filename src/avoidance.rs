//! Per-tick collision avoidance between vehicles.
//!
//! Every vehicle casts a ray ahead of itself against the bounding boxes of nearby vehicles.
//! The nearest vehicle it hits, in distance order, decides how fast it may travel this tick.
//! The engine works on a snapshot of every vehicle taken before anything moves and returns
//! one [Verdict] per vehicle, so the result never depends on the order vehicles integrate in.

pub use self::grid::SpatialGrid;
use crate::debug::{debug_circle, debug_line};
use crate::math::{OrientedBox, Point2d, Ray2d, RayIntersect};
use crate::{LaneId, Vehicle};
use cgmath::MetricSpace;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod grid;

/// Tuning for the collision avoidance engine.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AvoidanceParams {
    /// The slowest a blocked vehicle creeps forward while there is still room, in m/s.
    pub crawl_speed: f64,
    /// The gap in m to the vehicle ahead at or below which a vehicle stops entirely.
    pub standstill_gap: f64,
}

impl Default for AvoidanceParams {
    fn default() -> Self {
        Self {
            crawl_speed: 0.5,
            standstill_gap: 1.0,
        }
    }
}

/// What the engine needs to know about a vehicle.
#[derive(Clone, Copy, Debug)]
pub struct Probe {
    pub lane: LaneId,
    pub position: Point2d,
    pub bounds: OrientedBox,
    pub sensor: Ray2d,
    pub half_length: f64,
    pub max_speed: f64,
    pub actual_speed: f64,
}

/// The outcome of collision avoidance for one vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Verdict {
    /// The speed the vehicle should ease towards, within `[0, max_speed]`.
    pub target_speed: f64,
    /// Whether another vehicle has already resolved its encounter with this one.
    pub ignore_collisions: bool,
}

/// Computes target speeds for a set of vehicles.
#[derive(Clone, Copy, Debug, Default)]
pub struct CollisionAvoidance {
    params: AvoidanceParams,
}

impl Probe {
    /// Takes a snapshot of a vehicle.
    pub fn of(vehicle: &Vehicle) -> Self {
        Self {
            lane: vehicle.lane_id(),
            position: vehicle.position(),
            bounds: vehicle.bounds(),
            sensor: vehicle.sensor_ray(),
            half_length: vehicle.half_length(),
            max_speed: vehicle.max_speed(),
            actual_speed: vehicle.actual_speed(),
        }
    }
}

impl CollisionAvoidance {
    pub fn new(params: AvoidanceParams) -> Self {
        Self { params }
    }

    /// The parameters the engine was created with.
    pub fn params(&self) -> &AvoidanceParams {
        &self.params
    }

    /// Runs a full avoidance pass, returning one verdict per probe in the same order.
    pub fn evaluate(&self, probes: &[Probe]) -> Vec<Verdict> {
        let mut verdicts = probes
            .iter()
            .map(|probe| Verdict {
                target_speed: probe.max_speed,
                ignore_collisions: false,
            })
            .collect::<Vec<_>>();

        let max_range = probes
            .iter()
            .map(|p| p.sensor.length)
            .fold(0.0, f64::max);
        let max_radius = probes
            .iter()
            .map(|p| p.bounds.radius())
            .fold(0.0, f64::max);

        let mut grid = SpatialGrid::new(max_range + max_radius);
        for (idx, probe) in probes.iter().enumerate() {
            grid.insert(idx, probe.position);
        }

        for (idx, probe) in probes.iter().enumerate() {
            if verdicts[idx].ignore_collisions {
                continue;
            }

            let reach = probe.sensor.length + max_radius;
            let mut candidates = grid
                .query_radius(probe.position, reach)
                .into_iter()
                .filter(|other| *other != idx)
                .map(|other| (other, probe.position.distance(probes[other].position)))
                .filter(|(_, dist)| *dist <= reach)
                .collect::<Vec<_>>();
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

            for (other_idx, _) in candidates {
                let other = &probes[other_idx];
                let Some(hit) = other.bounds.intersect(&probe.sensor) else {
                    continue;
                };
                debug_line("sensor", probe.position, probe.sensor.at(hit));
                debug_circle("sensor_hit", probe.sensor.at(hit), 0.25);

                let mutual = probe.bounds.intersect(&other.sensor).is_some();
                if mutual && probe.lane != other.lane {
                    verdicts[other_idx].ignore_collisions = true;
                    break;
                }
                if mutual {
                    let verdict = &mut verdicts[other_idx];
                    verdict.ignore_collisions = true;
                    verdict.target_speed = verdict
                        .target_speed
                        .min(self.params.crawl_speed)
                        .clamp(0.0, other.max_speed);
                }

                let target = self.following_speed(probe, other, hit);
                let verdict = &mut verdicts[idx];
                verdict.target_speed = verdict.target_speed.min(target);
                break;
            }
        }

        verdicts
    }

    /// The speed a vehicle should travel at given its sensor hits `other` at distance `hit`.
    fn following_speed(&self, probe: &Probe, other: &Probe, hit: f64) -> f64 {
        let gap = hit - probe.half_length;
        let relative = if probe.sensor.length > 0.0 {
            (gap / probe.sensor.length).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let speed = if probe.actual_speed >= other.actual_speed {
            probe.max_speed * relative
        } else {
            other.actual_speed * relative
        };

        let speed = if gap > self.params.standstill_gap {
            speed.max(self.params.crawl_speed)
        } else {
            0.0
        };
        speed.clamp(0.0, probe.max_speed)
    }
}
