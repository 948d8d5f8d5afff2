//! The static description a [RoadNetwork](crate::RoadNetwork) is built from.

use crate::error::TopologyError;
use crate::math::Point2d;
use crate::road::{RoadKind, MAX_NEIGHBOURS};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The default lateral distance between a lane and its road's centre line, in m.
pub const DEFAULT_LANE_OFFSET: f64 = 1.5;

/// The placement of a single road.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoadDescriptor {
    /// The shape of the road.
    pub kind: RoadKind,
    /// The world space position of the road's centre.
    pub position: Point2d,
    /// The with-flow heading in radians, counter-clockwise from the x-axis.
    /// For a bend this is the direction of the chord from its first neighbour to its second.
    pub yaw: f64,
    /// The speed limit, used to weigh routes.
    pub speed_limit: f64,
    /// Indices of the neighbouring roads in the description.
    pub neighbours: Vec<usize>,
}

/// A list of placed roads and how they connect.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TopologyDescription {
    /// The roads; a road's ID in the description is its index in this list.
    pub roads: Vec<RoadDescriptor>,
    /// The lateral distance between each lane and its road's centre line, in m.
    #[cfg_attr(feature = "serde", serde(default = "default_lane_offset"))]
    pub lane_offset: f64,
}

#[cfg(feature = "serde")]
fn default_lane_offset() -> f64 {
    DEFAULT_LANE_OFFSET
}

impl Default for TopologyDescription {
    fn default() -> Self {
        Self {
            roads: vec![],
            lane_offset: DEFAULT_LANE_OFFSET,
        }
    }
}

impl TopologyDescription {
    /// Creates an empty description.
    pub fn new() -> Self {
        Default::default()
    }

    /// Parses a description from JSON.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Adds an unconnected road and returns its index.
    pub fn add_road(&mut self, kind: RoadKind, position: Point2d, yaw: f64, speed_limit: f64) -> usize {
        self.roads.push(RoadDescriptor {
            kind,
            position,
            yaw,
            speed_limit,
            neighbours: vec![],
        });
        self.roads.len() - 1
    }

    /// Declares that two roads are neighbours, in both directions.
    pub fn connect(&mut self, a: usize, b: usize) {
        for (from, to) in [(a, b), (b, a)] {
            let neighbours = &mut self.roads[from].neighbours;
            if !neighbours.contains(&to) {
                neighbours.push(to);
            }
        }
    }

    /// Checks that every neighbour exists and that adjacency is symmetric.
    pub fn validate(&self) -> Result<(), TopologyError> {
        for (road, desc) in self.roads.iter().enumerate() {
            if desc.neighbours.len() > MAX_NEIGHBOURS {
                return Err(TopologyError::TooManyNeighbours {
                    road,
                    count: desc.neighbours.len(),
                    max: MAX_NEIGHBOURS,
                });
            }
            for (idx, &neighbour) in desc.neighbours.iter().enumerate() {
                if neighbour >= self.roads.len() {
                    return Err(TopologyError::UnknownNeighbour { road, neighbour });
                }
                if neighbour == road {
                    return Err(TopologyError::SelfLoop { road });
                }
                if desc.neighbours[..idx].contains(&neighbour) {
                    return Err(TopologyError::DuplicateNeighbour { road, neighbour });
                }
                if !self.roads[neighbour].neighbours.contains(&road) {
                    return Err(TopologyError::AsymmetricAdjacency { road, neighbour });
                }
            }
        }
        Ok(())
    }

    /// Assigns each road a kind and heading that match the layout of its neighbours.
    /// Roads without neighbours are left untouched.
    pub fn infer_shapes(&mut self) {
        for idx in 0..self.roads.len() {
            let desc = &self.roads[idx];
            let centre = desc.position;
            let dirs = desc
                .neighbours
                .iter()
                .map(|n| self.roads[*n].position - centre)
                .collect::<Vec<_>>();
            let (kind, yaw) = match dirs.as_slice() {
                [] => continue,
                [d] => (RoadKind::Terminal, (-d.y).atan2(-d.x)),
                [a, b] => {
                    let (a, b) = (*a, *b);
                    let chord = b - a;
                    let collinear = a.perp_dot(b).abs() < 1e-6 * a.x.hypot(a.y) * b.x.hypot(b.y);
                    let kind = if collinear {
                        RoadKind::Straight
                    } else {
                        RoadKind::Bend
                    };
                    (kind, chord.y.atan2(chord.x))
                }
                [_, _, _] => (RoadKind::Junction, desc.yaw),
                _ => (RoadKind::Crossroad, desc.yaw),
            };
            let desc = &mut self.roads[idx];
            desc.kind = kind;
            desc.yaw = yaw;
        }
    }

    /// A rectangular grid of roads `spacing` m apart, each connected to
    /// its horizontal and vertical neighbours.
    pub fn grid(cols: usize, rows: usize, spacing: f64, speed_limit: f64) -> Self {
        let mut desc = Self::new();
        for row in 0..rows {
            for col in 0..cols {
                let position = Point2d::new(col as f64 * spacing, row as f64 * spacing);
                desc.add_road(RoadKind::Straight, position, 0.0, speed_limit);
            }
        }
        for row in 0..rows {
            for col in 0..cols {
                let idx = row * cols + col;
                if col + 1 < cols {
                    desc.connect(idx, idx + 1);
                }
                if row + 1 < rows {
                    desc.connect(idx, idx + cols);
                }
            }
        }
        desc.infer_shapes();
        desc
    }
}
