use crate::math::Vector2d;
use crate::road::{Lane, RoadKind};
use crate::{RoadId, RoadNetwork};
use cgmath::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Travel directions shorter than this are too small to choose a lane with.
pub const DEGENERATE_DIRECTION: f64 = 1e-6;

/// The default tolerance for matching a travel direction to a road's axis.
pub const AXIAL_TOLERANCE: f64 = 0.99;

/// How a lane is chosen for a direction of travel across a road.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LaneRule {
    /// Compare the travel direction with the road's forward vector.
    /// A dot product above `tolerance` selects the with-flow lane,
    /// one below `-tolerance` the against-flow lane.
    /// Anything in between falls back to [LaneRule::BestAligned].
    Axial { tolerance: f64 },
    /// Select the lane whose overall flow is best aligned with the travel direction.
    BestAligned,
}

/// Maps a road and a direction of travel to the lane that carries it.
///
/// Selection is a pure function of its inputs: the same road and direction
/// always yield the same lane.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaneSelector {
    rules: [LaneRule; RoadKind::ALL.len()],
}

impl Default for LaneSelector {
    fn default() -> Self {
        let axial = LaneRule::Axial {
            tolerance: AXIAL_TOLERANCE,
        };
        let rules = RoadKind::ALL.map(|kind| match kind {
            RoadKind::Straight | RoadKind::Bend => axial,
            _ => LaneRule::BestAligned,
        });
        Self { rules }
    }
}

impl LaneSelector {
    /// Creates a selector with the default rules.
    pub fn new() -> Self {
        Default::default()
    }

    /// Replaces the rule used for one kind of road.
    pub fn with_rule(mut self, kind: RoadKind, rule: LaneRule) -> Self {
        self.rules[kind.index()] = rule;
        self
    }

    /// The rule used for a kind of road.
    pub fn rule(&self, kind: RoadKind) -> LaneRule {
        self.rules[kind.index()]
    }

    /// Selects the lane across `road_id` for travelling in direction `travel_dir`.
    ///
    /// A near-zero travel direction selects the road's first lane.
    /// Returns `None` only if the road has no lanes.
    pub fn select<'a>(
        &self,
        network: &'a RoadNetwork,
        road_id: RoadId,
        travel_dir: Vector2d,
    ) -> Option<&'a Lane> {
        self.select_from(network, road_id, None, travel_dir)
    }

    /// Like [select](Self::select), but only considers lanes entered from `from`
    /// when it is given. Returns `None` if `from` is not a neighbour of the road.
    pub fn select_from<'a>(
        &self,
        network: &'a RoadNetwork,
        road_id: RoadId,
        from: Option<RoadId>,
        travel_dir: Vector2d,
    ) -> Option<&'a Lane> {
        let road = network.road(road_id);
        let entry = match from {
            Some(from) => Some(road.neighbour_index(from)?),
            None => None,
        };
        let candidates = || {
            network
                .lanes_of(road_id)
                .filter(move |lane| entry.map_or(true, |idx| lane.from_road_idx() == idx))
        };

        let magnitude = travel_dir.magnitude();
        if !(magnitude > DEGENERATE_DIRECTION) {
            return candidates().next();
        }
        let travel_dir = travel_dir / magnitude;

        if let LaneRule::Axial { tolerance } = self.rule(road.kind()) {
            let forward = road.forward();
            let dot = forward.dot(travel_dir);
            let with_flow = if dot > tolerance {
                Some(true)
            } else if dot < -tolerance {
                Some(false)
            } else {
                None
            };
            if let Some(with_flow) = with_flow {
                let lane = candidates().find(|lane| (lane.flow().dot(forward) > 0.0) == with_flow);
                if lane.is_some() {
                    return lane;
                }
            }
        }

        // Keep the first of any equally aligned lanes
        let mut best: Option<(&Lane, f64)> = None;
        for lane in candidates() {
            let score = lane.flow().dot(travel_dir);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((lane, score));
            }
        }
        best.map(|(lane, _)| lane)
    }
}
