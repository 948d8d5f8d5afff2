//! Generation of lane centre lines from a road's placement.

use super::RoadKind;
use crate::math::{
    equidistant_points_along_curve, intersect_lines, rot270, try_normalize, Arc2d, Point2d,
    QuadraticBezier2d, Vector2d,
};
use cgmath::prelude::*;

/// The distance between consecutive lane waypoints in m.
pub const WAYPOINT_SPACING: f64 = 1.0;

/// The placement of a road and the two neighbours a lane joins.
pub(crate) struct LaneEnds {
    pub kind: RoadKind,
    pub centre: Point2d,
    /// The road's forward vector, used when a neighbour sits on top of the road.
    pub forward: Vector2d,
    /// The position of the neighbour the lane enters from.
    pub from: Point2d,
    /// The position of the neighbour the lane leaves towards.
    pub to: Point2d,
    /// Whether the lane enters and leaves via the same neighbour.
    pub u_turn: bool,
    /// The lateral offset of the lane from the centre line, to the right.
    pub lane_offset: f64,
}

/// Computes the waypoints of a lane and its length.
pub(crate) fn lane_waypoints(ends: &LaneEnds) -> (Vec<Point2d>, f64) {
    let centre = ends.centre;

    // Directions of travel at the entry and exit boundaries
    let dir_in = try_normalize(centre - ends.from, 1e-6).unwrap_or(ends.forward);
    let dir_out = try_normalize(ends.to - centre, 1e-6).unwrap_or(ends.forward);

    // Boundaries are half way between the road and its neighbours
    let entry_boundary = centre.midpoint(ends.from);
    let exit_boundary = centre.midpoint(ends.to);
    let start = entry_boundary + ends.lane_offset * rot270(dir_in);
    let end = exit_boundary + ends.lane_offset * rot270(dir_out);

    if ends.u_turn {
        // Loop out to the road's centre and back again
        let depth = entry_boundary.distance(centre);
        let control = start.midpoint(end) + 2.0 * depth * dir_in;
        return equidistant_points_along_curve(
            &QuadraticBezier2d::new(&[start, control, end]),
            WAYPOINT_SPACING,
        );
    }

    if ends.kind == RoadKind::Roundabout {
        let arc = Arc2d::counter_clockwise(centre, start, end);
        return equidistant_points_along_curve(&arc, WAYPOINT_SPACING);
    }

    // Bend the lane through the point where its entry and exit headings cross,
    // unless that is nowhere near the road
    let reach = entry_boundary.distance(centre) + exit_boundary.distance(centre);
    let control = intersect_lines(start, dir_in, end, dir_out)
        .filter(|p| p.distance(centre) <= reach)
        .unwrap_or_else(|| start.midpoint(end));
    equidistant_points_along_curve(
        &QuadraticBezier2d::new(&[start, control, end]),
        WAYPOINT_SPACING,
    )
}
