use super::{Point2d, Vector2d};
use cgmath::prelude::*;

/// Projects a point onto a local coordinate system.
///
/// # Parameters
/// * `point` - The point to project
/// * `origin` - The origin of the coordinate system
/// * `x_axis` - The basis vector pointing in the positive x-axis.
/// * `y_axis` - The basis vector pointing in the positive y-axis.
pub fn project_local(
    point: Point2d,
    origin: Point2d,
    x_axis: Vector2d,
    y_axis: Vector2d,
) -> Point2d {
    let point = point - origin;
    Point2d::new(point.dot(x_axis), point.dot(y_axis))
}

/// Rotates a vector 90 degrees counter-clockwise.
pub fn rot90(vec: Vector2d) -> Vector2d {
    Vector2d::new(-vec.y, vec.x)
}

/// Rotates a vector 90 degrees clockwise, i.e. towards the right-hand side
/// of something travelling along it.
pub fn rot270(vec: Vector2d) -> Vector2d {
    Vector2d::new(vec.y, -vec.x)
}

/// The unit vector pointing along the given yaw angle,
/// measured counter-clockwise from the positive x-axis.
pub fn heading(yaw: f64) -> Vector2d {
    Vector2d::new(yaw.cos(), yaw.sin())
}

/// Normalises a vector, returning `None` if it is too short to have a direction.
pub fn try_normalize(vec: Vector2d, min_magnitude: f64) -> Option<Vector2d> {
    let mag = vec.magnitude();
    (mag > min_magnitude).then(|| vec / mag)
}

/// Finds the intersection of two lines, each given by a point and a direction.
/// Returns `None` if the lines are (nearly) parallel.
pub fn intersect_lines(p1: Point2d, d1: Vector2d, p2: Point2d, d2: Vector2d) -> Option<Point2d> {
    let denom = d1.perp_dot(d2);
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = (p2 - p1).perp_dot(d2) / denom;
    Some(p1 + t * d1)
}
