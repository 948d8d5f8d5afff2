use crate::math::{try_normalize, Point2d, Vector2d};
use cgmath::InnerSpace;

/// Computes a vehicle's new heading after its centre moves from `pos` to `new_pos`,
/// treating it as a bicycle whose rear axle trails `wheel_base` behind the centre.
///
/// The heading therefore turns gradually through corners and across lane changes
/// rather than snapping to each new waypoint segment. Falls back to `fallback`
/// when the geometry is degenerate.
pub fn steer_towards(
    pos: Point2d,
    dir: Vector2d,
    new_pos: Point2d,
    wheel_base: f64,
    fallback: Vector2d,
) -> Vector2d {
    if wheel_base <= 0.0 || dir.magnitude2() < 1e-12 {
        return fallback;
    }
    let rear = pos - wheel_base * dir;
    try_normalize(new_pos - rear, 1e-9).unwrap_or(fallback)
}
