use super::curve::ParametricCurve2d;
use super::{Point2d, Vector2d};
use crate::util::Interval;
use std::f64::consts::TAU;

/// A counter-clockwise arc around a centre point whose radius
/// varies linearly from start to end, so that both end points lie exactly on it.
#[derive(Copy, Clone, Debug)]
pub struct Arc2d {
    centre: Point2d,
    radius: Interval<f64>,
    start_angle: f64,
    sweep: f64,
}

impl Arc2d {
    /// Creates the counter-clockwise arc from `start` to `end` around `centre`.
    /// When the end points coincide in angle the arc is a full turn.
    pub fn counter_clockwise(centre: Point2d, start: Point2d, end: Point2d) -> Self {
        let (v0, v1) = (start - centre, end - centre);
        let start_angle = v0.y.atan2(v0.x);
        let end_angle = v1.y.atan2(v1.x);
        let mut sweep = (end_angle - start_angle).rem_euclid(TAU);
        if sweep < 1e-6 {
            sweep = TAU;
        }
        Self {
            centre,
            radius: Interval::new(v0.x.hypot(v0.y), v1.x.hypot(v1.y)),
            start_angle,
            sweep,
        }
    }

    /// The angle swept by the arc, in radians.
    pub fn sweep(&self) -> f64 {
        self.sweep
    }
}

impl ParametricCurve2d for Arc2d {
    fn sample(&self, t: f64) -> Point2d {
        let angle = self.start_angle + t * self.sweep;
        let radius = self.radius.lerp(t);
        self.centre + radius * Vector2d::new(angle.cos(), angle.sin())
    }

    fn bounds(&self) -> Interval<f64> {
        Interval { min: 0.0, max: 1.0 }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::PI;

    #[test]
    fn arc_passes_through_end_points() {
        let arc = Arc2d::counter_clockwise(
            Point2d::new(0.0, 0.0),
            Point2d::new(5.0, 0.0),
            Point2d::new(0.0, 4.0),
        );
        assert_approx_eq!(arc.sweep(), 0.5 * PI);
        let (a, b) = (arc.sample(0.0), arc.sample(1.0));
        assert_approx_eq!(a.x, 5.0);
        assert_approx_eq!(a.y, 0.0);
        assert_approx_eq!(b.x, 0.0);
        assert_approx_eq!(b.y, 4.0);
    }

    #[test]
    fn arc_turns_the_long_way_when_clockwise_is_shorter() {
        let arc = Arc2d::counter_clockwise(
            Point2d::new(0.0, 0.0),
            Point2d::new(0.0, 4.0),
            Point2d::new(4.0, 0.0),
        );
        assert_approx_eq!(arc.sweep(), 1.5 * PI);
        let mid = arc.sample(0.5);
        assert!(mid.x < 0.0);
    }
}
