//! Ray casting against bounding volumes.

use super::{project_local, rot90, Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;

/// A ray of finite length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray2d {
    /// Where the ray starts.
    pub origin: Point2d,
    /// A unit vector along the ray.
    pub dir: Vector2d,
    /// The maximum distance along the ray that can register a hit.
    pub length: f64,
}

/// A box of the given half extents, centred on a point and rotated so that
/// its local x-axis is aligned with `axis`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrientedBox {
    pub centre: Point2d,
    /// A unit vector along the box's length.
    pub axis: Vector2d,
    /// Half the box's length.
    pub half_length: f64,
    /// Half the box's width.
    pub half_width: f64,
}

/// Something a ray can be tested against.
pub trait RayIntersect {
    /// Returns the distance along the ray to the first intersection, if there is one.
    /// A ray starting inside the volume hits at distance zero.
    fn intersect(&self, ray: &Ray2d) -> Option<f64>;
}

impl Ray2d {
    pub fn new(origin: Point2d, dir: Vector2d, length: f64) -> Self {
        Self {
            origin,
            dir,
            length,
        }
    }

    /// The point at the given distance along the ray.
    pub fn at(&self, dist: f64) -> Point2d {
        self.origin + dist * self.dir
    }

    /// The far end of the ray.
    pub fn end(&self) -> Point2d {
        self.at(self.length)
    }
}

impl OrientedBox {
    /// The radius of the smallest circle containing the box.
    pub fn radius(&self) -> f64 {
        self.half_length.hypot(self.half_width)
    }
}

impl RayIntersect for OrientedBox {
    fn intersect(&self, ray: &Ray2d) -> Option<f64> {
        let lat = rot90(self.axis);
        let origin = project_local(ray.origin, self.centre, self.axis, lat);
        let dir = Vector2d::new(ray.dir.dot(self.axis), ray.dir.dot(lat));

        // Slab test, one axis at a time
        let mut range = Interval::new(0.0, ray.length);
        let slabs = [
            (origin.x, dir.x, self.half_length),
            (origin.y, dir.y, self.half_width),
        ];
        for (o, d, half) in slabs {
            if d.abs() < 1e-12 {
                if o.abs() > half {
                    return None;
                }
                continue;
            }
            let slab = Interval::spanning((-half - o) / d, (half - o) / d);
            range = range.intersection(&slab);
            if range.is_empty() {
                return None;
            }
        }
        Some(range.min)
    }
}
