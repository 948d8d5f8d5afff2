//! Mathematical structs and functions.

use cgmath::{Point2, Vector2};
pub use arc::Arc2d;
pub use bezier::QuadraticBezier2d;
pub use curve::{equidistant_points_along_curve, polyline_length, ParametricCurve2d};
pub use ray::{OrientedBox, Ray2d, RayIntersect};
pub use util::*;

mod arc;
mod bezier;
mod curve;
mod ray;
mod util;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;
