//! Shapes drawn by the simulation for inspecting a single step.
//!
//! With the `debug` feature enabled, collision avoidance records its sensor hits here
//! and [Simulation::debug](crate::Simulation::debug) returns them as a JSON array once
//! the step is done. Without the feature every function is a no-op.

use crate::math::Point2d;
#[cfg(feature = "debug")]
use serde_json::{json, Value};

#[cfg(feature = "debug")]
thread_local!(
    /// The shapes recorded on this thread since the frame was last taken.
    static DEBUG_FRAME: std::cell::RefCell<Vec<Value>> = Default::default();
);

/// Appends a shape to the current frame.
#[cfg(feature = "debug")]
fn record(shape: Value) {
    DEBUG_FRAME.with(|frame| frame.borrow_mut().push(shape));
}

/// Records a line segment from `p1` to `p2` in the current debug frame.
#[allow(unused)]
pub fn debug_line(name: &str, p1: Point2d, p2: Point2d) {
    #[cfg(feature = "debug")]
    record(json!({
        "type": "line",
        "name": name,
        "p1": [p1.x, p1.y],
        "p2": [p2.x, p2.y],
    }));
}

/// Records a circle in the current debug frame.
#[allow(unused)]
pub fn debug_circle(name: &str, centre: Point2d, radius: f64) {
    #[cfg(feature = "debug")]
    record(json!({
        "type": "circle",
        "name": name,
        "centre": [centre.x, centre.y],
        "radius": radius,
    }));
}

/// Takes every shape recorded on this thread since the last call, leaving the frame empty.
#[cfg(feature = "debug")]
pub fn take_debug_frame() -> Value {
    Value::Array(DEBUG_FRAME.with(|frame| frame.take()))
}
