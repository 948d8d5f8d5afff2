//! Uniform spatial hash used for the broad phase.

use crate::math::{Point2d, Vector2d};
use std::collections::HashMap;

/// A uniform grid bucketing items by the cell their position falls in.
#[derive(Clone, Debug)]
pub struct SpatialGrid {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    /// Creates an empty grid. Cell sizes that are not positive and finite fall back to 1 m.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    /// Converts a world position to cell coordinates.
    pub fn to_cell(&self, pos: Point2d) -> (i64, i64) {
        (
            (pos.x / self.cell_size).floor() as i64,
            (pos.y / self.cell_size).floor() as i64,
        )
    }

    /// Inserts an item at a position.
    pub fn insert(&mut self, item: usize, pos: Point2d) {
        let cell = self.to_cell(pos);
        self.cells.entry(cell).or_default().push(item);
    }

    /// Gets every item in a cell overlapping the square of half-extent `radius`
    /// around `centre`, in ascending order. Items outside the radius may be included.
    pub fn query_radius(&self, centre: Point2d, radius: f64) -> Vec<usize> {
        let extent = Vector2d::new(radius, radius);
        let min_cell = self.to_cell(centre - extent);
        let max_cell = self.to_cell(centre + extent);

        let mut result = Vec::new();
        for cx in min_cell.0..=max_cell.0 {
            for cy in min_cell.1..=max_cell.1 {
                if let Some(items) = self.cells.get(&(cx, cy)) {
                    result.extend(items);
                }
            }
        }
        result.sort_unstable();
        result
    }
}
