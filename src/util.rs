//! Miscellaneous utility structs and functions.

use std::fmt::Debug;

use cgmath::num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    /// Creates a new interval.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: std::cmp::PartialOrd> Interval<T> {
    /// Returns true if the interval contains no values.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

impl<T: Float> Interval<T> {
    /// Creates the smallest interval containing both values.
    pub fn spanning(a: T, b: T) -> Self {
        Self {
            min: T::min(a, b),
            max: T::max(a, b),
        }
    }

    /// The value a fraction `t` of the way from `min` to `max`.
    pub fn lerp(&self, t: T) -> T {
        self.min + t * (self.max - self.min)
    }

    /// The fraction of the way from `min` to `max` that `value` lies.
    pub fn inv_lerp(&self, value: T) -> T {
        (value - self.min) / (self.max - self.min)
    }

    /// Computes the overlap of two intervals, which may be empty.
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            min: T::max(self.min, other.min),
            max: T::min(self.max, other.max),
        }
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

#[cfg(test)]
mod test {
    use super::Interval;

    #[test]
    fn intersection_of_disjoint_intervals_is_empty() {
        let a = Interval::new(0.0, 1.0);
        let b = Interval::new(2.0, 3.0);
        assert!(a.intersection(&b).is_empty());
        assert!(!a.intersection(&Interval::new(0.5, 3.0)).is_empty());
    }

    #[test]
    fn spanning_orders_bounds() {
        let i = Interval::spanning(4.0, -2.0);
        assert_eq!(i, Interval::new(-2.0, 4.0));
    }
}
