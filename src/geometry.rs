//! Points and axis-aligned ranges in patient coordinates (mm).

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A position or displacement in patient space, in millimetres.
pub type Point3 = Vector3<f64>;

/// Closed interval `[min, max]` along one axis
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range spanned by an ascending coordinate axis. An empty axis yields `[0, 0]`.
    pub fn of_axis(coords: &[f64]) -> Self {
        match (coords.first(), coords.last()) {
            (Some(&min), Some(&max)) => Self { min, max },
            _ => Self::new(0.0, 0.0),
        }
    }

    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Union of two intervals
    pub fn combine(&self, other: &Range) -> Range {
        Range {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_covers_both_ranges() {
        let a = Range::new(-5.0, 2.0);
        let b = Range::new(0.0, 10.0);
        let c = a.combine(&b);
        assert_eq!(c, Range::new(-5.0, 10.0));
        assert_eq!(b.combine(&a), c);
        assert!((c.length() - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn combine_with_contained_range_is_identity() {
        let outer = Range::new(0.0, 10.0);
        let inner = Range::new(2.0, 3.0);
        assert_eq!(outer.combine(&inner), outer);
    }

    #[test]
    fn of_axis_uses_first_and_last() {
        assert_eq!(Range::of_axis(&[1.0, 2.5, 7.0]), Range::new(1.0, 7.0));
        assert_eq!(Range::of_axis(&[]), Range::new(0.0, 0.0));
        assert!(Range::of_axis(&[1.0, 2.0]).contains(1.5));
        assert!(!Range::of_axis(&[1.0, 2.0]).contains(2.5));
    }
}
