//! Edge handling, interpolation and output geometry options.

use crate::geometry::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Behaviour when a grid is sampled outside its coordinate axes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EdgeMode {
    /// Repeat the nearest edge voxel
    #[default]
    Clamp,
    /// Everything outside the grid reads as zero dose
    Zero,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Interpolation {
    #[default]
    Trilinear,
    Nearest,
}

/// Geometry of the grid the gamma index is written to
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OutputGeometry {
    /// Same axes as the reference grid
    #[default]
    Reference,
    /// Covers the union of both grids, sampled with the given spacing (mm)
    Union { spacing: Point3 },
}

impl OutputGeometry {
    /// Union geometry with 1 x 1 x 2 mm spacing, the usual CT-derived dose grid.
    pub fn union_default() -> Self {
        Self::Union {
            spacing: Point3::new(1.0, 1.0, 2.0),
        }
    }
}
