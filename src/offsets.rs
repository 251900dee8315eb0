//! Candidate displacements searched around every voxel.
//!
//! The table is sorted by ascending squared distance. The gamma search relies
//! on that order to stop early, so the sort is part of the contract.

use std::cmp::Ordering;

use tracing::debug;

use crate::geometry::Point3;

/// Number of grid cells the alignment set reaches along each axis
const ALIGNMENT_CELLS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset {
    pub displacement: Point3,
    pub distance_squared: f64,
}

impl Offset {
    pub fn new(displacement: Point3) -> Self {
        Self {
            displacement,
            distance_squared: displacement.norm_squared(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.distance_squared == 0.0
    }

    /// Total order: squared distance, then displacement components for ties.
    fn total_cmp(&self, other: &Self) -> Ordering {
        self.distance_squared
            .total_cmp(&other.distance_squared)
            .then_with(|| self.displacement.x.total_cmp(&other.displacement.x))
            .then_with(|| self.displacement.y.total_cmp(&other.displacement.y))
            .then_with(|| self.displacement.z.total_cmp(&other.displacement.z))
    }
}

/// Distance-sorted displacements, holding exactly one zero displacement at index 0.
#[derive(Debug, Clone)]
pub struct OffsetTable {
    offsets: Vec<Offset>,
}

impl OffsetTable {
    /// Build the table for a search cube of `diameter` sampled every `step`,
    /// plus every multiple of `grid_spacing` within two cells of the origin.
    ///
    /// `diameter` and `step` must be positive; callers validate tolerances first.
    pub fn build(diameter: f64, step: f64, grid_spacing: &Point3) -> Self {
        let mut offsets = Self::alignment_offsets(grid_spacing);
        offsets.extend(Self::lattice_offsets(diameter, step));
        offsets.push(Offset::new(Point3::zeros()));

        offsets.sort_by(Offset::total_cmp);
        // Collapse every zero displacement into the single leading entry
        let zeros = offsets.iter().take_while(|o| o.is_zero()).count();
        offsets.drain(..zeros.saturating_sub(1));

        debug!(
            offsets = offsets.len(),
            diameter, step, "Built gamma offset table"
        );

        Self { offsets }
    }

    /// Table for a distance-to-agreement tolerance: three tolerances wide,
    /// sampled at a tenth of the tolerance.
    pub fn for_tolerance(distance_tolerance: f64, grid_spacing: &Point3) -> Self {
        Self::build(distance_tolerance * 3.0, distance_tolerance / 10.0, grid_spacing)
    }

    /// All offsets, zero displacement first.
    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    /// Offsets with a non-zero displacement, in ascending distance.
    pub fn search_offsets(&self) -> &[Offset] {
        match self.offsets.first() {
            Some(first) if first.is_zero() => &self.offsets[1..],
            _ => &self.offsets,
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Every multiple of the grid spacing within `ALIGNMENT_CELLS` cells on each axis.
    fn alignment_offsets(spacing: &Point3) -> Vec<Offset> {
        let cells = -ALIGNMENT_CELLS..=ALIGNMENT_CELLS;
        let mut offsets = Vec::with_capacity(cells.clone().count().pow(3));
        for i in cells.clone() {
            for j in cells.clone() {
                for k in cells.clone() {
                    offsets.push(Offset::new(Point3::new(
                        f64::from(i) * spacing.x,
                        f64::from(j) * spacing.y,
                        f64::from(k) * spacing.z,
                    )));
                }
            }
        }
        offsets
    }

    /// Cube of `step` sized displacements spanning `diameter`, symmetric about the origin.
    fn lattice_offsets(diameter: f64, step: f64) -> Vec<Offset> {
        if !(diameter > 0.0 && step > 0.0 && diameter.is_finite() && step.is_finite()) {
            return Vec::new();
        }
        let mut n = (diameter / step).round() as i64;
        if n % 2 != 0 {
            n += 1;
        }
        let half = n / 2;
        let coords: Vec<f64> = (-half..=half).map(|i| i as f64 * step).collect();

        let mut offsets = Vec::with_capacity(coords.len().pow(3));
        for &x in &coords {
            for &y in &coords {
                for &z in &coords {
                    offsets.push(Offset::new(Point3::new(x, y, z)));
                }
            }
        }
        offsets
    }
}
