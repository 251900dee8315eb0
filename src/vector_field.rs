//! Displacement vectors per voxel and their Jacobian determinant.

use nalgebra::Matrix3;
use rayon::prelude::*;

use crate::geometry::Point3;
use crate::grid::{DoseGrid, VoxelGrid};
use crate::reconcile::Reconciler;

/// Central difference step in mm, sampled half a step either side of the voxel
const DIFFERENCE_STEP: f64 = 1.0;

/// Per-voxel displacement stored as three scalar grids sharing one geometry.
#[derive(Debug, Clone)]
pub struct VectorField {
    pub x: VoxelGrid,
    pub y: VoxelGrid,
    pub z: VoxelGrid,
}

impl VectorField {
    /// Zero field with the geometry of `grid`.
    pub fn blank_from(grid: &impl DoseGrid) -> Self {
        Self {
            x: Reconciler::blank_from(grid),
            y: Reconciler::blank_from(grid),
            z: Reconciler::blank_from(grid),
        }
    }

    /// Displacement at integer indices `(x, y, z)`.
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<Point3> {
        Some(Point3::new(
            self.x.get(i, j, k)?,
            self.y.get(i, j, k)?,
            self.z.get(i, j, k)?,
        ))
    }

    /// Interpolated displacement at an arbitrary point.
    pub fn sample(&self, point: &Point3) -> Point3 {
        Point3::new(
            self.x.sample(point),
            self.y.sample(point),
            self.z.sample(point),
        )
    }

    /// Determinant of the displacement gradient at `point`.
    ///
    /// Derivatives are central differences over a 1 mm step; near the grid
    /// boundary the samples follow the component grids' edge mode.
    pub fn determinant_at(&self, point: &Point3) -> f64 {
        let half = DIFFERENCE_STEP / 2.0;
        let mut gradient = Matrix3::<f64>::zeros();
        for (col, axis) in [Point3::x(), Point3::y(), Point3::z()].iter().enumerate() {
            let ahead = self.sample(&(point + axis * half));
            let behind = self.sample(&(point - axis * half));
            gradient.set_column(col, &((ahead - behind) / DIFFERENCE_STEP));
        }
        gradient.determinant()
    }

    /// Jacobian determinant of the field at every voxel.
    pub fn jacobian(&self) -> VoxelGrid {
        let mut jacobian = Reconciler::blank_from(&self.x);
        let values: Vec<f64> = (0..jacobian.number_of_voxels())
            .into_par_iter()
            .map(|index| self.determinant_at(&jacobian.position_of(index)))
            .collect();

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        for (slot, value) in jacobian.data_mut().iter_mut().zip(values) {
            *slot = value;
        }
        if min <= max {
            jacobian.set_extremes(min, max);
        }
        jacobian
    }
}
