//! Output grids built from the geometry of existing grids.

use tracing::debug;

use crate::geometry::{Point3, Range};
use crate::grid::{DoseGrid, GridError, VoxelGrid};

/// Builds output grids whose geometry matches, or covers, existing grids.
pub struct Reconciler;

impl Reconciler {
    /// Zero-filled grid with the same axes and spacing as `grid`, scaling 1.
    pub fn blank_from(grid: &impl DoseGrid) -> VoxelGrid {
        let [x, y, z] = grid.axes();
        VoxelGrid::blank(
            x.to_vec(),
            y.to_vec(),
            z.to_vec(),
            grid.spacing(),
            grid.constant_spacing(),
        )
    }

    /// Zero-filled grid covering both inputs, sampled every `spacing` from the
    /// lower corner of the combined extent.
    ///
    /// Each axis holds `round(length / spacing) + 1` coordinates. The last one
    /// is pinned to the combined maximum, so when the length is not a whole
    /// multiple of the spacing the final step differs from it and the grid is
    /// flagged as non-constant.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidSpacing`] if any spacing component is not positive.
    pub fn blank_from_union(
        a: &impl DoseGrid,
        b: &impl DoseGrid,
        spacing: &Point3,
    ) -> Result<VoxelGrid, GridError> {
        VoxelGrid::validate_spacing(spacing)?;

        let [ax, ay, az] = a.ranges();
        let [bx, by, bz] = b.ranges();
        let ranges = [ax.combine(&bx), ay.combine(&by), az.combine(&bz)];

        let (x, x_constant) = Self::union_axis(&ranges[0], spacing.x);
        let (y, y_constant) = Self::union_axis(&ranges[1], spacing.y);
        let (z, z_constant) = Self::union_axis(&ranges[2], spacing.z);
        let constant_spacing = x_constant && y_constant && z_constant;
        debug!(
            nx = x.len(),
            ny = y.len(),
            nz = z.len(),
            constant_spacing,
            "Created union grid"
        );

        Ok(VoxelGrid::blank(x, y, z, *spacing, constant_spacing))
    }

    /// Coordinates from `range.min` every `step`, ending exactly on `range.max`.
    fn union_axis(range: &Range, step: f64) -> (Vec<f64>, bool) {
        let len = (range.length() / step).round() as usize + 1;
        let mut coords = VoxelGrid::linear_axis(range.min, step, len);
        let mut constant = true;
        if let [.., previous, last] = coords.as_mut_slice() {
            // previous <= max - step / 2, so the axis stays ascending
            let tolerance = 1e-6 * step.max(1.0);
            constant = ((range.max - *previous) - step).abs() <= tolerance;
            *last = range.max;
        }
        (coords, constant)
    }

    /// Percent dose difference `100 * (a - b) / max(a)` over the union of both
    /// grids, with scaling applied to both inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if `spacing` is invalid or `a` has zero maximum dose.
    pub fn subtract(
        a: &impl DoseGrid,
        b: &impl DoseGrid,
        spacing: &Point3,
    ) -> Result<VoxelGrid, GridError> {
        let normalisation = a.max_dose();
        if normalisation == 0.0 || !normalisation.is_finite() {
            return Err(GridError::ZeroMaximum);
        }

        let mut grid = Self::blank_from_union(a, b, spacing)?;
        let (nz, ny, nx) = grid.dim();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let point =
                        Point3::new(grid.x_coords()[i], grid.y_coords()[j], grid.z_coords()[k]);
                    let difference =
                        100.0 * (a.dose_at(&point) - b.dose_at(&point)) / normalisation;
                    grid.data_mut()[[k, j, i]] = difference;
                    min = min.min(difference);
                    max = max.max(difference);
                }
            }
        }

        grid.set_extremes(min, max);
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::EdgeMode;
    use approx::assert_relative_eq;

    fn spacing(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn cube(n: usize, fill: f64) -> VoxelGrid {
        VoxelGrid::uniform(Point3::zeros(), spacing(1.0, 1.0, 1.0), (n, n, n), fill).unwrap()
    }

    #[test]
    fn blank_from_copies_axes_exactly() {
        let source = VoxelGrid::new(
            vec![-1.1, 0.3, 2.7],
            vec![0.1, 0.2],
            vec![5.0, 7.5, 10.0, 12.5],
            (0..24).map(f64::from).collect(),
        )
        .unwrap()
        .with_scaling(3.0);

        let blank = Reconciler::blank_from(&source);
        assert_eq!(blank.x_coords(), source.x_coords());
        assert_eq!(blank.y_coords(), source.y_coords());
        assert_eq!(blank.z_coords(), source.z_coords());
        for (a, b) in blank.x_coords().iter().zip(source.x_coords()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(blank.spacing(), source.spacing());
        assert_eq!(blank.constant_spacing(), source.constant_spacing());
        assert_relative_eq!(blank.scaling(), 1.0);
        assert!(blank.data().iter().all(|&v| v == 0.0));
        assert_eq!(blank.data().len(), 24);
    }

    #[test]
    fn union_covers_both_extents() {
        let a = VoxelGrid::uniform(spacing(-10.0, 0.0, 5.0), spacing(2.0, 2.0, 2.5), (6, 4, 3), 1.0)
            .unwrap();
        let b = VoxelGrid::uniform(
            spacing(-4.0, -6.0, 0.0),
            spacing(1.0, 3.0, 2.0),
            (20, 3, 4),
            1.0,
        )
        .unwrap();

        let union = Reconciler::blank_from_union(&a, &b, &spacing(1.0, 1.0, 2.0)).unwrap();
        let expected = [
            Range::new(-10.0, 15.0),
            Range::new(-6.0, 6.0),
            Range::new(0.0, 10.0),
        ];
        for (axis, (range, expected)) in union.ranges().iter().zip(expected).enumerate() {
            let a_range = a.ranges()[axis];
            let b_range = b.ranges()[axis];
            assert_relative_eq!(range.min, a_range.min.min(b_range.min));
            assert_relative_eq!(range.max, expected.max, epsilon = 1e-9);
            assert_relative_eq!(range.max, a_range.max.max(b_range.max), epsilon = 1e-9);
        }
        assert_eq!(union.dim(), (6, 13, 26));
    }

    #[test]
    fn union_ends_on_combined_maximum_for_uneven_extent() {
        let a = cube(4, 1.0);
        let b = cube(2, 1.0);

        let union = Reconciler::blank_from_union(&a, &b, &spacing(1.0, 1.0, 2.0)).unwrap();
        assert_eq!(union.z_coords(), &[0.0, 2.0, 3.0]);
        assert_eq!(union.ranges()[2].max, 3.0);
        assert_eq!(union.x_coords(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(union.dim(), (3, 4, 4));
        assert!(!union.constant_spacing());
        for (range, a_range) in union.ranges().iter().zip(a.ranges()) {
            assert!(a_range.contains(range.min) && a_range.contains(range.max));
        }
    }

    #[test]
    fn union_keeps_constant_flag_for_even_extent() {
        let (a, b) = (cube(5, 1.0), cube(3, 1.0));
        let union = Reconciler::blank_from_union(&a, &b, &spacing(1.0, 2.0, 2.0)).unwrap();
        assert_eq!(union.y_coords(), &[0.0, 2.0, 4.0]);
        assert!(union.constant_spacing());
    }

    #[test]
    fn union_rejects_bad_spacing() {
        let a = cube(2, 1.0);
        assert!(matches!(
            Reconciler::blank_from_union(&a, &a, &spacing(1.0, -1.0, 1.0)),
            Err(GridError::InvalidSpacing(_))
        ));
    }

    #[test]
    fn subtract_writes_percent_difference() {
        let a = cube(3, 50.0).with_scaling(2.0);
        let b = cube(3, 95.0);

        let diff = Reconciler::subtract(&a, &b, &spacing(1.0, 1.0, 1.0)).unwrap();
        assert!(diff.data().iter().all(|&v| (v - 5.0).abs() < 1e-12));
        assert_relative_eq!(diff.min_voxel(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(diff.max_voxel(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn subtract_tracks_extremes_over_union() {
        let a = VoxelGrid::uniform(Point3::zeros(), spacing(1.0, 1.0, 1.0), (2, 1, 1), 10.0)
            .unwrap()
            .with_edge_mode(EdgeMode::Zero);
        let b = VoxelGrid::uniform(spacing(1.0, 0.0, 0.0), spacing(1.0, 1.0, 1.0), (2, 1, 1), 4.0)
            .unwrap()
            .with_edge_mode(EdgeMode::Zero);

        let diff = Reconciler::subtract(&a, &b, &spacing(1.0, 1.0, 1.0)).unwrap();
        // x = 0: only a, x = 1: both, x = 2: only b
        let values: Vec<f64> = diff.data().iter().copied().collect();
        assert_eq!(values.len(), 3);
        assert_relative_eq!(values[0], 100.0);
        assert_relative_eq!(values[1], 60.0);
        assert_relative_eq!(values[2], -40.0);
        assert_relative_eq!(diff.min_voxel(), -40.0);
        assert_relative_eq!(diff.max_voxel(), 100.0);
    }

    #[test]
    fn subtract_rejects_zero_reference() {
        let a = cube(2, 0.0);
        assert!(matches!(
            Reconciler::subtract(&a, &a, &spacing(1.0, 1.0, 1.0)),
            Err(GridError::ZeroMaximum)
        ));
    }
}
