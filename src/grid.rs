//! Dose grids on rectilinear axes.

use crate::enums::{EdgeMode, Interpolation};
use crate::geometry::{Point3, Range};
use crate::interpolator::Interpolator;

use ndarray::Array3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("Coordinate axis {axis} is empty")]
    EmptyAxis { axis: char },

    #[error("Coordinate axis {axis} is not strictly ascending")]
    NonAscendingAxis { axis: char },

    #[error("Data length {actual} does not match axis product {expected}")]
    DataLengthMismatch { expected: usize, actual: usize },

    #[error("Grid spacing must be positive and finite, got {0:?}")]
    InvalidSpacing([f64; 3]),

    #[error("Grid maximum scaled dose is zero")]
    ZeroMaximum,
}

/// Read-only view of a dose distribution.
///
/// The gamma evaluator only ever talks to grids through this trait, so test
/// doubles and alternative storage can stand in for [`VoxelGrid`].
pub trait DoseGrid: Sync {
    /// Raw (unscaled) value at an arbitrary point.
    fn sample(&self, point: &Point3) -> f64;

    /// Largest raw voxel value.
    fn max_value(&self) -> f64;

    /// Multiplier turning raw values into physical dose.
    fn scaling(&self) -> f64;

    /// Ascending coordinate axes `[x, y, z]`.
    fn axes(&self) -> [&[f64]; 3];

    /// Nominal voxel spacing.
    fn spacing(&self) -> Point3;

    fn constant_spacing(&self) -> bool {
        true
    }

    fn dose_at(&self, point: &Point3) -> f64 {
        self.sample(point) * self.scaling()
    }

    fn max_dose(&self) -> f64 {
        self.max_value() * self.scaling()
    }

    fn ranges(&self) -> [Range; 3] {
        self.axes().map(Range::of_axis)
    }

    fn number_of_voxels(&self) -> usize {
        self.axes().iter().map(|axis| axis.len()).product()
    }
}

/// A sampled point of a grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel {
    pub position: Point3,
    pub value: f64,
}

/// Rectilinear dose grid with possibly non-uniform, strictly ascending axes.
///
/// Data is stored `[z, y, x]` so that x varies fastest in the flat buffer.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    x_coords: Vec<f64>,
    y_coords: Vec<f64>,
    z_coords: Vec<f64>,
    data: Array3<f64>,
    scaling: f64,
    min_voxel: f64,
    max_voxel: f64,
    spacing: Point3,
    constant_spacing: bool,
    edge_mode: EdgeMode,
    interpolation: Interpolation,
}

impl VoxelGrid {
    /// Build a grid from its axes and a flat data buffer (x fastest, then y, then z).
    ///
    /// # Errors
    ///
    /// Returns an error if an axis is empty or not strictly ascending, or the
    /// buffer length differs from the product of the axis lengths.
    pub fn new(
        x_coords: Vec<f64>,
        y_coords: Vec<f64>,
        z_coords: Vec<f64>,
        data: Vec<f64>,
    ) -> Result<Self, GridError> {
        for (axis, coords) in [('x', &x_coords), ('y', &y_coords), ('z', &z_coords)] {
            Self::validate_axis(axis, coords)?;
        }

        let shape = (z_coords.len(), y_coords.len(), x_coords.len());
        let expected = shape.0 * shape.1 * shape.2;
        let actual = data.len();
        if actual != expected {
            return Err(GridError::DataLengthMismatch { expected, actual });
        }
        let data = Array3::from_shape_vec(shape, data)
            .map_err(|_| GridError::DataLengthMismatch { expected, actual })?;

        let (spacing, constant_spacing) =
            Self::nominal_spacing([&x_coords, &y_coords, &z_coords]);
        let (min_voxel, max_voxel) = Self::extremes(&data);

        Ok(Self {
            x_coords,
            y_coords,
            z_coords,
            data,
            scaling: 1.0,
            min_voxel,
            max_voxel,
            spacing,
            constant_spacing,
            edge_mode: EdgeMode::default(),
            interpolation: Interpolation::default(),
        })
    }

    /// Evenly spaced grid of `dims` voxels (x, y, z) starting at `origin`, filled by `f`.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension is zero or the spacing is not positive.
    pub fn from_fn(
        origin: Point3,
        spacing: Point3,
        dims: (usize, usize, usize),
        f: impl Fn(&Point3) -> f64,
    ) -> Result<Self, GridError> {
        Self::validate_spacing(&spacing)?;
        let x_coords = Self::linear_axis(origin.x, spacing.x, dims.0);
        let y_coords = Self::linear_axis(origin.y, spacing.y, dims.1);
        let z_coords = Self::linear_axis(origin.z, spacing.z, dims.2);

        let mut data = Vec::with_capacity(dims.0 * dims.1 * dims.2);
        for &z in &z_coords {
            for &y in &y_coords {
                for &x in &x_coords {
                    data.push(f(&Point3::new(x, y, z)));
                }
            }
        }

        let mut grid = Self::new(x_coords, y_coords, z_coords, data)?;
        grid.spacing = spacing;
        grid.constant_spacing = true;
        Ok(grid)
    }

    /// Evenly spaced grid holding `fill` everywhere.
    pub fn uniform(
        origin: Point3,
        spacing: Point3,
        dims: (usize, usize, usize),
        fill: f64,
    ) -> Result<Self, GridError> {
        Self::from_fn(origin, spacing, dims, |_| fill)
    }

    /// Zero-filled grid with the given axes; scaling 1.
    pub(crate) fn blank(
        x_coords: Vec<f64>,
        y_coords: Vec<f64>,
        z_coords: Vec<f64>,
        spacing: Point3,
        constant_spacing: bool,
    ) -> Self {
        let data = Array3::zeros((z_coords.len(), y_coords.len(), x_coords.len()));
        Self {
            x_coords,
            y_coords,
            z_coords,
            data,
            scaling: 1.0,
            min_voxel: 0.0,
            max_voxel: 0.0,
            spacing,
            constant_spacing,
            edge_mode: EdgeMode::default(),
            interpolation: Interpolation::default(),
        }
    }

    #[must_use]
    pub fn with_scaling(mut self, scaling: f64) -> Self {
        self.scaling = scaling;
        self
    }

    #[must_use]
    pub fn with_edge_mode(mut self, edge_mode: EdgeMode) -> Self {
        self.edge_mode = edge_mode;
        self
    }

    #[must_use]
    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Get the dimensions of the grid (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data, indexed `[z, y, x]`
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Array3<f64> {
        &mut self.data
    }

    /// Values in memory order, x fastest.
    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        // Always standard layout, built by `from_shape_vec` or `zeros`
        self.data.as_slice_mut().unwrap_or_default()
    }

    pub fn x_coords(&self) -> &[f64] {
        &self.x_coords
    }

    pub fn y_coords(&self) -> &[f64] {
        &self.y_coords
    }

    pub fn z_coords(&self) -> &[f64] {
        &self.z_coords
    }

    pub fn min_voxel(&self) -> f64 {
        self.min_voxel
    }

    pub fn max_voxel(&self) -> f64 {
        self.max_voxel
    }

    pub fn edge_mode(&self) -> EdgeMode {
        self.edge_mode
    }

    pub(crate) fn set_extremes(&mut self, min: f64, max: f64) {
        self.min_voxel = min;
        self.max_voxel = max;
    }

    /// Raw value at integer indices `(x, y, z)`
    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f64> {
        self.data.get([k, j, i]).copied()
    }

    /// Position of the voxel at flat index `index` (x fastest).
    pub fn position_of(&self, index: usize) -> Point3 {
        position_in([&self.x_coords, &self.y_coords, &self.z_coords], index)
    }

    /// Iterate all voxels, x fastest.
    pub fn voxels(&self) -> impl Iterator<Item = Voxel> + '_ {
        self.data
            .iter()
            .enumerate()
            .map(|(index, &value)| Voxel {
                position: self.position_of(index),
                value,
            })
    }

    pub(crate) fn linear_axis(start: f64, step: f64, len: usize) -> Vec<f64> {
        (0..len).map(|i| start + i as f64 * step).collect()
    }

    pub(crate) fn validate_spacing(spacing: &Point3) -> Result<(), GridError> {
        if spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
            Ok(())
        } else {
            Err(GridError::InvalidSpacing([spacing.x, spacing.y, spacing.z]))
        }
    }

    fn validate_axis(axis: char, coords: &[f64]) -> Result<(), GridError> {
        if coords.is_empty() {
            return Err(GridError::EmptyAxis { axis });
        }
        if coords.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(GridError::NonAscendingAxis { axis });
        }
        Ok(())
    }

    fn nominal_spacing(axes: [&[f64]; 3]) -> (Point3, bool) {
        let mut constant = true;
        let steps = axes.map(|coords| {
            let Some(step) = coords.windows(2).map(|w| w[1] - w[0]).next() else {
                return 1.0;
            };
            let tolerance = 1e-6 * step.abs().max(1.0);
            if coords
                .windows(2)
                .any(|w| ((w[1] - w[0]) - step).abs() > tolerance)
            {
                constant = false;
            }
            step
        });
        (Point3::new(steps[0], steps[1], steps[2]), constant)
    }

    fn extremes(data: &Array3<f64>) -> (f64, f64) {
        if data.is_empty() {
            return (0.0, 0.0);
        }
        data.iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}

impl DoseGrid for VoxelGrid {
    fn sample(&self, point: &Point3) -> f64 {
        Interpolator::sample(
            &self.data,
            self.axes(),
            point,
            self.edge_mode,
            self.interpolation,
        )
    }

    fn max_value(&self) -> f64 {
        self.max_voxel
    }

    fn scaling(&self) -> f64 {
        self.scaling
    }

    fn axes(&self) -> [&[f64]; 3] {
        [&self.x_coords, &self.y_coords, &self.z_coords]
    }

    fn spacing(&self) -> Point3 {
        self.spacing
    }

    fn constant_spacing(&self) -> bool {
        self.constant_spacing
    }
}

/// Position of the flat voxel `index` (x fastest) on the given axes.
pub(crate) fn position_in(axes: [&[f64]; 3], index: usize) -> Point3 {
    let [x, y, z] = axes;
    let i = index % x.len();
    let j = (index / x.len()) % y.len();
    let k = index / (x.len() * y.len());
    Point3::new(x[i], y[j], z[k])
}
