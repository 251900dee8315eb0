//! # Dose gamma library
//!
//! This crate computes the gamma index, the standard radiotherapy quality
//! assurance metric for comparing a reference and an evaluated 3D dose
//! distribution. Every voxel is scored by combining a dose difference
//! criterion with a distance-to-agreement criterion:
//!
//! ```text
//! gamma = min over offsets d of sqrt( (D_ref(r) - D_eval(r + d))^2 / dD^2 + |d|^2 / dr^2 )
//! ```
//!
//! The dose criterion is global, i.e. a percentage of the reference maximum
//! dose. Candidate offsets are precomputed once per run and sorted by
//! distance, which lets the search stop as soon as the distance term alone
//! exceeds the best gamma found. Voxels are evaluated in parallel using
//! rayon.
//!
//! Grids are accessed through the [`DoseGrid`] trait. [`VoxelGrid`] is the
//! rectilinear implementation, with trilinear sampling on possibly
//! non-uniform axes. Two grids with different sampling can be compared on a
//! common geometry covering both, see [`OutputGeometry::Union`].
//!
//! # Examples
//!
//! ## Comparing two dose grids
//!
//! ```
//! # use dose_gamma::{GammaEvaluator, GammaParams, NoProgress, Point3, VoxelGrid};
//! let spacing = Point3::new(1.0, 1.0, 1.0);
//! let reference = VoxelGrid::uniform(Point3::zeros(), spacing, (3, 3, 3), 100.0)
//!     .expect("should have built reference grid");
//! let evaluated = VoxelGrid::uniform(Point3::zeros(), spacing, (3, 3, 3), 97.0)
//!     .expect("should have built evaluated grid");
//!
//! let evaluator = GammaEvaluator::new(GammaParams::new(3.0, 3.0, 10.0))
//!     .expect("criteria should be valid");
//! let result = evaluator
//!     .evaluate(&reference, &evaluated, &mut NoProgress)
//!     .expect("should have evaluated gamma");
//! assert!((result.max_gamma() - 1.0).abs() < 1e-9);
//! ```

pub mod enums;
pub mod gamma;
pub mod geometry;
pub mod grid;
mod interpolator;
pub mod offsets;
pub mod params;
pub mod reconcile;
pub mod vector_field;

pub use enums::{EdgeMode, Interpolation, OutputGeometry};
pub use gamma::{
    EXCLUDED, GammaError, GammaEvaluator, GammaResult, GammaSearch, NoProgress, ProgressSink,
    VoxelGamma, gamma_squared,
};
pub use geometry::{Point3, Range};
pub use grid::{DoseGrid, GridError, Voxel, VoxelGrid};
pub use offsets::{Offset, OffsetTable};
pub use params::GammaParams;
pub use reconcile::Reconciler;
pub use vector_field::VectorField;
