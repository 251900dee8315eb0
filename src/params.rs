//! Parameters for gamma evaluation.

use crate::enums::OutputGeometry;
use crate::gamma::GammaError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Gamma evaluation criteria.
///
/// # Example
///
/// ```
/// use dose_gamma::GammaParams;
///
/// // 3 mm / 3 % with a 10 % low-dose cut-off
/// let params = GammaParams::default();
/// assert!((params.distance_tolerance - 3.0).abs() < 1e-10);
///
/// let strict = GammaParams::strict().threshold(20.0);
/// assert!((strict.dose_tolerance - 2.0).abs() < 1e-10);
/// assert!(strict.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GammaParams {
    /// Distance-to-agreement criterion in mm.
    pub distance_tolerance: f64,

    /// Dose difference criterion, in percent of the reference maximum dose.
    pub dose_tolerance: f64,

    /// Low-dose cut-off, in percent of the reference maximum dose. Voxels
    /// below it in both grids are marked with [`crate::EXCLUDED`].
    pub threshold: f64,

    /// Geometry of the output grids.
    pub output_geometry: OutputGeometry,

    /// Also estimate the Jacobian determinant of the displacement field.
    pub compute_jacobian: bool,
}

impl Default for GammaParams {
    fn default() -> Self {
        Self {
            distance_tolerance: 3.0,
            dose_tolerance: 3.0,
            threshold: 10.0,
            output_geometry: OutputGeometry::Reference,
            compute_jacobian: false,
        }
    }
}

impl GammaParams {
    #[must_use]
    pub fn new(distance_tolerance: f64, dose_tolerance: f64, threshold: f64) -> Self {
        Self {
            distance_tolerance,
            dose_tolerance,
            threshold,
            ..Self::default()
        }
    }

    /// 2 mm / 2 % criteria.
    #[must_use]
    pub fn strict() -> Self {
        Self::new(2.0, 2.0, 10.0)
    }

    #[must_use]
    pub fn distance_tolerance(mut self, mm: f64) -> Self {
        self.distance_tolerance = mm;
        self
    }

    #[must_use]
    pub fn dose_tolerance(mut self, percent: f64) -> Self {
        self.dose_tolerance = percent;
        self
    }

    #[must_use]
    pub fn threshold(mut self, percent: f64) -> Self {
        self.threshold = percent;
        self
    }

    #[must_use]
    pub fn output_geometry(mut self, geometry: OutputGeometry) -> Self {
        self.output_geometry = geometry;
        self
    }

    #[must_use]
    pub fn compute_jacobian(mut self, enabled: bool) -> Self {
        self.compute_jacobian = enabled;
        self
    }

    /// Check that the criteria describe a meaningful evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`GammaError::InvalidParams`] for non-positive or non-finite
    /// tolerances, a negative threshold, or a non-positive union spacing.
    pub fn validate(&self) -> Result<(), GammaError> {
        if !(self.distance_tolerance.is_finite() && self.distance_tolerance > 0.0) {
            return Err(GammaError::invalid_params(format!(
                "distance tolerance must be positive, got {}",
                self.distance_tolerance
            )));
        }
        if !(self.dose_tolerance.is_finite() && self.dose_tolerance > 0.0) {
            return Err(GammaError::invalid_params(format!(
                "dose tolerance must be positive, got {}",
                self.dose_tolerance
            )));
        }
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(GammaError::invalid_params(format!(
                "threshold must be zero or positive, got {}",
                self.threshold
            )));
        }
        if let OutputGeometry::Union { spacing } = self.output_geometry {
            if !spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
                return Err(GammaError::invalid_params(format!(
                    "union spacing must be positive, got ({}, {}, {})",
                    spacing.x, spacing.y, spacing.z
                )));
            }
        }
        Ok(())
    }
}
