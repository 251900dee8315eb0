//! Gamma index evaluation.
//!
//! For every output voxel the evaluator walks a distance-sorted table of
//! displacements, looking for the point in the evaluated distribution that
//! best agrees with the reference dose. The walk stops as soon as the
//! distance term alone exceeds the best gamma found so far.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::enums::OutputGeometry;
use crate::geometry::Point3;
use crate::grid::{DoseGrid, GridError, VoxelGrid, position_in};
use crate::offsets::OffsetTable;
use crate::params::GammaParams;
use crate::reconcile::Reconciler;
use crate::vector_field::VectorField;

/// Gamma value written to voxels below the dose threshold
pub const EXCLUDED: f64 = -1.0;

/// Number of progress notifications over a full run
const PROGRESS_STEPS: usize = 20;

#[derive(Debug, Error)]
pub enum GammaError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Reference maximum dose must be positive")]
    ZeroReferenceDose,

    #[error("Gamma evaluation was cancelled")]
    Cancelled,

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
}

impl GammaError {
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::InvalidParams(details.into())
    }
}

/// Receives integer completion percentages, non-decreasing, in `0..=100`.
///
/// Called on the thread that runs [`GammaEvaluator::evaluate`].
pub trait ProgressSink {
    fn report(&mut self, percent: u8);
}

impl<F: FnMut(u8)> ProgressSink for F {
    fn report(&mut self, percent: u8) {
        self(percent);
    }
}

/// Sink that discards progress
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: u8) {}
}

/// Gamma squared from squared dose difference and squared distance
#[inline]
pub fn gamma_squared(
    dose_diff_squared: f64,
    distance_squared: f64,
    dose_tolerance_squared: f64,
    distance_tolerance_squared: f64,
) -> f64 {
    dose_diff_squared / dose_tolerance_squared + distance_squared / distance_tolerance_squared
}

/// Outcome of the search at a single voxel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoxelGamma {
    /// Both doses below the threshold
    Excluded,
    Evaluated { gamma: f64, displacement: Point3 },
}

/// Per-voxel search over an offset table, with absolute criteria resolved.
pub struct GammaSearch<'a, R: DoseGrid, E: DoseGrid> {
    reference: &'a R,
    evaluated: &'a E,
    offsets: &'a OffsetTable,
    threshold_dose: f64,
    dose_tolerance_squared: f64,
    distance_tolerance_squared: f64,
}

impl<'a, R: DoseGrid, E: DoseGrid> GammaSearch<'a, R, E> {
    /// Resolve the percentage criteria in `params` against the reference maximum dose.
    ///
    /// # Errors
    ///
    /// Returns [`GammaError::ZeroReferenceDose`] if the reference maximum
    /// scaled dose is not positive.
    pub fn new(
        reference: &'a R,
        evaluated: &'a E,
        offsets: &'a OffsetTable,
        params: &GammaParams,
    ) -> Result<Self, GammaError> {
        let max_dose = reference.max_dose();
        if !(max_dose.is_finite() && max_dose > 0.0) {
            return Err(GammaError::ZeroReferenceDose);
        }

        // Global gamma: dose criterion relative to the reference maximum
        let dose_tolerance = params.dose_tolerance / 100.0 * max_dose;

        Ok(Self {
            reference,
            evaluated,
            offsets,
            threshold_dose: params.threshold / 100.0 * max_dose,
            dose_tolerance_squared: dose_tolerance * dose_tolerance,
            distance_tolerance_squared: params.distance_tolerance * params.distance_tolerance,
        })
    }

    fn doses(&self, position: &Point3) -> Option<(f64, f64)> {
        let reference_dose = self.reference.dose_at(position);
        let evaluated_dose = self.evaluated.dose_at(position);
        if reference_dose < self.threshold_dose && evaluated_dose < self.threshold_dose {
            return None;
        }
        Some((reference_dose, evaluated_dose))
    }

    fn gamma_squared_at(
        &self,
        reference_dose: f64,
        position: &Point3,
        distance_squared: f64,
    ) -> f64 {
        let dose_diff = reference_dose - self.evaluated.dose_at(position);
        gamma_squared(
            dose_diff * dose_diff,
            distance_squared,
            self.dose_tolerance_squared,
            self.distance_tolerance_squared,
        )
    }

    /// Minimal gamma at `position`, stopping once the distance term alone
    /// exceeds the best value found.
    pub fn evaluate_at(&self, position: &Point3) -> VoxelGamma {
        let Some((reference_dose, evaluated_dose)) = self.doses(position) else {
            return VoxelGamma::Excluded;
        };

        let dose_diff = reference_dose - evaluated_dose;
        let mut min_gamma_squared = gamma_squared(
            dose_diff * dose_diff,
            0.0,
            self.dose_tolerance_squared,
            self.distance_tolerance_squared,
        );
        let mut best = Point3::zeros();
        let mut last_distance_squared = 0.0;

        for offset in self.offsets.search_offsets() {
            let distance_squared = offset.distance_squared;
            if min_gamma_squared < distance_squared / self.distance_tolerance_squared
                && distance_squared >= last_distance_squared
            {
                break;
            }

            let candidate = self.gamma_squared_at(
                reference_dose,
                &(position + offset.displacement),
                distance_squared,
            );
            if candidate < min_gamma_squared {
                min_gamma_squared = candidate;
                best = offset.displacement;
            }
            last_distance_squared = distance_squared;
        }

        VoxelGamma::Evaluated {
            gamma: min_gamma_squared.sqrt(),
            displacement: best,
        }
    }

    /// Minimal gamma at `position` over the whole offset table, without
    /// early termination.
    pub fn evaluate_exhaustive_at(&self, position: &Point3) -> VoxelGamma {
        let Some((reference_dose, _)) = self.doses(position) else {
            return VoxelGamma::Excluded;
        };

        let (min_gamma_squared, best) = self
            .offsets
            .offsets()
            .iter()
            .map(|offset| {
                let candidate = self.gamma_squared_at(
                    reference_dose,
                    &(position + offset.displacement),
                    offset.distance_squared,
                );
                (candidate, offset.displacement)
            })
            .fold((f64::INFINITY, Point3::zeros()), |acc, item| {
                if item.0 < acc.0 { item } else { acc }
            });

        VoxelGamma::Evaluated {
            gamma: min_gamma_squared.sqrt(),
            displacement: best,
        }
    }
}

/// Gamma grid plus the displacement that produced each value
#[derive(Debug, Clone)]
pub struct GammaResult {
    /// Gamma per voxel, [`EXCLUDED`] below the threshold
    pub gamma: VoxelGrid,
    pub vectors: VectorField,
    pub jacobian: Option<VoxelGrid>,
    pub evaluated_count: usize,
    pub excluded_count: usize,
    pub passed_count: usize,
}

impl GammaResult {
    /// Fraction of evaluated voxels with gamma <= 1, `None` if every voxel was excluded.
    pub fn pass_rate(&self) -> Option<f64> {
        (self.evaluated_count > 0).then(|| self.passed_count as f64 / self.evaluated_count as f64)
    }

    pub fn min_gamma(&self) -> f64 {
        self.gamma.min_voxel()
    }

    pub fn max_gamma(&self) -> f64 {
        self.gamma.max_voxel()
    }
}

pub struct GammaEvaluator {
    params: GammaParams,
    cancel: Option<Arc<AtomicBool>>,
}

impl GammaEvaluator {
    /// # Errors
    ///
    /// Returns [`GammaError::InvalidParams`] if `params` fail validation.
    pub fn new(params: GammaParams) -> Result<Self, GammaError> {
        params.validate()?;
        Ok(Self {
            params,
            cancel: None,
        })
    }

    /// Stop between voxel batches once `flag` is set.
    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn params(&self) -> &GammaParams {
        &self.params
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Compare `evaluated` against `reference`.
    ///
    /// Voxels are processed in parallel batches of roughly 5 % of the grid,
    /// each written straight into the output grids. Progress and cancellation
    /// are handled between batches.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference maximum dose is not positive, the
    /// union geometry cannot be built, or the run is cancelled.
    pub fn evaluate(
        &self,
        reference: &impl DoseGrid,
        evaluated: &impl DoseGrid,
        progress: &mut impl ProgressSink,
    ) -> Result<GammaResult, GammaError> {
        let mut gamma = match self.params.output_geometry {
            OutputGeometry::Reference => Reconciler::blank_from(reference),
            OutputGeometry::Union { spacing } => {
                Reconciler::blank_from_union(reference, evaluated, &spacing)?
            }
        };
        let mut vectors = VectorField::blank_from(&gamma);

        let offsets = OffsetTable::for_tolerance(self.params.distance_tolerance, &gamma.spacing());
        let search = GammaSearch::new(reference, evaluated, &offsets, &self.params)?;

        let total = gamma.number_of_voxels();
        info!(
            voxels = total,
            distance_tolerance = self.params.distance_tolerance,
            dose_tolerance = self.params.dose_tolerance,
            threshold = self.params.threshold,
            offsets = offsets.len(),
            "Starting gamma evaluation"
        );

        let [xs, ys, zs] = gamma.axes().map(<[f64]>::to_vec);
        let axes = [xs.as_slice(), ys.as_slice(), zs.as_slice()];
        let gamma_values = gamma.values_mut();
        let dx = vectors.x.values_mut();
        let dy = vectors.y.values_mut();
        let dz = vectors.z.values_mut();

        if total > 0 {
            let batch = total.div_ceil(PROGRESS_STEPS).max(1);
            let mut done = 0;
            while done < total {
                if self.is_cancelled() {
                    debug!(done, total, "Gamma evaluation cancelled");
                    return Err(GammaError::Cancelled);
                }
                let end = (done + batch).min(total);
                gamma_values[done..end]
                    .par_iter_mut()
                    .zip(dx[done..end].par_iter_mut())
                    .zip(dy[done..end].par_iter_mut())
                    .zip(dz[done..end].par_iter_mut())
                    .enumerate()
                    .for_each(|(offset, (((g, x), y), z))| {
                        let position = position_in(axes, done + offset);
                        match search.evaluate_at(&position) {
                            VoxelGamma::Excluded => *g = EXCLUDED,
                            VoxelGamma::Evaluated {
                                gamma: value,
                                displacement,
                            } => {
                                *g = value;
                                *x = displacement.x;
                                *y = displacement.y;
                                *z = displacement.z;
                            }
                        }
                    });
                done = end;
                progress.report((100 * done / total) as u8);
            }
        }

        let (min, max, evaluated_count, passed_count) = gamma
            .data()
            .iter()
            .filter(|&&value| value != EXCLUDED)
            .fold(
                (f64::INFINITY, f64::NEG_INFINITY, 0, 0),
                |(min, max, evaluated, passed), &value| {
                    (
                        min.min(value),
                        max.max(value),
                        evaluated + 1,
                        passed + usize::from(value <= 1.0),
                    )
                },
            );
        if evaluated_count > 0 && min <= max {
            gamma.set_extremes(min, max);
        }

        let excluded_count = total - evaluated_count;
        if evaluated_count == 0 {
            warn!(
                voxels = total,
                "No voxel above the dose threshold, gamma grid is fully excluded"
            );
        } else {
            info!(
                evaluated = evaluated_count,
                excluded = excluded_count,
                pass_rate = format!("{:.2}%", 100.0 * passed_count as f64 / evaluated_count as f64),
                min_gamma = min,
                max_gamma = max,
                "Gamma evaluation complete"
            );
        }

        let jacobian = self.params.compute_jacobian.then(|| vectors.jacobian());

        Ok(GammaResult {
            gamma,
            vectors,
            jacobian,
            evaluated_count,
            excluded_count,
            passed_count,
        })
    }
}
