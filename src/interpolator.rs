//! Axis bracketing and trilinear or nearest-neighbour sampling.

use ndarray::Array3;

use crate::enums::{EdgeMode, Interpolation};
use crate::geometry::Point3;

/// Lower bracketing index and fractional position of `value` on an ascending axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bracket {
    pub lower: usize,
    pub upper: usize,
    pub fraction: f64,
}

pub(crate) struct Interpolator;

impl Interpolator {
    /// Locate `value` on an ascending, possibly non-uniform axis.
    ///
    /// Returns `None` when the axis is empty, or when `value` lies outside the
    /// axis and `edge` is [`EdgeMode::Zero`].
    pub(crate) fn bracket(axis: &[f64], value: f64, edge: EdgeMode) -> Option<Bracket> {
        let (&first, &last) = (axis.first()?, axis.last()?);

        if value < first || value > last || value.is_nan() {
            if edge == EdgeMode::Zero {
                return None;
            }
            let index = if value > last { axis.len() - 1 } else { 0 };
            return Some(Bracket {
                lower: index,
                upper: index,
                fraction: 0.0,
            });
        }

        // First coordinate strictly greater than value
        let upper = axis.partition_point(|&c| c <= value).min(axis.len() - 1);
        let lower = upper.saturating_sub(1);
        if lower == upper {
            return Some(Bracket {
                lower,
                upper,
                fraction: 0.0,
            });
        }

        let width = axis[upper] - axis[lower];
        let fraction = ((value - axis[lower]) / width).clamp(0.0, 1.0);
        Some(Bracket {
            lower,
            upper,
            fraction,
        })
    }

    /// Sample `data` (indexed `[z, y, x]`) at a point in patient coordinates.
    pub(crate) fn sample(
        data: &Array3<f64>,
        axes: [&[f64]; 3],
        point: &Point3,
        edge: EdgeMode,
        interpolation: Interpolation,
    ) -> f64 {
        let [x_axis, y_axis, z_axis] = axes;
        let (Some(bx), Some(by), Some(bz)) = (
            Self::bracket(x_axis, point.x, edge),
            Self::bracket(y_axis, point.y, edge),
            Self::bracket(z_axis, point.z, edge),
        ) else {
            return 0.0;
        };

        match interpolation {
            Interpolation::Trilinear => Self::trilinear_interpolate(data, bx, by, bz),
            Interpolation::Nearest => {
                let pick = |b: Bracket| if b.fraction < 0.5 { b.lower } else { b.upper };
                data[[pick(bz), pick(by), pick(bx)]]
            }
        }
    }

    #[inline]
    fn trilinear_interpolate(data: &Array3<f64>, bx: Bracket, by: Bracket, bz: Bracket) -> f64 {
        let (dx, dy, dz) = (bx.fraction, by.fraction, bz.fraction);

        let lerp = |a: f64, b: f64, t: f64| a.mul_add(1.0 - t, b * t);

        let c00 = lerp(
            data[[bz.lower, by.lower, bx.lower]],
            data[[bz.lower, by.lower, bx.upper]],
            dx,
        );
        let c01 = lerp(
            data[[bz.lower, by.upper, bx.lower]],
            data[[bz.lower, by.upper, bx.upper]],
            dx,
        );
        let c10 = lerp(
            data[[bz.upper, by.lower, bx.lower]],
            data[[bz.upper, by.lower, bx.upper]],
            dx,
        );
        let c11 = lerp(
            data[[bz.upper, by.upper, bx.lower]],
            data[[bz.upper, by.upper, bx.upper]],
            dx,
        );

        let c0 = lerp(c00, c01, dy);
        let c1 = lerp(c10, c11, dy);

        lerp(c0, c1, dz)
    }
}
