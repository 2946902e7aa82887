//! Core statistical operations and traits
//!
//! Time means of model fields and the percentile bounds used for colour scales.

use crate::errors::{FilterMapsError, Result};
use ndarray::{Array, Array2, Array3, ArrayBase, Data, Dimension, RemoveAxis};
use rayon::prelude::*;

/// Percentile of |value| that saturates every colour scale
pub const COLOR_PERCENTILE: f64 = 99.9;

/// Trait for types that can perform statistical reductions along an axis
pub trait StatisticalReduction<T> {
    /// Array left after removing the reduced axis
    type Reduced;

    /// Mean of the finite samples along the specified axis
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is out of bounds for the array.
    fn mean_along_axis(&self, axis: usize) -> Result<Self::Reduced>;
}

impl<S, D> StatisticalReduction<f64> for ArrayBase<S, D>
where
    S: Data<Elem = f64>,
    D: Dimension + RemoveAxis,
{
    type Reduced = Array<f64, D::Smaller>;

    fn mean_along_axis(&self, axis: usize) -> Result<Self::Reduced> {
        super::parallel::parallel_mean_axis(self.view(), axis)
    }
}

/// Mean over the time axis of a `[time, lat, lon]` field.
///
/// Missing (NaN) samples are skipped; a point missing at every time is NaN.
pub fn time_mean_at_level(field: &Array3<f64>) -> Result<Array2<f64>> {
    field.mean_along_axis(0)
}

/// True when at least one finite value is non-zero
pub fn has_nonzero(values: &Array2<f64>) -> bool {
    values.iter().any(|v| v.is_finite() && *v != 0.0)
}

/// `q`-th percentile (0..=100) of the absolute finite values.
///
/// Linear interpolation between closest ranks. `None` when no finite value exists.
pub fn abs_percentile<'a, I>(values: I, q: f64) -> Option<f64>
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut magnitudes: Vec<f64> = values
        .into_iter()
        .filter(|v| v.is_finite())
        .map(|v| v.abs())
        .collect();
    if magnitudes.is_empty() {
        return None;
    }
    magnitudes.par_sort_unstable_by(f64::total_cmp);

    let q = q.clamp(0.0, 100.0);
    let position = q / 100.0 * (magnitudes.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(magnitudes[lower] + (magnitudes[upper] - magnitudes[lower]) * fraction)
}

/// [`abs_percentile`] at [`COLOR_PERCENTILE`], failing when nothing is finite
pub fn color_bound(values: &Array2<f64>, name: &str) -> Result<f64> {
    abs_percentile(values.iter(), COLOR_PERCENTILE).ok_or_else(|| {
        FilterMapsError::StatisticsError(format!(
            "'{}' has no finite values to scale the colour map",
            name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn time_mean_uses_first_axis() {
        let field = Array3::from_shape_vec(
            (2, 2, 2),
            vec![1.0, 2.0, 3.0, 4.0, 3.0, 4.0, 5.0, f64::NAN],
        )
        .unwrap();
        let mean = time_mean_at_level(&field).unwrap();
        assert_eq!(mean, array![[2.0, 3.0], [4.0, 4.0]]);
    }

    #[test]
    fn zero_and_nan_fields_have_no_signal() {
        assert!(!has_nonzero(&array![[0.0, f64::NAN], [0.0, 0.0]]));
        assert!(has_nonzero(&array![[0.0, -1e-20], [0.0, 0.0]]));
    }

    #[test]
    fn percentile_interpolates_like_numpy() {
        let values: Vec<f64> = (1..=5).map(|v| -(v as f64)).collect();
        assert_eq!(abs_percentile(values.iter(), 50.0), Some(3.0));
        assert_eq!(abs_percentile(values.iter(), 100.0), Some(5.0));
        assert_eq!(abs_percentile(values.iter(), 0.0), Some(1.0));
        // position 0.999 * 4 = 3.996
        let p = abs_percentile(values.iter(), 99.9).unwrap();
        assert!((p - 4.996).abs() < 1e-12);
    }

    #[test]
    fn percentile_skips_missing() {
        let values = [f64::NAN, 2.0, f64::INFINITY];
        assert_eq!(abs_percentile(values.iter(), 99.9), Some(2.0));
        assert_eq!(abs_percentile([f64::NAN].iter(), 50.0), None);
    }

    #[test]
    fn color_bound_requires_data() {
        let empty = array![[f64::NAN]];
        assert!(color_bound(&empty, "fine_vort_r").is_err());
    }
}
