//! Parallel computation implementations for statistical operations

use crate::errors::Result;
use ndarray::{Array, ArrayView, Axis, Dimension, RemoveAxis, Zip};

/// Computes the mean along an axis, skipping NaN and infinite samples.
///
/// Output points with no finite sample are NaN.
///
/// # Errors
///
/// Returns an error if the axis is out of bounds.
pub fn parallel_mean_axis<D>(
    data: ArrayView<'_, f64, D>,
    axis: usize,
) -> Result<Array<f64, D::Smaller>>
where
    D: Dimension + RemoveAxis,
{
    check_axis(data.ndim(), axis)?;

    let mut result = Array::<f64, D::Smaller>::zeros(data.raw_dim().remove_axis(Axis(axis)));
    Zip::from(&mut result)
        .and(data.lanes(Axis(axis)))
        .par_for_each(|out, lane| {
            let (sum, count) = lane
                .iter()
                .filter(|v| v.is_finite())
                .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v, count + 1));
            *out = if count > 0 {
                sum / count as f64
            } else {
                f64::NAN
            };
        });

    Ok(result)
}

fn check_axis(ndim: usize, axis: usize) -> Result<()> {
    if axis >= ndim {
        return Err(crate::errors::FilterMapsError::StatisticsError(format!(
            "Axis {axis} is out of bounds for array with {ndim} dimensions"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, IxDyn};

    #[test]
    fn mean_skips_nan() {
        let data = array![[1.0, f64::NAN], [3.0, f64::NAN]].into_dyn();
        let mean = parallel_mean_axis(data.view(), 0).unwrap();
        assert_eq!(mean.shape(), &[2]);
        assert_eq!(mean[IxDyn(&[0])], 2.0);
        assert!(mean[IxDyn(&[1])].is_nan());
    }

    #[test]
    fn axis_out_of_bounds() {
        let data = array![1.0, 2.0].into_dyn();
        assert!(parallel_mean_axis(data.view(), 1).is_err());
    }

    #[test]
    fn mean_of_a_view_keeps_static_dimension() {
        let data = ndarray::Array3::from_shape_fn((3, 2, 2), |(t, j, i)| (t + j + i) as f64);
        let middle = data.slice(ndarray::s![.., .., 1..]);
        let mean: ndarray::Array2<f64> = parallel_mean_axis(middle, 0).unwrap();
        assert_eq!(mean, array![[2.0], [3.0]]);
    }
}
