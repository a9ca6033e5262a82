//! Conversions of axis positions into `ndarray` arrays and common operations on them.

use ndarray::{Array, Array2, ArrayView, ArrayView1, Axis, Dimension, RemoveAxis};

use crate::ordered_map::Positions;

pub(crate) trait IntoNdarray2 {
    type Out;

    fn into_ndarray2(self) -> Self::Out;
}

impl IntoNdarray2 for &[Positions] {
    type Out = Array2<f64>;

    /// One row per set of positions, columns in key order.
    ///
    /// Rows shorter than the first are padded with `NaN`.
    fn into_ndarray2(self) -> Self::Out {
        let ncols = self.first().map_or(0, Positions::len);
        let mut arr = Array2::from_elem((self.len(), ncols), f64::NAN);
        for (mut row, positions) in arr.rows_mut().into_iter().zip(self) {
            for (cell, value) in row.iter_mut().zip(positions.values()) {
                *cell = *value;
            }
        }
        arr
    }
}

pub(crate) fn norm_axis<D, Di>(arr: ArrayView<f64, Di>, axis: Axis) -> Array<f64, D>
where
    D: Dimension,
    Di: RemoveAxis<Smaller = D>,
{
    let norm_sq = arr.map(|x| x * x).sum_axis(axis);
    norm_sq.map(|x| x.sqrt())
}

/// Index of the smallest value. `NaN` never wins; `None` if there is no number.
pub(crate) fn argmin(arr: ArrayView1<f64>) -> Option<usize> {
    arr.indexed_iter()
        .filter(|(_, value)| !value.is_nan())
        .min_by(|(_, value0), (_, value1)| value0.total_cmp(value1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn positions_to_array2() {
        let positions = vec![
            Positions::from_names(&["th", "tth"], &[1., 2.]),
            Positions::from_names(&["th", "tth"], &[3., 4.]),
        ];
        let arr = positions.as_slice().into_ndarray2();
        assert_eq!(arr, array![[1., 2.], [3., 4.]]);
    }

    #[test]
    fn axis_norm() {
        let arr = array![[3., 4.], [0., 2.]];
        assert_eq!(norm_axis(arr.view(), Axis(1)), array![5., 2.]);
    }

    #[test]
    fn argmin_skips_nan() {
        assert_eq!(argmin(array![f64::NAN, 2., 1., 1.].view()), Some(2));
        assert_eq!(argmin(array![f64::NAN].view()), None);
    }
}
