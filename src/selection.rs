//! Choosing one forward solution among several.
//!
//! A selector receives the current real-axis position and the candidate solutions that
//! passed the constraints, all keyed by the diffractometer's real-axis names.
//! Any function with the [`Selector`] signature can be installed on a
//! [`Core`](crate::Core) with [`Core::set_selector`](crate::Core::set_selector).

use ndarray::Axis;

use crate::error::{Error, Result};
use crate::ndarray_utils::{IntoNdarray2, argmin, norm_axis};
use crate::ordered_map::Positions;

/// Picks one of `solutions` given the `current` position.
pub type Selector = fn(current: &Positions, solutions: &[Positions]) -> Result<Positions>;

/// The first solution.
pub fn pick_first_solution(_current: &Positions, solutions: &[Positions]) -> Result<Positions> {
    solutions
        .first()
        .cloned()
        .ok_or_else(|| Error::NoForwardSolutions("empty solution list".into()))
}

/// The solution requiring the least motion from `current` (Euclidean distance).
///
/// Axes missing from `current` count as being at zero.
pub fn pick_closest_solution(current: &Positions, solutions: &[Positions]) -> Result<Positions> {
    let mut distances = solutions.into_ndarray2();
    for (mut column, axis) in distances
        .axis_iter_mut(Axis(1))
        .zip(solutions.first().into_iter().flat_map(Positions::keys))
    {
        let origin = current.get(axis).copied().unwrap_or_default();
        column.mapv_inplace(|x| x - origin);
    }
    let distances = norm_axis(distances.view(), Axis(1));
    let best = argmin(distances.view())
        .ok_or_else(|| Error::NoForwardSolutions("empty solution list".into()))?;
    Ok(solutions[best].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solutions() -> Vec<Positions> {
        vec![
            Positions::from_names(&["omega", "tth"], &[10., 20.]),
            Positions::from_names(&["omega", "tth"], &[-170., 20.]),
            Positions::from_names(&["omega", "tth"], &[95., 20.]),
        ]
    }

    #[test]
    fn first() {
        let current = Positions::from_names(&["omega", "tth"], &[100., 0.]);
        assert_eq!(pick_first_solution(&current, &solutions()).unwrap()["omega"], 10.);
        assert!(matches!(
            pick_first_solution(&current, &[]),
            Err(Error::NoForwardSolutions(_))
        ));
    }

    #[test]
    fn closest() {
        let current = Positions::from_names(&["omega", "tth"], &[100., 0.]);
        assert_eq!(pick_closest_solution(&current, &solutions()).unwrap()["omega"], 95.);

        let current = Positions::from_names(&["omega", "tth"], &[-150., 20.]);
        assert_eq!(pick_closest_solution(&current, &solutions()).unwrap()["omega"], -170.);

        assert!(pick_closest_solution(&current, &[]).is_err());
    }
}
