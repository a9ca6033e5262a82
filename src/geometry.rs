#![allow(non_snake_case)]
use std::f64::consts::TAU;

use nalgebra::{Matrix3, Rotation3, Vector3};

/// Smallest `V / abc` of a cell; flatter cells are degenerate.
const MIN_VOLUME_FACTOR: f64 = 1e-12;

/// Round `value` to `digits` decimal places.
pub(crate) fn round_to(value: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    (value * scale).round() / scale
}

/// Whether `value` and `reference` agree within `tolerance`.
pub(crate) fn very_close(value: f64, reference: f64, tolerance: f64) -> bool {
    (value - reference).abs() <= tolerance
}

/// Wrap an angle in degrees into `(-180, 180]`.
pub(crate) fn wrap_angle(angle: f64) -> f64 {
    let mut wrapped = angle % 360.;
    if wrapped > 180. {
        wrapped -= 360.;
    } else if wrapped <= -180. {
        wrapped += 360.;
    }
    wrapped
}

/// Right-handed rotation by `angle` degrees about `axis`.
pub(crate) fn rotation(axis: Vector3<f64>, angle: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&nalgebra::Unit::new_normalize(axis), angle.to_radians())
}

/// Busing & Levy B matrix with the `2π` convention.
///
/// Columns map Miller indices onto an orthonormal frame attached to the reciprocal lattice,
/// with `a*` along x. Returns `None` if the parameters do not describe a cell.
pub(crate) fn b_matrix(
    a: f64,
    b: f64,
    c: f64,
    alpha: f64,
    beta: f64,
    gamma: f64,
) -> Option<Matrix3<f64>> {
    let (alpha, beta, gamma) = (alpha.to_radians(), beta.to_radians(), gamma.to_radians());
    let (ca, cb, cg) = (alpha.cos(), beta.cos(), gamma.cos());
    let (sa, sb, sg) = (alpha.sin(), beta.sin(), gamma.sin());

    let root = 1. - ca * ca - cb * cb - cg * cg + 2. * ca * cb * cg;
    if root < MIN_VOLUME_FACTOR || a <= 0. || b <= 0. || c <= 0. {
        return None;
    }
    let volume = a * b * c * root.sqrt();

    let a_star = TAU * b * c * sa / volume;
    let b_star = TAU * a * c * sb / volume;
    let c_star = TAU * a * b * sg / volume;
    let cos_beta_star = (ca * cg - cb) / (sa * sg);
    let cos_gamma_star = (ca * cb - cg) / (sa * sb);
    let sin_beta_star = (1. - cos_beta_star * cos_beta_star).sqrt();
    let sin_gamma_star = (1. - cos_gamma_star * cos_gamma_star).sqrt();

    #[rustfmt::skip]
    let B = Matrix3::new(
        a_star, b_star * cos_gamma_star, c_star * cos_beta_star,
        0., b_star * sin_gamma_star, -c_star * sin_beta_star * ca,
        0., 0., TAU / c,
    );
    Some(B)
}

/// Lattice parameters `(a, b, c, alpha, beta, gamma)` from a UB matrix.
///
/// `UBᵀ·UB` is the reciprocal metric tensor (`2π` convention); its inverse scaled by
/// `(2π)²` is the direct metric tensor.
pub(crate) fn cell_from_ub(UB: &Matrix3<f64>) -> Option<[f64; 6]> {
    let G_star = UB.transpose() * UB;
    let G = G_star.try_inverse()? * (TAU * TAU);

    let (a, b, c) = (G.m11.sqrt(), G.m22.sqrt(), G.m33.sqrt());
    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return None;
    }
    let alpha = (G.m23 / (b * c)).clamp(-1., 1.).acos().to_degrees();
    let beta = (G.m13 / (a * c)).clamp(-1., 1.).acos().to_degrees();
    let gamma = (G.m12 / (a * b)).clamp(-1., 1.).acos().to_degrees();
    Some([a, b, c, alpha, beta, gamma])
}

/// Whether all rows and columns of `m` have unit length within `tolerance`.
pub(crate) fn is_unit_normalized(m: &Matrix3<f64>, tolerance: f64) -> bool {
    m.row_iter().all(|r| very_close(r.norm(), 1., tolerance))
        && m.column_iter().all(|c| very_close(c.norm(), 1., tolerance))
}

/// Orthonormal triad built from two non-parallel vectors (Busing & Levy eq. 23-27).
pub(crate) fn triad(v1: &Vector3<f64>, v2: &Vector3<f64>) -> Option<Matrix3<f64>> {
    let t1 = v1.try_normalize(1e-12)?;
    let t3 = v1.cross(v2).try_normalize(1e-12)?;
    let t2 = t3.cross(&t1);
    Some(Matrix3::from_columns(&[t1, t2, t3]))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::matrix;

    use super::*;

    #[test]
    fn wrap() {
        assert_abs_diff_eq!(wrap_angle(190.), -170.);
        assert_abs_diff_eq!(wrap_angle(-180.), 180.);
        assert_abs_diff_eq!(wrap_angle(540.), 180.);
        assert_abs_diff_eq!(wrap_angle(-10.), -10.);
    }

    #[test]
    fn cubic_b_matrix() {
        let B = b_matrix(5., 5., 5., 90., 90., 90.).unwrap();
        let expected = Matrix3::identity() * (TAU / 5.);
        assert_abs_diff_eq!(B, expected, epsilon = 1e-12);
    }

    #[test]
    fn impossible_cell() {
        assert!(b_matrix(1., 1., 1., 120., 120., 120.).is_none());
        assert!(b_matrix(2., 3., 4., 60., 60., 120.).is_none());
        assert!(b_matrix(1., 1., 1., 119.9, 119.9, 119.9).is_some());
        assert!(b_matrix(-1., 1., 1., 90., 90., 90.).is_none());
    }

    #[test]
    fn cell_round_trip() {
        let cell = [4., 5., 3., 75., 85., 95.];
        let B = b_matrix(cell[0], cell[1], cell[2], cell[3], cell[4], cell[5]).unwrap();
        let U = rotation(Vector3::new(1., 2., 3.), 33.).into_inner();

        let recovered = cell_from_ub(&(U * B)).unwrap();
        assert_abs_diff_eq!(recovered.as_slice(), cell.as_slice(), epsilon = 1e-9);
    }

    #[test]
    fn unit_normalized() {
        let U = rotation(Vector3::z(), 30.).into_inner();
        assert!(is_unit_normalized(&U, 1e-6));
        assert!(!is_unit_normalized(&(U * 2.), 1e-6));

        let skew = matrix![1., 0., 0.; 0., 1., 0.; 0., 0.5, 1.];
        assert!(!is_unit_normalized(&skew, 1e-6));
    }

    #[test]
    fn triad_is_orthonormal() {
        let T = triad(&Vector3::new(1., 1., 0.), &Vector3::new(0., 1., 1.)).unwrap();
        assert_abs_diff_eq!(T.transpose() * T, Matrix3::identity(), epsilon = 1e-12);
        assert!(triad(&Vector3::x(), &(Vector3::x() * 2.)).is_none());
    }
}
