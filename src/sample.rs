//! Crystalline sample: lattice, reflections and orientation.

use std::fmt;

use nalgebra::Matrix3;

use crate::error::{Error, Result};
use crate::geometry::is_unit_normalized;
use crate::lattice::{DEFAULT_DIGITS, Lattice};
use crate::reflection::ReflectionsDict;

/// Tolerance on the row/column norms of U.
const U_NORM_TOLERANCE: f64 = 1e-6;

/// Short random name used when none is given.
pub(crate) fn unique_name(len: usize) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..len.min(id.len())].to_string()
}

/// A sample mounted on the diffractometer.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    name: String,
    /// Unit cell.
    pub lattice: Lattice,
    /// Reflections observed on this sample.
    pub reflections: ReflectionsDict,
    u: Matrix3<f64>,
    ub: Matrix3<f64>,
    digits: u32,
}

impl Sample {
    /// Create a sample with U = identity and UB = B.
    ///
    /// A 7-character unique name is generated if `name` is `None`.
    pub fn new(name: Option<&str>, lattice: Lattice) -> Result<Self> {
        let name = name.map_or_else(|| unique_name(7), str::to_string);
        let ub = lattice.b_matrix()?;
        Ok(Self {
            name,
            lattice,
            reflections: ReflectionsDict::new(),
            u: Matrix3::identity(),
            ub,
            digits: DEFAULT_DIGITS,
        })
    }

    /// Sample name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Orientation (rotation) matrix U.
    pub fn u(&self) -> &Matrix3<f64> {
        &self.u
    }

    /// Orientation matrix including the reciprocal metric, UB.
    pub fn ub(&self) -> &Matrix3<f64> {
        &self.ub
    }

    /// Set U. Rows and columns must have unit length.
    pub fn set_u(&mut self, u: Matrix3<f64>) -> Result<()> {
        check_finite("U", &u)?;
        if !is_unit_normalized(&u, U_NORM_TOLERANCE) {
            return Err(Error::Sample(format!(
                "U rows and columns must be unit-normalised, received {u}"
            )));
        }
        self.u = u;
        Ok(())
    }

    /// Set UB.
    pub fn set_ub(&mut self, ub: Matrix3<f64>) -> Result<()> {
        check_finite("UB", &ub)?;
        self.ub = ub;
        Ok(())
    }

    /// Display and comparison precision.
    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Set the precision for this sample and its lattice.
    pub fn set_digits(&mut self, digits: u32) {
        self.digits = digits;
        self.lattice.digits = digits;
    }
}

fn check_finite(name: &str, m: &Matrix3<f64>) -> Result<()> {
    if m.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(Error::Sample(format!("{name} must be finite, received {m}")))
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sample(name={:?}, {}, reflections={:?})",
            self.name,
            self.lattice,
            self.reflections.names()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::TAU;

    use approx::assert_abs_diff_eq;
    use nalgebra::{Vector3, matrix};

    use super::*;
    use crate::geometry::rotation;

    #[test]
    fn default_orientation() {
        let sample = Sample::new(Some("silicon"), Lattice::cubic(5.431)).unwrap();
        assert_eq!(sample.name(), "silicon");
        assert_eq!(sample.u(), &Matrix3::identity());
        assert_abs_diff_eq!(sample.ub().m11, TAU / 5.431, epsilon = 1e-12);
    }

    #[test]
    fn generated_name() {
        let s1 = Sample::new(None, Lattice::cubic(1.)).unwrap();
        let s2 = Sample::new(None, Lattice::cubic(1.)).unwrap();
        assert_eq!(s1.name().len(), 7);
        assert_ne!(s1.name(), s2.name());
    }

    #[test]
    fn flat_cell_is_rejected() {
        let flat = Lattice::builder(1.).alpha(120.).build();
        assert!(matches!(Sample::new(Some("flat"), flat), Err(Error::Lattice(_))));
    }

    #[test]
    fn u_must_be_normalised() {
        let mut sample = Sample::new(Some("s"), Lattice::cubic(1.)).unwrap();
        let rot = rotation(Vector3::new(0., 1., 1.), 20.).into_inner();
        sample.set_u(rot).unwrap();

        let skewed = matrix![1., 0.1, 0.; 0., 1., 0.; 0., 0., 1.];
        assert!(matches!(sample.set_u(skewed), Err(Error::Sample(_))));
        assert_eq!(sample.u(), &rot);

        let mut nan = Matrix3::identity();
        nan.m22 = f64::NAN;
        assert!(sample.set_ub(nan).is_err());
        assert!(sample.set_ub(skewed).is_ok());
    }
}
