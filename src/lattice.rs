//! Crystal unit cell.

use std::fmt;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{b_matrix, cell_from_ub, round_to, very_close};

/// Tolerance used when classifying the crystal system.
const SYSTEM_TOLERANCE: f64 = 1e-7;

/// Default display precision.
pub const DEFAULT_DIGITS: u32 = 4;

/// The seven crystal systems.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrystalSystem {
    Triclinic,
    Monoclinic,
    Orthorhombic,
    Tetragonal,
    Rhombohedral,
    Hexagonal,
    Cubic,
}

impl fmt::Display for CrystalSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrystalSystem::Triclinic => "triclinic",
            CrystalSystem::Monoclinic => "monoclinic",
            CrystalSystem::Orthorhombic => "orthorhombic",
            CrystalSystem::Tetragonal => "tetragonal",
            CrystalSystem::Rhombohedral => "rhombohedral",
            CrystalSystem::Hexagonal => "hexagonal",
            CrystalSystem::Cubic => "cubic",
        };
        f.write_str(name)
    }
}

/// Unit cell edges (angstrom) and angles (degrees).
///
/// Fields are public and can be changed independently after construction;
/// the defaults (`b = c = a`, `beta = gamma = alpha`) apply only when building.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lattice {
    /// Edge a.
    pub a: f64,
    /// Edge b.
    pub b: f64,
    /// Edge c.
    pub c: f64,
    /// Angle between b and c.
    pub alpha: f64,
    /// Angle between a and c.
    pub beta: f64,
    /// Angle between a and b.
    pub gamma: f64,
    /// Number of decimal places used for display and comparison.
    #[serde(skip, default = "default_digits")]
    pub digits: u32,
}

fn default_digits() -> u32 {
    DEFAULT_DIGITS
}

impl Lattice {
    /// Lattice from all six parameters.
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
            digits: DEFAULT_DIGITS,
        }
    }

    /// Start building a lattice with edge `a`.
    /// Unset edges default to `a`, unset `beta`/`gamma` to `alpha` (itself 90 by default).
    pub fn builder(a: f64) -> LatticeBuilder {
        LatticeBuilder {
            a,
            b: None,
            c: None,
            alpha: 90.,
            beta: None,
            gamma: None,
            digits: DEFAULT_DIGITS,
        }
    }

    /// Cubic lattice with edge `a`.
    pub fn cubic(a: f64) -> Self {
        Self::builder(a).build()
    }

    /// The six parameters in the order `a, b, c, alpha, beta, gamma`.
    pub fn parameters(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }

    /// Classify the crystal system.
    ///
    /// Checks run from low to high symmetry and the first match wins.
    pub fn crystal_system(&self) -> Result<CrystalSystem> {
        let eq = |x: f64, y: f64| very_close(x, y, SYSTEM_TOLERANCE);
        let right = |x: f64| eq(x, 90.);

        let all_edges_differ = !eq(self.a, self.b) && !eq(self.b, self.c) && !eq(self.a, self.c);
        let all_edges_equal = eq(self.a, self.b) && eq(self.b, self.c);
        let all_angles_differ =
            !eq(self.alpha, self.beta) && !eq(self.beta, self.gamma) && !eq(self.alpha, self.gamma);
        let all_angles_equal = eq(self.alpha, self.beta) && eq(self.beta, self.gamma);
        let all_right = right(self.alpha) && right(self.beta) && right(self.gamma);

        let system = if all_edges_differ && all_angles_differ {
            CrystalSystem::Triclinic
        } else if all_edges_differ && right(self.alpha) && right(self.gamma) && !right(self.beta) {
            CrystalSystem::Monoclinic
        } else if all_edges_differ && all_right {
            CrystalSystem::Orthorhombic
        } else if eq(self.a, self.b) && !eq(self.a, self.c) && all_right {
            CrystalSystem::Tetragonal
        } else if all_edges_equal && all_angles_equal && !right(self.alpha) {
            CrystalSystem::Rhombohedral
        } else if eq(self.a, self.b)
            && right(self.alpha)
            && right(self.beta)
            && eq(self.gamma, 120.)
        {
            CrystalSystem::Hexagonal
        } else if all_edges_equal && all_right {
            CrystalSystem::Cubic
        } else {
            return Err(Error::Lattice(format!(
                "no crystal system matches {self}"
            )));
        };
        Ok(system)
    }

    /// Reciprocal lattice matrix B (`2π` convention).
    pub fn b_matrix(&self) -> Result<Matrix3<f64>> {
        b_matrix(self.a, self.b, self.c, self.alpha, self.beta, self.gamma)
            .ok_or_else(|| {
                Error::Lattice(format!("parameters do not describe a unit cell: {self}"))
            })
    }

    /// Lattice whose B matrix, rotated by some U, gives `ub`.
    pub fn from_ub(ub: &Matrix3<f64>) -> Result<Self> {
        let [a, b, c, alpha, beta, gamma] = cell_from_ub(ub)
            .ok_or_else(|| Error::Lattice("UB matrix is singular".into()))?;
        Ok(Self::new(a, b, c, alpha, beta, gamma))
    }

    fn rounded(&self, digits: u32) -> [f64; 6] {
        self.parameters().map(|p| round_to(p, digits))
    }
}

impl PartialEq for Lattice {
    fn eq(&self, other: &Self) -> bool {
        let digits = self.digits.min(other.digits);
        self.rounded(digits) == other.rounded(digits)
    }
}

impl fmt::Display for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, alpha, beta, gamma] = self.rounded(self.digits);
        write!(
            f,
            "Lattice(a={a}, b={b}, c={c}, alpha={alpha}, beta={beta}, gamma={gamma})"
        )
    }
}

/// Builder for [`Lattice`] applying the construction defaults.
#[derive(Clone, Debug)]
pub struct LatticeBuilder {
    a: f64,
    b: Option<f64>,
    c: Option<f64>,
    alpha: f64,
    beta: Option<f64>,
    gamma: Option<f64>,
    digits: u32,
}

impl LatticeBuilder {
    /// Set edge `b`.
    pub fn b(mut self, b: f64) -> Self {
        self.b = Some(b);
        self
    }

    /// Set edge `c`.
    pub fn c(mut self, c: f64) -> Self {
        self.c = Some(c);
        self
    }

    /// Set angle `alpha`.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set angle `beta`.
    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = Some(beta);
        self
    }

    /// Set angle `gamma`.
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    /// Set the display precision.
    pub fn digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }

    /// Finish the lattice.
    pub fn build(self) -> Lattice {
        Lattice {
            a: self.a,
            b: self.b.unwrap_or(self.a),
            c: self.c.unwrap_or(self.a),
            alpha: self.alpha,
            beta: self.beta.unwrap_or(self.alpha),
            gamma: self.gamma.unwrap_or(self.alpha),
            digits: self.digits,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn defaults() {
        let lattice = Lattice::builder(4.).c(3.).alpha(80.).build();
        assert_eq!(lattice.parameters(), [4., 4., 3., 80., 80., 80.]);
    }

    #[test]
    fn crystal_systems() {
        let cases = [
            (Lattice::cubic(5.), CrystalSystem::Cubic),
            (Lattice::builder(4.).c(3.).gamma(120.).build(), CrystalSystem::Hexagonal),
            (Lattice::new(4., 5., 3., 75., 85., 95.), CrystalSystem::Triclinic),
            (Lattice::builder(4.).b(5.).c(3.).beta(95.).build(), CrystalSystem::Monoclinic),
            (Lattice::builder(4.).b(5.).c(3.).build(), CrystalSystem::Orthorhombic),
            (Lattice::builder(4.).c(3.).build(), CrystalSystem::Tetragonal),
            (Lattice::builder(4.).alpha(80.1).build(), CrystalSystem::Rhombohedral),
        ];
        for (lattice, expected) in cases {
            assert_eq!(lattice.crystal_system().unwrap(), expected, "{lattice}");
        }
    }

    #[test]
    fn unclassifiable() {
        let lattice = Lattice::builder(4.).c(3.).alpha(80.).build();
        assert!(matches!(lattice.crystal_system(), Err(Error::Lattice(_))));
    }

    #[test]
    fn equality_uses_fewest_digits() {
        let mut l1 = Lattice::cubic(5.);
        let mut l2 = Lattice::cubic(5.00001);
        assert_eq!(l1, l2);

        l1.digits = 6;
        l2.digits = 6;
        assert_ne!(l1, l2);

        l2.digits = 2;
        assert_eq!(l1, l2);
    }

    #[test]
    fn from_ub_recovers_parameters() {
        let lattice = Lattice::builder(4.).c(3.).gamma(120.).build();
        let recovered = Lattice::from_ub(&lattice.b_matrix().unwrap()).unwrap();
        assert_eq!(recovered, lattice);
        assert_abs_diff_eq!(recovered.gamma, 120., epsilon = 1e-9);
    }

    #[test]
    fn yaml() {
        let text = serde_yaml::to_string(&Lattice::cubic(5.)).unwrap();
        assert!(text.contains("alpha: 90.0"));
        let back: Lattice = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back, Lattice::cubic(5.));
    }
}
