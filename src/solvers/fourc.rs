//! Eulerian four-circle diffractometer, vertical scattering plane (`E4CV`).
//!
//! Laboratory frame: the incident beam runs along `+x`, `z` points up.
//! `omega`, `phi` and `tth` rotate about `-y`, `chi` about `+x`.
//! With `R = Ω·Χ·Φ` the scattering vector of Miller indices `hkl` is
//!
//! ```text
//! Q_lab = R · UB · hkl = k · (cos tth - 1, 0, sin tth),    k = 2π / λ
//! ```
//!
//! Forward solutions are computed in closed form for each mode; UB follows
//! Busing & Levy (1967) from two reflections, or least squares from three or more.
#![allow(non_snake_case)]

use std::f64::consts::TAU;

use log::debug;
use nalgebra::{Matrix3, MatrixXx3, RowVector3, SVD, Vector3};

use super::{Solver, SolverError, SolverState, check_geometry, to_strings, values_of};
use crate::geometry::{rotation, triad, wrap_angle};
use crate::lattice::Lattice;
use crate::ordered_map::Positions;
use crate::reflection::Reflection;

/// Registry name.
pub const NAME: &str = "fourc";
/// The only geometry.
pub const GEOMETRY: &str = "E4CV";
/// The only engine.
pub const ENGINE: &str = "hkl";

/// `omega = tth / 2`.
pub const BISSECTOR: &str = "bissector";
/// `omega` held at the extra axis `fixed_omega`.
pub const CONSTANT_OMEGA: &str = "constant_omega";
/// `chi` held at the extra axis `fixed_chi`.
pub const CONSTANT_CHI: &str = "constant_chi";
/// `phi` held at the extra axis `fixed_phi`.
pub const CONSTANT_PHI: &str = "constant_phi";

const VERSION: &str = env!("CARGO_PKG_VERSION");
const PSEUDOS: [&str; 3] = ["h", "k", "l"];
const REALS: [&str; 4] = ["omega", "chi", "phi", "tth"];
const EXTRAS: [&str; 3] = ["fixed_omega", "fixed_chi", "fixed_phi"];
const MODES: [&str; 4] = [BISSECTOR, CONSTANT_OMEGA, CONSTANT_CHI, CONSTANT_PHI];

/// Below this, a vector component or sine counts as zero.
const EPS: f64 = 1e-10;
/// Singular values below this make a least-squares UB underdetermined.
const RANK_TOLERANCE: f64 = 1e-8;

/// Closed-form `E4CV` solver.
#[derive(Clone, Debug)]
pub struct FourCircleSolver {
    state: SolverState,
    extras: Positions,
}

impl FourCircleSolver {
    /// Create the solver for [`GEOMETRY`]; `engine` must be [`ENGINE`] or `None`.
    pub fn new(geometry: &str, engine: Option<&str>) -> Result<Self, SolverError> {
        check_geometry(NAME, geometry, &[GEOMETRY])?;
        match engine {
            None | Some(ENGINE) => {}
            Some(other) => {
                return Err(SolverError::UnknownEngine {
                    engine: other.to_string(),
                    choices: ENGINE.to_string(),
                });
            }
        }
        Ok(Self {
            state: SolverState::new(BISSECTOR),
            extras: Positions::from_names(&EXTRAS, &[0.; 3]),
        })
    }

    pub(crate) fn boxed(
        geometry: &str,
        engine: Option<&str>,
    ) -> Result<Box<dyn Solver>, SolverError> {
        Ok(Box::new(Self::new(geometry, engine)?))
    }

    /// Extra axis read by the current mode.
    fn mode_extra(&self) -> Option<&'static str> {
        match self.state.mode.as_str() {
            CONSTANT_OMEGA => Some(EXTRAS[0]),
            CONSTANT_CHI => Some(EXTRAS[1]),
            CONSTANT_PHI => Some(EXTRAS[2]),
            _ => None,
        }
    }

    fn extra(&self, name: &str) -> f64 {
        self.extras.get(name).copied().unwrap_or_default()
    }

    fn b_matrix(&self) -> Result<Matrix3<f64>, SolverError> {
        let lattice = self
            .state
            .lattice
            .as_ref()
            .ok_or_else(|| SolverError::Backend("no lattice has been set".into()))?;
        lattice.b_matrix().map_err(|e| SolverError::Backend(e.to_string()))
    }

    /// Miller indices and the scattering vector in the `phi` frame.
    fn reflection_vectors(
        reflection: &Reflection,
    ) -> Result<(Vector3<f64>, Vector3<f64>), SolverError> {
        let hkl = Vector3::from_column_slice(&values_of(reflection.pseudos(), &PSEUDOS)?);
        let reals = values_of(reflection.reals(), &REALS)?;
        let (omega, chi, phi, tth) = (reals[0], reals[1], reals[2], reals[3]);
        let R = goniometer(omega, chi, phi);
        let q_phi = R.transpose() * q_lab(tth, reflection.wavelength());
        Ok((hkl, q_phi))
    }
}

/// `Ω·Χ·Φ` for the given angles in degrees.
fn goniometer(omega: f64, chi: f64, phi: f64) -> Matrix3<f64> {
    let minus_y = -Vector3::y();
    (rotation(minus_y, omega) * rotation(Vector3::x(), chi) * rotation(minus_y, phi)).into_inner()
}

/// Scattering vector in the laboratory frame for detector angle `tth`.
fn q_lab(tth: f64, wavelength: f64) -> Vector3<f64> {
    let (sin, cos) = tth.to_radians().sin_cos();
    Vector3::new(cos - 1., 0., sin) * (TAU / wavelength)
}

fn degrees(y: f64, x: f64) -> f64 {
    y.atan2(x).to_degrees()
}

/// `(omega, chi, phi)` candidates that bring the unit vector `q` into diffraction at `theta`.
fn orientations(mode: &str, q: &Vector3<f64>, theta: f64, held: f64) -> Vec<[f64; 3]> {
    let r = q.x.hypot(q.z);
    match mode {
        BISSECTOR => {
            let phi = degrees(q.x, q.z);
            vec![
                [theta, degrees(q.y, r), phi],
                [theta, degrees(q.y, -r), phi + 180.],
            ]
        }
        CONSTANT_PHI => {
            let v = rotation(-Vector3::y(), held) * q;
            let chi = degrees(v.y, v.z);
            let delta = v.x.clamp(-1., 1.).asin().to_degrees();
            vec![
                [theta + delta, chi, held],
                [theta + 180. - delta, chi + 180., held],
            ]
        }
        CONSTANT_OMEGA => {
            if r < EPS {
                return Vec::new();
            }
            let (sin_d, cos_d) = (held - theta).to_radians().sin_cos();
            if sin_d.abs() > r {
                return Vec::new();
            }
            let alpha = degrees(q.z, q.x);
            let spread = (sin_d / r).clamp(-1., 1.).acos().to_degrees();
            [spread, -spread]
                .into_iter()
                .map(|s| {
                    let phi = s - alpha;
                    let w_z = r * (phi + alpha).to_radians().sin();
                    let chi = degrees(cos_d, 0.) - degrees(w_z, q.y);
                    [held, chi, phi]
                })
                .collect()
        }
        CONSTANT_CHI => {
            let (sin_c, cos_c) = held.to_radians().sin_cos();
            if sin_c.abs() < EPS || r < EPS {
                return Vec::new();
            }
            let w_z = cos_c * q.y / sin_c;
            if w_z.abs() > r {
                return Vec::new();
            }
            let alpha = degrees(q.z, q.x);
            let base = (w_z / r).clamp(-1., 1.).asin().to_degrees();
            [base, 180. - base]
                .into_iter()
                .map(|angle| {
                    let w_x = r * angle.to_radians().cos();
                    let delta = degrees(w_x, sin_c * q.y + cos_c * w_z);
                    [theta + delta, held, angle - alpha]
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

impl Solver for FourCircleSolver {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn geometry(&self) -> &str {
        GEOMETRY
    }

    fn engine(&self) -> Option<&str> {
        Some(ENGINE)
    }

    fn pseudo_axis_names(&self) -> Vec<String> {
        to_strings(&PSEUDOS)
    }

    fn real_axis_names(&self) -> Vec<String> {
        to_strings(&REALS)
    }

    fn extra_axis_names(&self) -> Vec<String> {
        self.mode_extra().into_iter().map(str::to_string).collect()
    }

    fn modes(&self) -> Vec<String> {
        to_strings(&MODES)
    }

    fn mode(&self) -> &str {
        &self.state.mode
    }

    fn set_mode(&mut self, mode: &str) -> Result<(), SolverError> {
        self.state.select_mode(mode, &MODES)
    }

    fn extras(&self) -> Positions {
        self.mode_extra()
            .map(|name| (name, self.extra(name)))
            .into_iter()
            .collect()
    }

    /// Any of `fixed_omega`, `fixed_chi`, `fixed_phi` may be set, whatever the mode.
    fn set_extras(&mut self, extras: &Positions) -> Result<(), SolverError> {
        if let Some(axis) = extras.keys().find(|k| !EXTRAS.contains(k)) {
            return Err(SolverError::InvalidInput(format!(
                "unknown extra axis {axis:?}, expected one of {EXTRAS:?}"
            )));
        }
        for (axis, value) in extras.iter() {
            self.extras.insert(axis, *value);
        }
        Ok(())
    }

    fn wavelength(&self) -> f64 {
        self.state.wavelength
    }

    fn set_wavelength(&mut self, wavelength: f64) -> Result<(), SolverError> {
        self.state.set_wavelength(wavelength)
    }

    fn set_lattice(&mut self, lattice: &Lattice) -> Result<(), SolverError> {
        lattice.b_matrix().map_err(|e| SolverError::Backend(e.to_string()))?;
        self.state.lattice = Some(lattice.clone());
        Ok(())
    }

    fn u(&self) -> Matrix3<f64> {
        self.state.u
    }

    fn set_u(&mut self, u: &Matrix3<f64>) -> Result<(), SolverError> {
        self.state.u = *u;
        Ok(())
    }

    fn ub(&self) -> Matrix3<f64> {
        self.state.ub
    }

    fn set_ub(&mut self, ub: &Matrix3<f64>) -> Result<(), SolverError> {
        self.state.ub = *ub;
        Ok(())
    }

    fn forward(&mut self, pseudos: &Positions) -> Result<Vec<Positions>, SolverError> {
        let hkl = Vector3::from_column_slice(&values_of(pseudos, &PSEUDOS)?);
        let q = self.state.ub * hkl;
        let norm = q.norm();
        let sin_theta = norm * self.state.wavelength / (2. * TAU);
        if norm < EPS || sin_theta > 1. {
            debug!("{hkl:?} is out of reach at wavelength {}", self.state.wavelength);
            return Ok(Vec::new());
        }
        let theta = sin_theta.asin().to_degrees();
        let held = self.mode_extra().map_or(0., |name| self.extra(name));

        let mut solutions: Vec<Positions> = Vec::new();
        for [omega, chi, phi] in orientations(&self.state.mode, &(q / norm), theta, held) {
            let values = [omega, chi, phi, 2. * theta].map(wrap_angle);
            if values.iter().any(|v| !v.is_finite()) {
                continue;
            }
            let candidate = Positions::from_names(&REALS, &values);
            let duplicate = solutions.iter().any(|s| {
                s.values()
                    .zip(candidate.values())
                    .all(|(a, b)| (a - b).abs() < 1e-9)
            });
            if !duplicate {
                solutions.push(candidate);
            }
        }
        Ok(solutions)
    }

    fn inverse(&mut self, reals: &Positions) -> Result<Positions, SolverError> {
        let values = values_of(reals, &REALS)?;
        let R = goniometer(values[0], values[1], values[2]);
        let RUB_inv = (R * self.state.ub)
            .try_inverse()
            .ok_or_else(|| SolverError::Backend("UB matrix is singular".into()))?;
        let hkl = RUB_inv * q_lab(values[3], self.state.wavelength);
        Ok(Positions::from_names(&PSEUDOS, hkl.as_slice()))
    }

    fn add_reflection(&mut self, reflection: &Reflection) -> Result<(), SolverError> {
        Self::reflection_vectors(reflection)?;
        self.state.reflections.push(reflection.clone());
        Ok(())
    }

    fn remove_all_reflections(&mut self) {
        self.state.reflections.clear();
    }

    fn calculate_orientation(
        &mut self,
        r1: &Reflection,
        r2: &Reflection,
    ) -> Result<Matrix3<f64>, SolverError> {
        let B = self.b_matrix()?;
        let (h1, q1) = Self::reflection_vectors(r1)?;
        let (h2, q2) = Self::reflection_vectors(r2)?;

        let parallel = || {
            SolverError::Backend(format!(
                "reflections {} and {} are parallel",
                r1.name(),
                r2.name()
            ))
        };
        let T_phi = triad(&q1, &q2).ok_or_else(parallel)?;
        let T_c = triad(&(B * h1), &(B * h2)).ok_or_else(parallel)?;

        let U = T_phi * T_c.transpose();
        let UB = U * B;
        debug!("UB from {} and {}: {UB}", r1.name(), r2.name());
        self.state.u = U;
        self.state.ub = UB;
        Ok(UB)
    }

    /// Least-squares UB from all `reflections`, reduced to its lattice.
    ///
    /// Solver state is left unchanged.
    fn refine_lattice(&mut self, reflections: &[&Reflection]) -> Result<Lattice, SolverError> {
        if reflections.len() < 3 {
            return Err(SolverError::InvalidInput(format!(
                "lattice refinement needs at least 3 reflections, received {}",
                reflections.len()
            )));
        }
        let mut H = Vec::with_capacity(reflections.len());
        let mut Q = Vec::with_capacity(reflections.len());
        for reflection in reflections {
            let (hkl, q_phi) = Self::reflection_vectors(reflection)?;
            H.push(RowVector3::new(hkl.x, hkl.y, hkl.z));
            Q.push(RowVector3::new(q_phi.x, q_phi.y, q_phi.z));
        }

        let svd = SVD::new(MatrixXx3::from_rows(&H), true, true);
        if svd.rank(RANK_TOLERANCE) < 3 {
            return Err(SolverError::Backend(
                "reflections are coplanar in reciprocal space".into(),
            ));
        }
        let UB_t: Matrix3<f64> = svd
            .solve(&MatrixXx3::from_rows(&Q), 0.)
            .map_err(|e| SolverError::Backend(e.to_string()))?;
        Lattice::from_ub(&UB_t.transpose()).map_err(|e| SolverError::Backend(e.to_string()))
    }
}
