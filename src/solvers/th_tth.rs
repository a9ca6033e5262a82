//! `θ/2θ` geometry with momentum transfer `q` as the only pseudo axis.
//!
//! `q = 4π sin(tth / 2) / λ`. In the `bisector` mode `th = tth / 2`.

use std::f64::consts::PI;

use nalgebra::Matrix3;

use super::{Solver, SolverError, SolverState, check_geometry, to_strings, values_of};
use crate::lattice::Lattice;
use crate::ordered_map::Positions;
use crate::reflection::Reflection;

/// Registry name.
pub const NAME: &str = "th_tth";
/// The only geometry.
pub const GEOMETRY: &str = "TH TTH Q";

const VERSION: &str = env!("CARGO_PKG_VERSION");
const PSEUDOS: [&str; 1] = ["q"];
const REALS: [&str; 2] = ["th", "tth"];
const MODES: [&str; 1] = ["bisector"];

/// Trigonometric `θ/2θ` solver.
#[derive(Clone, Debug)]
pub struct ThTthSolver {
    state: SolverState,
}

impl ThTthSolver {
    /// Create the solver. The only geometry is [`GEOMETRY`]; there are no engines.
    pub fn new(geometry: &str, engine: Option<&str>) -> Result<Self, SolverError> {
        check_geometry(NAME, geometry, &[GEOMETRY])?;
        if let Some(engine) = engine {
            return Err(SolverError::NoEngines {
                geometry: GEOMETRY.to_string(),
                engine: engine.to_string(),
            });
        }
        Ok(Self {
            state: SolverState::new(MODES[0]),
        })
    }

    pub(crate) fn boxed(
        geometry: &str,
        engine: Option<&str>,
    ) -> Result<Box<dyn Solver>, SolverError> {
        Ok(Box::new(Self::new(geometry, engine)?))
    }

    fn unsupported(&self, operation: &'static str) -> SolverError {
        SolverError::Unsupported {
            solver: NAME.to_string(),
            operation,
        }
    }
}

impl Solver for ThTthSolver {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn geometry(&self) -> &str {
        GEOMETRY
    }

    fn pseudo_axis_names(&self) -> Vec<String> {
        to_strings(&PSEUDOS)
    }

    fn real_axis_names(&self) -> Vec<String> {
        to_strings(&REALS)
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

    fn wavelength(&self) -> f64 {
        self.state.wavelength
    }

    fn set_wavelength(&mut self, wavelength: f64) -> Result<(), SolverError> {
        self.state.set_wavelength(wavelength)
    }

    fn set_lattice(&mut self, lattice: &Lattice) -> Result<(), SolverError> {
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
        let q = values_of(pseudos, &PSEUDOS)?[0];
        let sin_th = q * self.state.wavelength / (4. * PI);
        if sin_th.abs() > 1. {
            return Ok(Vec::new());
        }
        let th = sin_th.asin().to_degrees();
        Ok(vec![Positions::from_names(&REALS, &[th, 2. * th])])
    }

    fn inverse(&mut self, reals: &Positions) -> Result<Positions, SolverError> {
        let tth = values_of(reals, &REALS)?[1];
        let q = 4. * PI * (tth / 2.).to_radians().sin() / self.state.wavelength;
        Ok(Positions::from_names(&PSEUDOS, &[q]))
    }

    fn add_reflection(&mut self, reflection: &Reflection) -> Result<(), SolverError> {
        self.state.reflections.push(reflection.clone());
        Ok(())
    }

    fn remove_all_reflections(&mut self) {
        self.state.reflections.clear();
    }

    fn calculate_orientation(
        &mut self,
        _r1: &Reflection,
        _r2: &Reflection,
    ) -> Result<Matrix3<f64>, SolverError> {
        Err(self.unsupported("orientation calculation"))
    }

    fn refine_lattice(&mut self, _reflections: &[&Reflection]) -> Result<Lattice, SolverError> {
        Err(self.unsupported("lattice refinement"))
    }
}
