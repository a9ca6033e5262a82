//! Placeholder backend: any geometry, no axes, no solutions.

use nalgebra::Matrix3;

use super::{Solver, SolverError, SolverState};
use crate::lattice::Lattice;
use crate::ordered_map::Positions;
use crate::reflection::Reflection;

/// Registry name.
pub const NAME: &str = "no_op";

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Solver that accepts everything and computes nothing.
#[derive(Clone, Debug)]
pub struct NoOpSolver {
    geometry: String,
    engine: Option<String>,
    state: SolverState,
}

impl NoOpSolver {
    /// Create the solver for any `geometry` and `engine`.
    pub fn new(geometry: &str, engine: Option<&str>) -> Result<Self, SolverError> {
        Ok(Self {
            geometry: geometry.to_string(),
            engine: engine.map(str::to_string),
            state: SolverState::new(""),
        })
    }

    pub(crate) fn boxed(
        geometry: &str,
        engine: Option<&str>,
    ) -> Result<Box<dyn Solver>, SolverError> {
        Ok(Box::new(Self::new(geometry, engine)?))
    }
}

impl Solver for NoOpSolver {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn geometry(&self) -> &str {
        &self.geometry
    }

    fn engine(&self) -> Option<&str> {
        self.engine.as_deref()
    }

    fn pseudo_axis_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn real_axis_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn modes(&self) -> Vec<String> {
        Vec::new()
    }

    fn mode(&self) -> &str {
        &self.state.mode
    }

    fn set_mode(&mut self, mode: &str) -> Result<(), SolverError> {
        self.state.select_mode(mode, &[])
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

    fn forward(&mut self, _pseudos: &Positions) -> Result<Vec<Positions>, SolverError> {
        Ok(Vec::new())
    }

    fn inverse(&mut self, _reals: &Positions) -> Result<Positions, SolverError> {
        Ok(Positions::new())
    }

    fn add_reflection(&mut self, _reflection: &Reflection) -> Result<(), SolverError> {
        Ok(())
    }

    fn remove_all_reflections(&mut self) {}

    fn calculate_orientation(
        &mut self,
        _r1: &Reflection,
        _r2: &Reflection,
    ) -> Result<Matrix3<f64>, SolverError> {
        Ok(self.state.ub)
    }

    fn refine_lattice(&mut self, _reflections: &[&Reflection]) -> Result<Lattice, SolverError> {
        self.state
            .lattice
            .clone()
            .ok_or_else(|| SolverError::Backend("no lattice to refine".into()))
    }
}
