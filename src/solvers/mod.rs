//! Geometry solvers.
//!
//! A [`Solver`] encapsulates the kinematics of one diffractometer geometry:
//! it converts pseudo-axis values (e.g. `h, k, l`) into real-axis solutions and back,
//! and computes orientation matrices from reflections.
//! Solvers are created by name through a [`SolverRegistry`], so third-party backends
//! can be added without changing the orchestration code.
//!
//! Built-in backends:
//! - [`th_tth`]: `θ/2θ` geometry with the single pseudo axis `q`.
//! - [`fourc`]: Eulerian four-circle geometry (`E4CV`) with pseudo axes `h, k, l`.
//! - [`no_op`]: accepts any geometry and never finds a solution.

use std::collections::BTreeMap;
use std::fmt::Debug;

use itertools::Itertools;
use nalgebra::Matrix3;
use thiserror::Error;

use crate::lattice::Lattice;
use crate::ordered_map::Positions;
use crate::reflection::Reflection;

pub mod fourc;
pub mod no_op;
pub mod th_tth;

/// Errors raised by solver backends.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    /// No solver registered under this name.
    #[error("unknown solver {name:?}, choose one of [{choices}]")]
    UnknownSolver {
        /// Requested name.
        name: String,
        /// Registered names.
        choices: String,
    },

    /// The solver does not provide this geometry.
    #[error("solver {solver:?} has no geometry {geometry:?}, choose one of [{choices}]")]
    UnknownGeometry {
        /// Solver name.
        solver: String,
        /// Requested geometry.
        geometry: String,
        /// Geometries the solver provides.
        choices: String,
    },

    /// The geometry does not provide this engine.
    #[error("unknown engine {engine:?}, choose one of [{choices}]")]
    UnknownEngine {
        /// Requested engine.
        engine: String,
        /// Engines the geometry provides.
        choices: String,
    },

    /// An engine was requested for a geometry that has none.
    #[error("geometry {geometry:?} has no engines, received {engine:?}")]
    NoEngines {
        /// Geometry name.
        geometry: String,
        /// Requested engine.
        engine: String,
    },

    /// The geometry does not provide this mode.
    #[error("unknown mode {mode:?}, choose one of [{choices}]")]
    UnknownMode {
        /// Requested mode.
        mode: String,
        /// Modes the geometry provides.
        choices: String,
    },

    /// Structurally invalid input, e.g. a missing axis.
    #[error("invalid solver input: {0}")]
    InvalidInput(String),

    /// The request is valid but has no physical solution.
    #[error("no forward solutions: {0}")]
    NoForwardSolutions(String),

    /// The backend does not implement this operation.
    #[error("solver {solver:?} does not support {operation}")]
    Unsupported {
        /// Solver name.
        solver: String,
        /// What was attempted.
        operation: &'static str,
    },

    /// Failure inside the backend computation.
    #[error("solver backend error: {0}")]
    Backend(String),
}

/// Contract every geometry backend implements.
///
/// Axis name lists are ordered by the solver and never sorted. The geometry is fixed when the
/// solver is created; create a new solver to change it.
pub trait Solver: Debug {
    /// Name under which the solver is registered.
    fn name(&self) -> &str;

    /// Backend version.
    fn version(&self) -> &str;

    /// Geometry name.
    fn geometry(&self) -> &str;

    /// Engine name, for backends with more than one engine per geometry.
    fn engine(&self) -> Option<&str> {
        None
    }

    /// Pseudo-axis names in solver order.
    fn pseudo_axis_names(&self) -> Vec<String>;

    /// Real-axis names in solver order.
    fn real_axis_names(&self) -> Vec<String>;

    /// Extra-axis names required by the current mode.
    fn extra_axis_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Available modes.
    fn modes(&self) -> Vec<String>;

    /// Current mode.
    fn mode(&self) -> &str;

    /// Select a mode. An empty string keeps the current mode.
    fn set_mode(&mut self, mode: &str) -> Result<(), SolverError>;

    /// Values of the extra axes.
    fn extras(&self) -> Positions {
        Positions::new()
    }

    /// Set some or all extra axes.
    fn set_extras(&mut self, extras: &Positions) -> Result<(), SolverError> {
        match extras.keys().next() {
            None => Ok(()),
            Some(axis) => Err(SolverError::InvalidInput(format!(
                "{} takes no extra axes, received {axis:?}",
                self.name()
            ))),
        }
    }

    /// Wavelength used by the transforms.
    fn wavelength(&self) -> f64;

    /// Set the wavelength.
    fn set_wavelength(&mut self, wavelength: f64) -> Result<(), SolverError>;

    /// Set the sample lattice.
    fn set_lattice(&mut self, lattice: &Lattice) -> Result<(), SolverError>;

    /// Orientation matrix U.
    fn u(&self) -> Matrix3<f64>;

    /// Set U.
    fn set_u(&mut self, u: &Matrix3<f64>) -> Result<(), SolverError>;

    /// Orientation matrix UB.
    fn ub(&self) -> Matrix3<f64>;

    /// Set UB.
    fn set_ub(&mut self, ub: &Matrix3<f64>) -> Result<(), SolverError>;

    /// Real-axis solutions for the given pseudo-axis values, keyed by solver names.
    ///
    /// An empty vector means there is no physical solution.
    fn forward(&mut self, pseudos: &Positions) -> Result<Vec<Positions>, SolverError>;

    /// Pseudo-axis values for the given real-axis values.
    fn inverse(&mut self, reals: &Positions) -> Result<Positions, SolverError>;

    /// Hand a reflection to the backend.
    fn add_reflection(&mut self, reflection: &Reflection) -> Result<(), SolverError>;

    /// Forget all reflections handed to the backend.
    fn remove_all_reflections(&mut self);

    /// UB matrix computed from two reflections.
    fn calculate_orientation(
        &mut self,
        r1: &Reflection,
        r2: &Reflection,
    ) -> Result<Matrix3<f64>, SolverError>;

    /// Lattice refined from the given reflections.
    fn refine_lattice(&mut self, reflections: &[&Reflection]) -> Result<Lattice, SolverError>;
}

/// Creates a solver for a geometry and optional engine.
pub type SolverFactory = fn(&str, Option<&str>) -> Result<Box<dyn Solver>, SolverError>;

/// Named solver factories.
#[derive(Clone, Debug)]
pub struct SolverRegistry {
    factories: BTreeMap<String, SolverFactory>,
}

impl Default for SolverRegistry {
    /// Registry holding the built-in backends.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(fourc::NAME, fourc::FourCircleSolver::boxed);
        registry.register(no_op::NAME, no_op::NoOpSolver::boxed);
        registry.register(th_tth::NAME, th_tth::ThTthSolver::boxed);
        registry
    }
}

impl SolverRegistry {
    /// Registry without any solver.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register `factory` under `name`, returning any factory it replaces.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: SolverFactory,
    ) -> Option<SolverFactory> {
        self.factories.insert(name.into(), factory)
    }

    /// Registered names.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Factory registered under `name`.
    pub fn get(&self, name: &str) -> Result<SolverFactory, SolverError> {
        self.factories
            .get(name)
            .copied()
            .ok_or_else(|| SolverError::UnknownSolver {
                name: name.to_string(),
                choices: self.factories.keys().join(", "),
            })
    }

    /// Create the solver `name` for `geometry`.
    pub fn create(
        &self,
        name: &str,
        geometry: &str,
        engine: Option<&str>,
    ) -> Result<Box<dyn Solver>, SolverError> {
        let factory = self.get(name)?;
        factory(geometry, engine)
    }
}

/// State most backends keep between calls.
#[derive(Clone, Debug)]
pub(crate) struct SolverState {
    pub(crate) mode: String,
    pub(crate) wavelength: f64,
    pub(crate) lattice: Option<Lattice>,
    pub(crate) u: Matrix3<f64>,
    pub(crate) ub: Matrix3<f64>,
    pub(crate) reflections: Vec<Reflection>,
}

impl SolverState {
    pub(crate) fn new(mode: &str) -> Self {
        Self {
            mode: mode.to_string(),
            wavelength: 1.,
            lattice: None,
            u: Matrix3::identity(),
            ub: Matrix3::identity(),
            reflections: Vec::new(),
        }
    }

    pub(crate) fn select_mode(&mut self, mode: &str, modes: &[&str]) -> Result<(), SolverError> {
        if mode.is_empty() {
            return Ok(());
        }
        if !modes.contains(&mode) {
            return Err(SolverError::UnknownMode {
                mode: mode.to_string(),
                choices: modes.join(", "),
            });
        }
        self.mode = mode.to_string();
        Ok(())
    }

    pub(crate) fn set_wavelength(&mut self, wavelength: f64) -> Result<(), SolverError> {
        if !(wavelength > 0. && wavelength.is_finite()) {
            return Err(SolverError::InvalidInput(format!(
                "wavelength must be positive, received {wavelength}"
            )));
        }
        self.wavelength = wavelength;
        Ok(())
    }
}

/// Values of `names` in `positions`, in the order of `names`.
pub(crate) fn values_of(positions: &Positions, names: &[&str]) -> Result<Vec<f64>, SolverError> {
    names
        .iter()
        .map(|n| {
            positions.get(n).copied().ok_or_else(|| {
                SolverError::InvalidInput(format!(
                    "missing axis {n:?}, expected {names:?}, received {:?}",
                    positions.key_names()
                ))
            })
        })
        .collect()
}

pub(crate) fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

pub(crate) fn check_geometry(
    solver: &str,
    geometry: &str,
    geometries: &[&str],
) -> Result<(), SolverError> {
    if geometries.contains(&geometry) {
        Ok(())
    } else {
        Err(SolverError::UnknownGeometry {
            solver: solver.to_string(),
            geometry: geometry.to_string(),
            choices: geometries.join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_builtins() {
        let registry = SolverRegistry::default();
        assert_eq!(registry.names(), vec!["fourc", "no_op", "th_tth"]);
    }

    #[test]
    fn unknown_solver_names_choices() {
        let err = SolverRegistry::default()
            .create("hkl_soleil", "E4CV", None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown solver \"hkl_soleil\", choose one of [fourc, no_op, th_tth]"
        );
    }

    #[test]
    fn third_party_registration() {
        fn factory(geometry: &str, engine: Option<&str>) -> Result<Box<dyn Solver>, SolverError> {
            Ok(Box::new(no_op::NoOpSolver::new(geometry, engine)?))
        }

        let mut registry = SolverRegistry::empty();
        assert!(registry.create("custom", "ANY", None).is_err());
        registry.register("custom", factory);
        let solver = registry.create("custom", "ANY", None).unwrap();
        assert_eq!(solver.geometry(), "ANY");
    }

    #[test]
    fn state_mode_selection() {
        let mut state = SolverState::new("a");
        state.select_mode("", &["a", "b"]).unwrap();
        assert_eq!(state.mode, "a");
        state.select_mode("b", &["a", "b"]).unwrap();
        assert_eq!(state.mode, "b");
        assert!(matches!(
            state.select_mode("c", &["a", "b"]),
            Err(SolverError::UnknownMode { .. })
        ));
        assert!(state.set_wavelength(0.).is_err());
    }

    #[test]
    fn values_in_requested_order() {
        let positions = Positions::from_names(&["b", "a"], &[2., 1.]);
        assert_eq!(values_of(&positions, &["a", "b"]).unwrap(), vec![1., 2.]);
        assert!(values_of(&positions, &["c"]).is_err());
    }
}
