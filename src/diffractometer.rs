//! A generic diffractometer: a [`Core`] with named positioners, built from a
//! [`DiffractometerConfig`], plus file-based export and restore.

use std::fs;
use std::path::Path;

use log::info;

use crate::configure::{Configuration, RestoreOptions};
use crate::core::{Core, Positioners};
use crate::error::Result;
use crate::ordered_map::{AxisInput, Positions};
use crate::solvers::SolverRegistry;

/// Everything needed to build a [`Diffractometer`].
///
/// Created with [`DiffractometerConfig::new()`], other parameters are set via
/// `with_*` functions:
/// ```rust
/// # use hklrs::DiffractometerConfig;
/// let config = DiffractometerConfig::new("fourc", "E4CV")
///     .with_name("fourc")
///     .with_real_axes(&["theta", "chi", "phi", "ttheta"])
///     .with_wavelength(1.54);
/// ```
#[derive(Clone, Debug)]
pub struct DiffractometerConfig {
    name: String,
    class_name: String,
    solver: String,
    geometry: String,
    engine: Option<String>,
    pseudo_axes: Vec<String>,
    real_axes: Vec<String>,
    wavelength: f64,
}

impl DiffractometerConfig {
    /// Use `solver` for `geometry`. Axis names default to the solver's own.
    pub fn new(solver: impl Into<String>, geometry: impl Into<String>) -> Self {
        Self {
            name: "diffractometer".into(),
            class_name: "Diffractometer".into(),
            solver: solver.into(),
            geometry: geometry.into(),
            engine: None,
            pseudo_axes: Vec::new(),
            real_axes: Vec::new(),
            wavelength: crate::core::DEFAULT_WAVELENGTH,
        }
    }

    /// Set the diffractometer name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the class name written to exported configurations.
    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    /// Select a solver engine.
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    /// Declare pseudo-axis positioners.
    pub fn with_pseudo_axes<S: AsRef<str>>(mut self, axes: &[S]) -> Self {
        self.pseudo_axes = axes.iter().map(|a| a.as_ref().to_string()).collect();
        self
    }

    /// Declare real-axis positioners.
    pub fn with_real_axes<S: AsRef<str>>(mut self, axes: &[S]) -> Self {
        self.real_axes = axes.iter().map(|a| a.as_ref().to_string()).collect();
        self
    }

    /// Set the initial wavelength (angstrom).
    pub fn with_wavelength(mut self, wavelength: f64) -> Self {
        self.wavelength = wavelength;
        self
    }

    /// Create the solver from `registry` and assign axes in declaration order.
    pub fn build(&self, registry: &SolverRegistry) -> Result<Diffractometer> {
        let solver = registry.create(&self.solver, &self.geometry, self.engine.as_deref())?;
        let or_solver = |declared: &[String], canonical: Vec<String>| {
            if declared.is_empty() {
                canonical
            } else {
                declared.to_vec()
            }
        };
        let pseudo_axes = or_solver(&self.pseudo_axes, solver.pseudo_axis_names());
        let real_axes = or_solver(&self.real_axes, solver.real_axis_names());

        let positioners = Positioners::new(pseudo_axes.as_slice(), real_axes.as_slice())?;
        let mut core = Core::new(self.name.as_str(), positioners, solver)?;
        core.set_class_name(self.class_name.as_str());
        core.set_wavelength(self.wavelength)?;
        core.auto_assign_axes()?;
        info!(
            "{}: {} solver for {}, pseudos {pseudo_axes:?}, reals {real_axes:?}",
            self.name, self.solver, self.geometry
        );
        Ok(Diffractometer { core })
    }
}

/// A diffractometer driven by a [`Core`].
#[derive(Debug)]
pub struct Diffractometer {
    core: Core,
}

impl Diffractometer {
    /// The orientation core.
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// The orientation core, for modification.
    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    /// Current real-axis positions.
    pub fn position(&self) -> Positions {
        self.core.position()
    }

    /// Pseudo-axis values at the current position.
    pub fn pseudo_position(&mut self) -> Result<Positions> {
        self.core.inverse(None, None)
    }

    /// Compute the real-axis position for `pseudos`, move there and return it.
    pub fn move_to(&mut self, pseudos: impl Into<AxisInput>) -> Result<Positions> {
        let reals = self.core.forward(pseudos, None)?;
        self.core.set_position(&reals)?;
        Ok(reals)
    }

    /// Move the real axes directly.
    pub fn move_reals(&mut self, reals: impl Into<AxisInput>) -> Result<()> {
        self.core.set_position(reals)
    }

    /// Short summary of the current state.
    pub fn wh(&mut self) -> Result<String> {
        let pseudos = self.pseudo_position()?;
        Ok(format!(
            "{} ({}), sample {:?}, wavelength {}\n{pseudos}\n{}",
            self.core.name(),
            self.core.solver().geometry(),
            self.core.sample_name(),
            self.core.wavelength(),
            self.position()
        ))
    }

    /// Write the configuration to a YAML file.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_yaml::to_string(&self.core.configuration())?;
        fs::write(path.as_ref(), text)?;
        info!("{}: exported to {}", self.core.name(), path.as_ref().display());
        Ok(())
    }

    /// Restore the configuration from a YAML file.
    pub fn restore(&mut self, path: impl AsRef<Path>, options: RestoreOptions) -> Result<()> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Configuration = serde_yaml::from_str(&text)?;
        self.core.restore(&config, options)
    }
}
