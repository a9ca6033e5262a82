//! The operator binding a diffractometer to a solver.
//!
//! [`Core`] owns everything the orientation calculation depends on: the axis
//! cross-reference between diffractometer and solver names, the solver itself,
//! the samples and the real-axis constraints. Reflections are stored under the
//! solver's axis names; every other call takes and returns diffractometer names.

use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::Matrix3;

use crate::constraints::RealAxisConstraints;
use crate::error::{Error, Result};
use crate::lattice::Lattice;
use crate::ordered_map::{AxisInput, OrderedMap, Positions};
use crate::reflection::Reflection;
use crate::sample::{Sample, unique_name};
use crate::selection::{Selector, pick_first_solution};
use crate::solvers::{Solver, SolverError};

/// Name of the sample every core starts with.
pub const DEFAULT_SAMPLE_NAME: &str = "sample";
/// Wavelength (angstrom) until one is set.
pub const DEFAULT_WAVELENGTH: f64 = 1.;

/// Declared axes of a diffractometer and the current position of its real axes.
#[derive(Clone, Debug, PartialEq)]
pub struct Positioners {
    pseudo_axes: Vec<String>,
    reals: Positions,
}

impl Positioners {
    /// Declare pseudo and real axes. Real axes start at zero.
    pub fn new<S: AsRef<str>>(pseudo_axes: &[S], real_axes: &[S]) -> Result<Self> {
        let names = pseudo_axes.iter().chain(real_axes).map(AsRef::as_ref);
        if let Some(dup) = names.duplicates().next() {
            return Err(Error::InvalidValue(format!("axis {dup:?} is declared twice")));
        }
        Ok(Self {
            pseudo_axes: pseudo_axes.iter().map(|a| a.as_ref().to_string()).collect(),
            reals: real_axes.iter().map(|a| (a.as_ref(), 0.)).collect(),
        })
    }

    /// Declared pseudo axes.
    pub fn pseudo_axes(&self) -> &[String] {
        &self.pseudo_axes
    }

    /// Declared real axes.
    pub fn real_axes(&self) -> Vec<String> {
        self.reals.key_names()
    }

    /// Current values of all declared real axes.
    pub fn reals(&self) -> &Positions {
        &self.reals
    }

    fn all_axes(&self) -> impl Iterator<Item = &str> {
        self.pseudo_axes.iter().map(String::as_str).chain(self.reals.keys())
    }
}

/// Operator binding one diffractometer to one solver.
#[derive(Debug)]
pub struct Core {
    name: String,
    class_name: String,
    positioners: Positioners,
    wavelength: f64,
    solver: Box<dyn Solver>,
    axes_xref: OrderedMap<String>,
    pseudo_axes: Vec<String>,
    real_axes: Vec<String>,
    extra_axes: Vec<String>,
    assigned: bool,
    samples: OrderedMap<Sample>,
    sample_name: String,
    constraints: RealAxisConstraints,
    selector: Selector,
    solver_needs_update: bool,
}

impl Core {
    /// Create a core holding one default sample (cubic, `a = 1`).
    ///
    /// Axes must be assigned with [`Core::assign_axes`] or [`Core::auto_assign_axes`]
    /// before any transformation.
    pub fn new(
        name: impl Into<String>,
        positioners: Positioners,
        solver: Box<dyn Solver>,
    ) -> Result<Self> {
        let mut core = Self {
            name: name.into(),
            class_name: "Diffractometer".into(),
            positioners,
            wavelength: DEFAULT_WAVELENGTH,
            solver,
            axes_xref: OrderedMap::new(),
            pseudo_axes: Vec::new(),
            real_axes: Vec::new(),
            extra_axes: Vec::new(),
            assigned: false,
            samples: OrderedMap::new(),
            sample_name: DEFAULT_SAMPLE_NAME.into(),
            constraints: RealAxisConstraints::default(),
            selector: pick_first_solution,
            solver_needs_update: true,
        };
        core.reset_samples()?;
        Ok(core)
    }

    /// Diffractometer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the diffractometer type, recorded in exported configurations.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Set the diffractometer type name.
    pub fn set_class_name(&mut self, class_name: impl Into<String>) {
        self.class_name = class_name.into();
    }

    /// Declared axes and current real positions.
    pub fn positioners(&self) -> &Positioners {
        &self.positioners
    }

    /// The solver.
    pub fn solver(&self) -> &dyn Solver {
        self.solver.as_ref()
    }

    /// Replace the solver. Axes must be assigned again afterwards.
    pub fn set_solver(&mut self, solver: Box<dyn Solver>) {
        info!(
            "{}: using solver {} ({})",
            self.name,
            solver.name(),
            solver.geometry()
        );
        self.solver = solver;
        self.axes_xref.clear();
        self.pseudo_axes.clear();
        self.real_axes.clear();
        self.extra_axes.clear();
        self.assigned = false;
        self.constraints = RealAxisConstraints::default();
        self.solver_needs_update = true;
    }

    /// Diffractometer axis name to solver axis name: pseudos, then reals, then extras.
    pub fn axes_xref(&self) -> &OrderedMap<String> {
        &self.axes_xref
    }

    /// Whether axes have been assigned.
    pub fn axes_assigned(&self) -> bool {
        self.assigned
    }

    /// Assigned pseudo axes (diffractometer names).
    pub fn pseudo_axes(&self) -> &[String] {
        &self.pseudo_axes
    }

    /// Assigned real axes (diffractometer names).
    pub fn real_axes(&self) -> &[String] {
        &self.real_axes
    }

    /// Assigned extra axes (diffractometer names).
    pub fn extra_axes(&self) -> &[String] {
        &self.extra_axes
    }

    /// Bind diffractometer axes to the solver's axes by position.
    ///
    /// # Arguments
    /// - `pseudos`, `reals`, `extras`: declared diffractometer axes, in the order of the
    ///   solver's pseudo, real and extra axis lists. No name may appear twice.
    pub fn assign_axes<S: AsRef<str>>(
        &mut self,
        pseudos: &[S],
        reals: &[S],
        extras: &[S],
    ) -> Result<()> {
        let all = pseudos.iter().chain(reals).chain(extras).map(AsRef::as_ref).collect_vec();
        let dups = all.iter().duplicates().collect_vec();
        if !dups.is_empty() {
            return Err(Error::InvalidValue(format!(
                "axes {dups:?} are assigned more than once"
            )));
        }
        if let Some(unknown) = all.iter().find(|a| !self.positioners.all_axes().any(|k| k == **a)) {
            return Err(Error::unknown("axis", *unknown, self.positioners.all_axes()));
        }

        let mut xref = OrderedMap::new();
        let roles = [
            ("pseudo", pseudos, self.solver.pseudo_axis_names()),
            ("real", reals, self.solver.real_axis_names()),
            ("extra", extras, self.solver.extra_axis_names()),
        ];
        let mut assigned: [Vec<String>; 3] = Default::default();
        for ((role, local, canonical), names) in roles.into_iter().zip(&mut assigned) {
            if local.len() != canonical.len() {
                warn!(
                    "{}: {} {role} axes given, solver {} expects {canonical:?}",
                    self.name,
                    local.len(),
                    self.solver.name()
                );
            }
            for (l, c) in local.iter().zip(canonical) {
                xref.insert(l.as_ref(), c);
                names.push(l.as_ref().to_string());
            }
        }

        let [pseudo_axes, real_axes, extra_axes] = assigned;
        debug!("{}: axes_xref = {xref}", self.name);
        self.constraints = RealAxisConstraints::new(&real_axes);
        self.pseudo_axes = pseudo_axes;
        self.real_axes = real_axes;
        self.extra_axes = extra_axes;
        self.axes_xref = xref;
        self.assigned = true;
        self.solver_needs_update = true;
        Ok(())
    }

    /// Assign axes in declaration order.
    ///
    /// The first declared pseudo axes become the solver's pseudos, the first declared
    /// real axes its reals, and whatever remains (pseudos first) fills the extras.
    pub fn auto_assign_axes(&mut self) -> Result<()> {
        let n_pseudos = self.solver.pseudo_axis_names().len();
        let n_reals = self.solver.real_axis_names().len();
        let n_extras = self.solver.extra_axis_names().len();
        let declared_pseudos = self.positioners.pseudo_axes().to_vec();
        let declared_reals = self.positioners.real_axes();

        let pseudos = declared_pseudos.iter().take(n_pseudos).cloned().collect_vec();
        let reals = declared_reals.iter().take(n_reals).cloned().collect_vec();
        let extras = declared_pseudos
            .iter()
            .skip(n_pseudos)
            .chain(declared_reals.iter().skip(n_reals))
            .take(n_extras)
            .cloned()
            .collect_vec();
        self.assign_axes(&pseudos, &reals, &extras)
    }

    fn require_axes(&self) -> Result<()> {
        if self.assigned {
            Ok(())
        } else {
            Err(Error::AxesNotAssigned)
        }
    }

    /// Solver name of a diffractometer axis.
    pub(crate) fn solver_name<'a>(&'a self, local: &'a str) -> &'a str {
        self.axes_xref.get(local).map_or(local, String::as_str)
    }

    /// Diffractometer name of a solver axis.
    pub(crate) fn local_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.axes_xref
            .iter()
            .find(|(_, c)| c.as_str() == canonical)
            .map_or(canonical, |(l, _)| l)
    }

    fn to_local(&self, positions: &Positions) -> Positions {
        positions
            .iter()
            .map(|(axis, value)| (self.local_name(axis), *value))
            .collect()
    }

    /// Values for `axes` (diffractometer names) keyed by solver names.
    fn standardize(&self, kind: &str, input: AxisInput, axes: &[String]) -> Result<Positions> {
        let values = match input {
            AxisInput::Named(named) => {
                let extra = named.keys().filter(|k| !axes.iter().any(|a| a == k)).collect_vec();
                if !extra.is_empty() {
                    warn!("{}: ignoring {kind} axes {extra:?}, expected {axes:?}", self.name);
                }
                axes.iter()
                    .map(|a| {
                        named.get(a).copied().ok_or_else(|| {
                            Error::InvalidValue(format!(
                                "missing {kind} axis {a:?}, expected {axes:?}"
                            ))
                        })
                    })
                    .collect::<Result<Vec<f64>>>()?
            }
            AxisInput::Ordered(mut values) => {
                if values.len() < axes.len() {
                    return Err(Error::InvalidValue(format!(
                        "expected {} {kind} values for {axes:?}, received {values:?}",
                        axes.len()
                    )));
                }
                if values.len() > axes.len() {
                    warn!(
                        "{}: too many {kind} values {values:?}, using the first {}",
                        self.name,
                        axes.len()
                    );
                    values.truncate(axes.len());
                }
                values
            }
        };
        Ok(axes
            .iter()
            .zip(values)
            .map(|(a, v)| (self.solver_name(a), v))
            .collect())
    }

    /// Push the current sample and wavelength to the solver if anything changed.
    fn update_solver(&mut self) -> Result<()> {
        if !self.solver_needs_update {
            return Ok(());
        }
        let sample = &self.samples[self.sample_name.as_str()];
        self.solver.set_wavelength(self.wavelength)?;
        self.solver.set_lattice(&sample.lattice)?;
        self.solver.set_u(sample.u())?;
        self.solver.set_ub(sample.ub())?;
        self.solver.remove_all_reflections();
        for reflection in sample.reflections.iter() {
            self.solver.add_reflection(reflection)?;
        }
        self.solver_needs_update = false;
        Ok(())
    }

    /// Run `f` with the solver at `wavelength` (default: the current wavelength).
    fn with_wavelength<T>(
        &mut self,
        wavelength: Option<f64>,
        f: impl FnOnce(&mut dyn Solver) -> std::result::Result<T, SolverError>,
    ) -> Result<T> {
        self.update_solver()?;
        self.solver.set_wavelength(wavelength.unwrap_or(self.wavelength))?;
        let result = f(self.solver.as_mut());
        self.solver.set_wavelength(self.wavelength)?;
        Ok(result?)
    }

    /// Wavelength (angstrom) used when none is given.
    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    /// Set the wavelength. Must be strictly positive.
    pub fn set_wavelength(&mut self, wavelength: f64) -> Result<()> {
        if !(wavelength > 0. && wavelength.is_finite()) {
            return Err(Error::InvalidValue(format!(
                "wavelength must be positive, received {wavelength}"
            )));
        }
        self.wavelength = wavelength;
        self.solver_needs_update = true;
        Ok(())
    }

    /// Current values of the real axes, assigned ones only once axes are assigned.
    pub fn position(&self) -> Positions {
        if !self.assigned {
            return self.positioners.reals.clone();
        }
        self.real_axes
            .iter()
            .map(|a| (a.as_str(), self.positioners.reals.get(a).copied().unwrap_or_default()))
            .collect()
    }

    /// Record new real-axis values, by name or in declaration order.
    pub fn set_position(&mut self, reals: impl Into<AxisInput>) -> Result<()> {
        let declared = self.positioners.real_axes();
        let updates: Vec<(String, f64)> = match reals.into() {
            AxisInput::Named(named) => {
                if let Some(unknown) = named.keys().find(|k| !declared.iter().any(|d| d == k)) {
                    return Err(Error::unknown("real axis", unknown, &declared));
                }
                named.into_iter().collect()
            }
            AxisInput::Ordered(values) => {
                if values.len() > declared.len() {
                    return Err(Error::InvalidValue(format!(
                        "{} values for {} real axes",
                        values.len(),
                        declared.len()
                    )));
                }
                declared.into_iter().zip(values).collect()
            }
        };
        for (axis, value) in updates {
            self.positioners.reals.insert(axis, value);
        }
        Ok(())
    }

    /// Install the function choosing among forward solutions.
    pub fn set_selector(&mut self, selector: Selector) {
        self.selector = selector;
    }

    /// All forward solutions satisfying the real-axis constraints, keyed by
    /// diffractometer names.
    pub fn forward_solutions(
        &mut self,
        pseudos: impl Into<AxisInput>,
        wavelength: Option<f64>,
    ) -> Result<Vec<Positions>> {
        self.require_axes()?;
        let pseudo_axes = self.pseudo_axes.clone();
        let pseudos = self.standardize("pseudo", pseudos.into(), &pseudo_axes)?;

        let raw = self.with_wavelength(wavelength, |solver| match solver.forward(&pseudos) {
            Err(SolverError::NoForwardSolutions(reason)) => {
                debug!("no forward solutions: {reason}");
                Ok(Vec::new())
            }
            other => other,
        })?;

        let mut solutions = Vec::with_capacity(raw.len());
        for solution in &raw {
            let local = self.to_local(solution);
            if self.constraints.valid(&local)? {
                solutions.push(local);
            } else {
                debug!("{}: {local} rejected by constraints", self.name);
            }
        }
        debug!(
            "{}: {} of {} forward solutions for {pseudos} pass the constraints",
            self.name,
            solutions.len(),
            raw.len()
        );
        Ok(solutions)
    }

    /// Real-axis position for the given pseudo-axis values.
    ///
    /// Solutions violating a constraint are dropped and the selector picks among the rest.
    /// Fails with [`Error::NoForwardSolutions`] if nothing is left.
    pub fn forward(
        &mut self,
        pseudos: impl Into<AxisInput>,
        wavelength: Option<f64>,
    ) -> Result<Positions> {
        let pseudos = pseudos.into();
        let solutions = self.forward_solutions(pseudos.clone(), wavelength)?;
        if solutions.is_empty() {
            let request = match pseudos {
                AxisInput::Named(named) => named.to_string(),
                AxisInput::Ordered(values) => format!("{values:?}"),
            };
            return Err(Error::NoForwardSolutions(format!(
                "{request} within {}",
                self.constraints
            )));
        }
        (self.selector)(&self.position(), &solutions)
    }

    /// Pseudo-axis values for the given real-axis values (default: the current position).
    pub fn inverse(
        &mut self,
        reals: Option<AxisInput>,
        wavelength: Option<f64>,
    ) -> Result<Positions> {
        self.require_axes()?;
        let reals = reals.unwrap_or_else(|| AxisInput::Named(self.position()));
        let real_axes = self.real_axes.clone();
        let reals = self.standardize("real", reals, &real_axes)?;
        let pseudos = self.with_wavelength(wavelength, |solver| solver.inverse(&reals))?;
        Ok(self.to_local(&pseudos))
    }

    /// Modes of the solver.
    pub fn modes(&self) -> Vec<String> {
        self.solver.modes()
    }

    /// Current solver mode.
    pub fn mode(&self) -> &str {
        self.solver.mode()
    }

    /// Select a solver mode. An empty string keeps the current one.
    pub fn set_mode(&mut self, mode: &str) -> Result<()> {
        self.solver.set_mode(mode)?;
        Ok(())
    }

    /// Extra-axis values of the current mode, under diffractometer names where assigned.
    pub fn extras(&self) -> Positions {
        self.to_local(&self.solver.extras())
    }

    /// Set extra-axis values, keyed by diffractometer or solver names.
    pub fn set_extras(&mut self, extras: &Positions) -> Result<()> {
        let canonical: Positions = extras
            .iter()
            .map(|(axis, value)| (self.solver_name(axis), *value))
            .collect();
        self.solver.set_extras(&canonical)?;
        Ok(())
    }

    /// All samples, by name.
    pub fn samples(&self) -> &OrderedMap<Sample> {
        &self.samples
    }

    /// The current sample.
    pub fn sample(&self) -> &Sample {
        &self.samples[self.sample_name.as_str()]
    }

    /// The current sample, for modification.
    pub fn sample_mut(&mut self) -> &mut Sample {
        self.solver_needs_update = true;
        let name = self.sample_name.as_str();
        &mut self.samples[name]
    }

    /// Name of the current sample.
    pub fn sample_name(&self) -> &str {
        &self.sample_name
    }

    /// Make `name` the current sample.
    pub fn set_sample(&mut self, name: &str) -> Result<()> {
        if !self.samples.contains_key(name) {
            return Err(Error::unknown("sample", name, self.samples.keys()));
        }
        self.sample_name = name.to_string();
        self.solver_needs_update = true;
        Ok(())
    }

    /// Add a sample and make it current.
    ///
    /// An existing sample of the same name is only overwritten if `replace` is set.
    pub fn add_sample(&mut self, sample: Sample, replace: bool) -> Result<&mut Sample> {
        let name = sample.name().to_string();
        if self.samples.contains_key(&name) && !replace {
            return Err(Error::Sample(format!(
                "{name:?} already exists, use replace to overwrite it"
            )));
        }
        info!("{}: sample {sample}", self.name);
        self.samples.insert(name.as_str(), sample);
        self.sample_name = name;
        Ok(self.sample_mut())
    }

    /// Remove a sample other than the current one.
    pub fn remove_sample(&mut self, name: &str) -> Result<Sample> {
        if name == self.sample_name {
            return Err(Error::Sample(format!("cannot remove the current sample {name:?}")));
        }
        let known = self.samples.key_names();
        self.samples
            .remove(name)
            .ok_or_else(|| Error::unknown("sample", name, known))
    }

    /// Drop every sample and start over with the default one.
    pub(crate) fn reset_samples(&mut self) -> Result<()> {
        self.samples.clear();
        let sample = Sample::new(Some(DEFAULT_SAMPLE_NAME), Lattice::cubic(1.))?;
        self.add_sample(sample, true)?;
        Ok(())
    }

    /// Real-axis constraints, by diffractometer name.
    pub fn constraints(&self) -> &RealAxisConstraints {
        &self.constraints
    }

    /// Real-axis constraints, for modification.
    pub fn constraints_mut(&mut self) -> &mut RealAxisConstraints {
        &mut self.constraints
    }

    /// Record a reflection on the current sample and return its name.
    ///
    /// # Arguments
    /// - `pseudos`: pseudo-axis values.
    /// - `reals`: real-axis values, the current position if `None`.
    /// - `wavelength`: the current wavelength if `None`.
    /// - `name`: generated if `None`.
    /// - `replace`: overwrite a reflection with the same name or content.
    pub fn add_reflection(
        &mut self,
        pseudos: impl Into<AxisInput>,
        reals: Option<AxisInput>,
        wavelength: Option<f64>,
        name: Option<&str>,
        replace: bool,
    ) -> Result<String> {
        self.require_axes()?;
        let pseudo_axes = self.pseudo_axes.clone();
        let real_axes = self.real_axes.clone();
        let pseudos = self.standardize("pseudo", pseudos.into(), &pseudo_axes)?;
        let reals = reals.unwrap_or_else(|| AxisInput::Named(self.position()));
        let reals = self.standardize("real", reals, &real_axes)?;

        let name = name.map_or_else(|| format!("r_{}", unique_name(4)), str::to_string);
        let mut reflection = Reflection::new(
            name.as_str(),
            pseudos,
            reals,
            wavelength.unwrap_or(self.wavelength),
            self.solver.geometry(),
            &self.solver.pseudo_axis_names(),
            &self.solver.real_axis_names(),
        )?;
        reflection.digits = self.sample().digits();
        self.sample_mut().reflections.add(reflection, replace)?;
        info!("{}: added reflection {name}", self.name);
        Ok(name)
    }

    /// Remove a reflection from the current sample.
    pub fn remove_reflection(&mut self, name: &str) -> Result<Reflection> {
        self.sample_mut().reflections.remove(name)
    }

    /// Compute UB from two reflections and store it (and U) on the current sample.
    ///
    /// Missing names default to the first two orientation reflections.
    pub fn calc_ub(&mut self, r1: Option<&str>, r2: Option<&str>) -> Result<Matrix3<f64>> {
        let reflections = &self.sample().reflections;
        let pick = |given: Option<&str>, slot: usize| -> Result<Reflection> {
            let name = match given {
                Some(name) => name.to_string(),
                None => reflections.order().get(slot).cloned().ok_or_else(|| {
                    Error::InvalidValue(format!(
                        "need two orientation reflections, have {:?}",
                        reflections.order()
                    ))
                })?,
            };
            reflections.require(&name).cloned()
        };
        let (r1, r2) = (pick(r1, 0)?, pick(r2, 1)?);

        self.update_solver()?;
        let ub = self.solver.calculate_orientation(&r1, &r2)?;
        let u = self.solver.u();
        let sample = self.sample_mut();
        sample.set_u(u)?;
        sample.set_ub(ub)?;
        info!("{}: UB from {} and {}: {ub}", self.name, r1.name(), r2.name());
        Ok(ub)
    }

    /// Refine the current sample's lattice from `names` (default: all its reflections).
    ///
    /// At least three reflections are required.
    pub fn refine_lattice(&mut self, names: Option<&[&str]>) -> Result<Lattice> {
        let reflections = &self.sample().reflections;
        let chosen: Vec<Reflection> = match names {
            Some(names) => names
                .iter()
                .map(|n| reflections.require(n).cloned())
                .collect::<Result<_>>()?,
            None => reflections.iter().cloned().collect(),
        };
        if chosen.len() < 3 {
            return Err(Error::InvalidValue(format!(
                "lattice refinement needs at least 3 reflections, have {}",
                chosen.len()
            )));
        }

        self.update_solver()?;
        let mut lattice = self.solver.refine_lattice(&chosen.iter().collect_vec())?;
        let sample = self.sample_mut();
        lattice.digits = sample.digits();
        sample.lattice = lattice.clone();
        info!("{}: refined {lattice}", self.name);
        Ok(lattice)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::constraints::LimitsConstraint;
    use crate::solvers::SolverRegistry;

    fn th_tth_core() -> Core {
        let solver = SolverRegistry::default().create("th_tth", "TH TTH Q", None).unwrap();
        let positioners = Positioners::new(&["q"], &["th", "tth"]).unwrap();
        let mut core = Core::new("powder", positioners, solver).unwrap();
        core.auto_assign_axes().unwrap();
        core
    }

    fn fourc_core() -> Core {
        let solver = SolverRegistry::default().create("fourc", "E4CV", Some("hkl")).unwrap();
        let positioners =
            Positioners::new(&["h", "k", "l", "psi"], &["theta", "chi", "phi", "ttheta"]).unwrap();
        let mut core = Core::new("fourc", positioners, solver).unwrap();
        core.auto_assign_axes().unwrap();
        core
    }

    fn cubic_fourc_core() -> Core {
        let mut core = fourc_core();
        core.set_wavelength(1.54).unwrap();
        core.add_sample(Sample::new(Some("cubic"), Lattice::cubic(5.)).unwrap(), false)
            .unwrap();
        core
    }

    #[test]
    fn theta_two_theta_round_trip() {
        let mut core = th_tth_core();
        let pseudos = core.inverse(Some([5., 10.].into()), None).unwrap();
        assert_abs_diff_eq!(pseudos["q"], 1.095231, epsilon = 1e-4);

        let reals = core.forward(pseudos.clone(), None).unwrap();
        assert_abs_diff_eq!(reals["th"], 5., epsilon = 1e-4);
        assert_abs_diff_eq!(reals["tth"], 10., epsilon = 1e-4);
        assert_eq!(core.forward_solutions(pseudos, None).unwrap().len(), 1);
    }

    #[test]
    fn wavelength_override_is_temporary() {
        let mut core = th_tth_core();
        let at_two = core.inverse(Some([5., 10.].into()), Some(2.)).unwrap();
        assert_abs_diff_eq!(at_two["q"], 1.095231 / 2., epsilon = 1e-4);
        assert_eq!(core.solver().wavelength(), 1.);
        assert!(core.set_wavelength(-1.).is_err());
    }

    #[test]
    fn axes_required() {
        let solver = SolverRegistry::default().create("th_tth", "TH TTH Q", None).unwrap();
        let positioners = Positioners::new(&["q"], &["th", "tth"]).unwrap();
        let mut core = Core::new("powder", positioners, solver).unwrap();
        assert!(matches!(core.forward([1.], None), Err(Error::AxesNotAssigned)));
        assert!(matches!(core.inverse(None, None), Err(Error::AxesNotAssigned)));
        assert!(matches!(
            core.add_reflection([1.], None, None, None, false),
            Err(Error::AxesNotAssigned)
        ));
        assert!(
            Error::AxesNotAssigned
                .to_string()
                .contains("did you forget to call assign_axes()")
        );
    }

    #[test]
    fn axis_bijection() {
        let core = fourc_core();
        let xref = core.axes_xref();
        assert_eq!(
            xref.key_names(),
            vec!["h", "k", "l", "theta", "chi", "phi", "ttheta"]
        );
        assert_eq!(xref["theta"], "omega");
        assert_eq!(xref["ttheta"], "tth");
        assert!(xref.values().all_unique());
        assert_eq!(core.constraints().axes(), vec!["theta", "chi", "phi", "ttheta"]);
    }

    #[test]
    fn assign_rejects_bad_names() {
        let mut core = fourc_core();
        assert!(matches!(
            core.assign_axes(&["h", "k", "l"], &["h", "chi", "phi", "ttheta"], &[]),
            Err(Error::InvalidValue(_))
        ));
        let err = core
            .assign_axes(&["h", "k", "l"], &["omega", "chi", "phi", "ttheta"], &[])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownKey { .. }));
        assert!(err.to_string().contains("theta"));
    }

    #[test]
    fn input_normalisation() {
        let mut core = th_tth_core();
        let named = core.inverse(Some([("tth", 10.), ("th", 5.), ("chi", 3.)].into()), None);
        assert_abs_diff_eq!(named.unwrap()["q"], 1.095231, epsilon = 1e-4);

        let truncated = core.inverse(Some([5., 10., 99.].into()), None).unwrap();
        assert_abs_diff_eq!(truncated["q"], 1.095231, epsilon = 1e-4);

        assert!(matches!(
            core.inverse(Some([5.].into()), None),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            core.inverse(Some([("th", 5.)].into()), None),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn constraints_gate_forward() {
        let mut core = th_tth_core();
        core.constraints_mut().set(LimitsConstraint::new("tth", 20., 180.));
        assert!(core.forward_solutions([1.095231], None).unwrap().is_empty());
        assert!(matches!(
            core.forward([1.095231], None),
            Err(Error::NoForwardSolutions(_))
        ));

        core.constraints_mut().reset();
        assert!(core.forward([1.095231], None).is_ok());
        assert!(matches!(core.forward([100.], None), Err(Error::NoForwardSolutions(_))));
    }

    #[test]
    fn every_returned_solution_is_valid() {
        let mut core = cubic_fourc_core();
        core.constraints_mut().get_mut("phi").unwrap().set_limits(-90., 90.);

        for hkl in [[1., 0., 0.], [0., 1., 1.], [1., 1., 1.], [2., 0., 1.]] {
            for solution in core.forward_solutions(hkl, None).unwrap() {
                assert!(core.constraints().valid(&solution).unwrap());
            }
        }
    }

    #[test]
    fn reflections_use_solver_names() {
        let mut core = fourc_core();
        core.set_position([10., 0., 0., 20.]).unwrap();
        let name = core.add_reflection([1., 0., 0.], None, None, None, false).unwrap();
        assert!(name.starts_with("r_"));

        let reflection = core.sample().reflections.get(&name).unwrap();
        assert_eq!(reflection.reals().key_names(), vec!["omega", "chi", "phi", "tth"]);
        assert_eq!(reflection.reals()["omega"], 10.);
        assert_eq!(reflection.geometry(), "E4CV");

        assert!(core.add_reflection([1., 0., 0.], None, None, Some("again"), false).is_err());
        core.remove_reflection(&name).unwrap();
        assert!(core.sample().reflections.is_empty());
    }

    #[test]
    fn orientation_from_reflections() {
        let mut core = cubic_fourc_core();
        let r100 = core.forward([1., 0., 0.], None).unwrap();
        let r010 = core.forward([0., 1., 0.], None).unwrap();
        core.add_reflection([1., 0., 0.], Some(r100.into()), None, Some("r100"), false)
            .unwrap();
        core.add_reflection([0., 1., 0.], Some(r010.clone().into()), None, Some("r010"), false)
            .unwrap();

        let ub = core.calc_ub(None, None).unwrap();
        assert_abs_diff_eq!(ub, core.sample().lattice.b_matrix().unwrap(), epsilon = 1e-9);
        assert_eq!(core.sample().ub(), &ub);

        let hkl = core.inverse(Some(r010.into()), None).unwrap();
        assert_abs_diff_eq!(hkl.to_vec().as_slice(), [0., 1., 0.].as_slice(), epsilon = 1e-9);

        assert!(matches!(
            core.calc_ub(Some("r100"), Some("r999")),
            Err(Error::UnknownKey { .. })
        ));
    }

    #[test]
    fn refine_needs_three() {
        let mut core = cubic_fourc_core();
        for (i, hkl) in [[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]].into_iter().enumerate() {
            let reals = core.forward(hkl, None).unwrap();
            let name = format!("r{i}");
            core.add_reflection(hkl, Some(reals.into()), None, Some(&name), false)
                .unwrap();
            if i == 1 {
                assert!(matches!(core.refine_lattice(None), Err(Error::InvalidValue(_))));
            }
        }

        core.sample_mut().lattice = Lattice::cubic(4.);
        let refined = core.refine_lattice(None).unwrap();
        assert_abs_diff_eq!(refined.a, 5., epsilon = 1e-8);
        assert_eq!(core.sample().lattice, Lattice::cubic(5.));
    }

    #[test]
    fn sample_management() {
        let mut core = th_tth_core();
        assert_eq!(core.sample_name(), DEFAULT_SAMPLE_NAME);

        let vibranium = Sample::new(Some("vibranium"), Lattice::cubic(2. * std::f64::consts::PI));
        core.add_sample(vibranium.unwrap(), false).unwrap();
        assert_eq!(core.sample_name(), "vibranium");
        let duplicate = Sample::new(Some("vibranium"), Lattice::cubic(1.)).unwrap();
        assert!(core.add_sample(duplicate, false).is_err());

        assert!(core.remove_sample("vibranium").is_err());
        core.set_sample(DEFAULT_SAMPLE_NAME).unwrap();
        core.remove_sample("vibranium").unwrap();
        assert!(matches!(core.set_sample("vibranium"), Err(Error::UnknownKey { .. })));
    }

    #[test]
    fn closest_selector() {
        let mut core = cubic_fourc_core();
        let solutions = core.forward_solutions([0., 0., 1.], None).unwrap();
        assert_eq!(solutions.len(), 2);

        core.set_position(solutions[1].clone()).unwrap();
        assert_eq!(core.forward([0., 0., 1.], None).unwrap(), solutions[0]);
        core.set_selector(crate::selection::pick_closest_solution);
        assert_eq!(core.forward([0., 0., 1.], None).unwrap(), solutions[1]);
    }

    #[test]
    fn leftover_axes_become_extras() {
        let solver = SolverRegistry::default().create("fourc", "E4CV", None).unwrap();
        let positioners =
            Positioners::new(&["h", "k", "l", "psi"], &["theta", "chi", "phi", "ttheta"])
                .unwrap();
        let mut core = Core::new("fourc", positioners, solver).unwrap();
        core.set_mode("constant_phi").unwrap();
        core.auto_assign_axes().unwrap();

        assert_eq!(core.extra_axes(), ["psi"]);
        assert_eq!(core.axes_xref()["psi"], "fixed_phi");
        let assigned = core
            .pseudo_axes()
            .iter()
            .chain(core.real_axes())
            .chain(core.extra_axes())
            .map(String::as_str)
            .collect_vec();
        assert_eq!(assigned, core.axes_xref().keys().collect_vec());
        assert_eq!(assigned.iter().unique().count(), assigned.len());

        core.set_extras(&Positions::from_names(&["psi"], &[30.])).unwrap();
        assert_eq!(core.extras()["psi"], 30.);
        assert_eq!(core.solver().extras()["fixed_phi"], 30.);

        core.set_wavelength(1.54).unwrap();
        core.add_sample(Sample::new(Some("cubic"), Lattice::cubic(5.)).unwrap(), false)
            .unwrap();
        let reals = core.forward([1., 0., 0.], None).unwrap();
        assert_abs_diff_eq!(reals["phi"], 30., epsilon = 1e-9);
    }

    #[test]
    fn mode_and_extras() {
        let mut core = fourc_core();
        assert_eq!(core.mode(), "bissector");
        assert!(core.set_mode("psi_constant").is_err());
        core.set_mode("constant_phi").unwrap();
        core.set_extras(&Positions::from_names(&["fixed_phi"], &[15.])).unwrap();
        assert_eq!(core.extras()["fixed_phi"], 15.);
        core.set_mode("").unwrap();
        assert_eq!(core.mode(), "constant_phi");
    }
}
